//! In-memory state store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::types::{PendingAuthorization, RequesterMeta};
use super::{StateStore, generate_state_token};
use crate::error::StoreError;

/// Pending authorizations held in process memory.
///
/// One mutex guards the whole map, so create, consume and sweep never
/// interleave on the same entry.
#[derive(Clone)]
pub struct InMemoryStateStore {
    pending: Arc<Mutex<HashMap<String, PendingAuthorization>>>,
    ttl: Duration,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { pending: Arc::new(Mutex::new(HashMap::new())), ttl }
    }

    /// Entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert an entry with an explicit creation time.
    pub async fn create_at(&self, meta: RequesterMeta, created_at: Instant) -> String {
        let state = generate_state_token();
        let entry = PendingAuthorization { state: state.clone(), meta, created_at };
        self.pending.lock().await.insert(state.clone(), entry);
        state
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn create(&self, meta: RequesterMeta) -> Result<String, StoreError> {
        Ok(self.create_at(meta, Instant::now()).await)
    }

    async fn consume(&self, state: &str) -> Result<Option<RequesterMeta>, StoreError> {
        let entry = self.pending.lock().await.remove(state);
        Ok(entry.filter(|e| !e.is_expired_at(Instant::now(), self.ttl)).map(|e| e.meta))
    }

    async fn sweep(&self, now: Instant) -> Result<usize, StoreError> {
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|_, entry| !entry.is_expired_at(now, self.ttl));
        Ok(before - pending.len())
    }

    async fn pending_count(&self) -> Result<usize, StoreError> {
        Ok(self.pending.lock().await.len())
    }
}

impl std::fmt::Debug for InMemoryStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStateStore").field("ttl", &self.ttl).finish()
    }
}
