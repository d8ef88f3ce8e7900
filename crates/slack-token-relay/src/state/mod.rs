//! OAuth `state` parameter lifecycle.
//!
//! A state token is minted when a flow starts, redeemed exactly once when the
//! provider calls back, and swept if it is never redeemed. The store is a
//! trait so the in-memory map can be replaced by a shared cache when the relay
//! runs as several instances.

mod memory;
mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::StoreError;

pub use memory::InMemoryStateStore;
pub use types::{PendingAuthorization, RequesterMeta};

/// Length of a minted state token (lowercase hex).
pub const STATE_TOKEN_LEN: usize = 64;

/// Storage for pending authorizations keyed by state token.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// Mint a fresh state token bound to `meta`.
    async fn create(&self, meta: RequesterMeta) -> Result<String, StoreError>;

    /// Look up and delete `state` in one step.
    ///
    /// Returns `None` when the state is unknown, already consumed, or expired.
    async fn consume(&self, state: &str) -> Result<Option<RequesterMeta>, StoreError>;

    /// Delete every entry older than the TTL at `now`. Returns how many were removed.
    async fn sweep(&self, now: Instant) -> Result<usize, StoreError>;

    /// Number of entries currently waiting for a callback.
    async fn pending_count(&self) -> Result<usize, StoreError>;
}

/// Generate a random state token from two v4 UUIDs (244 random bits).
#[must_use]
pub fn generate_state_token() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

/// Shorten a state token for log output.
#[must_use]
pub fn state_prefix(state: &str) -> &str {
    state.get(..8).unwrap_or(state)
}

/// Start the periodic sweep of expired state tokens.
///
/// A panic inside the sweep loop is logged rather than lost with the task.
pub fn start_sweep_task(store: Arc<dyn StateStore>, interval: Duration) -> JoinHandle<()> {
    let sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.sweep(Instant::now()).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(count = removed, "Swept expired state tokens"),
                Err(e) => tracing::warn!(error = %e, "State sweep failed"),
            }
        }
    });

    tokio::spawn(async move {
        if let Err(e) = sweeper.await {
            if e.is_panic() {
                tracing::error!(error = %e, "State sweep task panicked");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = generate_state_token();
        assert_eq!(token.len(), STATE_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_state_prefix() {
        assert_eq!(state_prefix("0123456789abcdef"), "01234567");
        assert_eq!(state_prefix("abc"), "abc");
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired() {
        let store = Arc::new(InMemoryStateStore::new(Duration::from_secs(1)));
        let created = Instant::now()
            .checked_sub(Duration::from_secs(5))
            .expect("clock past five seconds");
        store.create_at(RequesterMeta::default(), created).await;
        assert_eq!(store.pending_count().await.unwrap(), 1);

        let _task = start_sweep_task(store.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.pending_count().await.unwrap(), 0);
    }
}
