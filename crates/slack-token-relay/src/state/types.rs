//! Pending authorization types.

use std::time::{Duration, Instant};

use crate::sanitize::sanitize_label;

/// Metadata captured when a flow starts and returned when its state is consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequesterMeta {
    pub requester_id: String,
    pub requester_name: String,
}

impl RequesterMeta {
    /// Build metadata from raw, untrusted query values.
    #[must_use]
    pub fn sanitized(requester_id: Option<&str>, requester_name: Option<&str>) -> Self {
        Self {
            requester_id: sanitize_label(requester_id),
            requester_name: sanitize_label(requester_name),
        }
    }
}

/// An authorization attempt waiting for its callback.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub state: String,
    pub meta: RequesterMeta,
    pub created_at: Instant,
}

impl PendingAuthorization {
    /// Whether this entry is older than `ttl` at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}
