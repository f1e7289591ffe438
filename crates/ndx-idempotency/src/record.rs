//! Stored idempotency record

use chrono::{DateTime, Utc};
use ndx_event::IdempotencyKey;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivery state for one event id
///
/// Created when an event is reserved, read on every redelivery, removed by
/// TTL expiry (or explicitly after a failed send).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// `<namespace>:<schemaVersion>:<event.id>`
    pub key: IdempotencyKey,
    /// Recipient the event was first processed for
    pub cached_email: String,
    /// When the reservation was made
    pub created_at: DateTime<Utc>,
    /// `event.time + ttl`
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Reserve a key for a recipient
    ///
    /// The TTL is anchored on the event time, not on the reservation time, so
    /// the record lives exactly as long as the event can be replayed.
    #[must_use]
    pub fn reserve(
        key: IdempotencyKey,
        cached_email: impl Into<String>,
        event_time: DateTime<Utc>,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            cached_email: cached_email.into(),
            created_at: now,
            expires_at: event_time + ttl,
        }
    }

    /// Record no longer protects its key
    #[inline]
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry (zero once expired)
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}
