//! Idempotency store interface
//!
//! The store is the only shared mutable state of the pipeline. It is modelled
//! as an external key-value service with an atomic conditional put, never as
//! process memory, so the guarantee holds across concurrent invocations.

use crate::record::IdempotencyRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ndx_event::IdempotencyKey;
use std::fmt::Debug;

/// Store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend could not be reached
    #[error("idempotency store unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected the request for capacity reasons
    #[error("idempotency store throttled: {0}")]
    Throttled(String),
}

impl StoreError {
    /// Check if the operation may succeed on redelivery
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Throttled(_))
    }
}

/// Result of a conditional put
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// No live record existed; ours is now stored
    Inserted,
    /// A live record already holds the key
    Existing(IdempotencyRecord),
}

/// Key-value store with per-record TTL
///
/// Stores never read the wall clock: liveness is judged against the `now`
/// passed to [`get`](Self::get) or the `created_at` of the record being put.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyStore: Send + Sync + Debug {
    /// Fetch a record still live at `now`
    async fn get(
        &self,
        key: &IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Store `record` unless a record live at `record.created_at` already
    /// holds its key
    ///
    /// Must be atomic: of two concurrent calls for the same key, exactly one
    /// observes `PutOutcome::Inserted`.
    async fn put_if_absent(&self, record: IdempotencyRecord) -> Result<PutOutcome, StoreError>;

    /// Drop a record
    async fn remove(&self, key: &IdempotencyKey) -> Result<(), StoreError>;
}
