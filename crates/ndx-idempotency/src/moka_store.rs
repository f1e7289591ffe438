//! In-process idempotency store using moka
//!
//! Suitable for a single long-running worker and for tests. Per-record
//! eviction is scheduled `expires_at - created_at` after insertion, so it
//! follows whatever clock stamped the record; the conditional put runs
//! through moka's per-key compute, which serializes writers of one key.

use crate::record::IdempotencyRecord;
use crate::store::{IdempotencyStore, PutOutcome, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use moka::Expiry;
use ndx_event::IdempotencyKey;
use std::time::{Duration, Instant};

/// Default number of live reservations kept
///
/// Must exceed the number of distinct events seen in one TTL window;
/// capacity eviction of a live reservation re-opens its key.
pub const DEFAULT_CAPACITY: u64 = 1_000_000;

/// Expires each record at its own `expires_at`
#[derive(Debug, Clone, Copy)]
struct RecordExpiry;

impl Expiry<IdempotencyKey, IdempotencyRecord> for RecordExpiry {
    fn expire_after_create(
        &self,
        _key: &IdempotencyKey,
        value: &IdempotencyRecord,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.remaining(value.created_at))
    }

    fn expire_after_update(
        &self,
        _key: &IdempotencyKey,
        value: &IdempotencyRecord,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.remaining(value.created_at))
    }
}

/// Moka-backed idempotency store
#[derive(Debug, Clone)]
pub struct MokaIdempotencyStore {
    inner: Cache<IdempotencyKey, IdempotencyRecord>,
}

impl MokaIdempotencyStore {
    /// Create a store holding at most `max_capacity` records
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(RecordExpiry)
                .build(),
        }
    }

    /// Approximate number of live records
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Apply pending evictions (mainly for tests and stats)
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }
}

impl Default for MokaIdempotencyStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl IdempotencyStore for MokaIdempotencyStore {
    async fn get(
        &self,
        key: &IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        Ok(self
            .inner
            .get(key)
            .await
            .filter(|record| !record.is_expired(now)))
    }

    async fn put_if_absent(&self, record: IdempotencyRecord) -> Result<PutOutcome, StoreError> {
        let now = record.created_at;
        let key = record.key.clone();

        let result = self
            .inner
            .entry(key.clone())
            .and_compute_with(move |existing| async move {
                match existing {
                    Some(entry) if !entry.value().is_expired(now) => Op::Nop,
                    _ => Op::Put(record),
                }
            })
            .await;

        match result {
            CompResult::Inserted(_) | CompResult::ReplacedWith(_) => Ok(PutOutcome::Inserted),
            CompResult::Unchanged(entry) => Ok(PutOutcome::Existing(entry.into_value())),
            CompResult::StillNone(_) | CompResult::Removed(_) => Err(StoreError::Unavailable(
                format!("conditional put for {key} did not store a record"),
            )),
        }
    }

    async fn remove(&self, key: &IdempotencyKey) -> Result<(), StoreError> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndx_event::{EventId, EventKind, NotificationEvent, SchemaVersion};

    fn record(id: &str, email: &str, event_age_days: i64) -> IdempotencyRecord {
        let now = Utc::now();
        let event = NotificationEvent::new(
            EventId::new(id).unwrap(),
            now - chrono::Duration::days(event_age_days),
            SchemaVersion::new("v1").unwrap(),
            EventKind::LeaseApproved,
        );
        IdempotencyRecord::reserve(
            IdempotencyKey::for_event("ndx", &event).unwrap(),
            email,
            event.time(),
            chrono::Duration::days(7),
            now,
        )
    }

    #[tokio::test]
    async fn first_put_inserts() {
        let store = MokaIdempotencyStore::new(100);
        let r = record("abc-1", "a@example.gov.uk", 0);

        assert_eq!(store.put_if_absent(r.clone()).await.unwrap(), PutOutcome::Inserted);
        assert_eq!(store.get(&r.key, Utc::now()).await.unwrap(), Some(r));
    }

    #[tokio::test]
    async fn second_put_returns_existing() {
        let store = MokaIdempotencyStore::new(100);
        let first = record("abc-1", "a@example.gov.uk", 0);
        let second = record("abc-1", "b@example.gov.uk", 0);

        store.put_if_absent(first.clone()).await.unwrap();
        let outcome = store.put_if_absent(second).await.unwrap();

        assert_eq!(outcome, PutOutcome::Existing(first));
    }

    #[tokio::test]
    async fn expired_record_is_invisible() {
        let store = MokaIdempotencyStore::new(100);
        let stale = record("abc-1", "a@example.gov.uk", 8);

        store.put_if_absent(stale.clone()).await.unwrap();
        assert_eq!(store.get(&stale.key, Utc::now()).await.unwrap(), None);

        let fresh = record("abc-1", "a@example.gov.uk", 0);
        assert_eq!(store.put_if_absent(fresh).await.unwrap(), PutOutcome::Inserted);
    }

    #[tokio::test]
    async fn liveness_follows_the_callers_clock() {
        let store = MokaIdempotencyStore::new(100);
        let r = record("abc-1", "a@example.gov.uk", 0);
        store.put_if_absent(r.clone()).await.unwrap();

        let later = r.expires_at + chrono::Duration::seconds(1);
        assert_eq!(store.get(&r.key, later).await.unwrap(), None);

        let mut replay = r.clone();
        replay.created_at = later;
        replay.expires_at = later + chrono::Duration::days(7);
        assert_eq!(store.put_if_absent(replay).await.unwrap(), PutOutcome::Inserted);
    }

    #[tokio::test]
    async fn remove_reopens_key() {
        let store = MokaIdempotencyStore::new(100);
        let r = record("abc-1", "a@example.gov.uk", 0);

        store.put_if_absent(r.clone()).await.unwrap();
        store.remove(&r.key).await.unwrap();

        assert_eq!(store.get(&r.key, Utc::now()).await.unwrap(), None);
        assert_eq!(store.put_if_absent(r).await.unwrap(), PutOutcome::Inserted);
    }
}
