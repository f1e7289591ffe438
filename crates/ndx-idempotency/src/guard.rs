//! Idempotency guard
//!
//! Decides, per event, whether an email may be sent:
//!
//! ```text
//! key unseen                       -> Send            (key reserved)
//! key seen, same recipient         -> SkipDuplicate   (IdempotencyHit)
//! key seen, different recipient    -> RejectSecurity  (IdempotencyTampering)
//! ```
//!
//! The security branch is a distinct variant so callers cannot treat it as
//! an ordinary skip.

use crate::record::IdempotencyRecord;
use crate::store::{IdempotencyStore, PutOutcome, StoreError};
use chrono::{DateTime, Utc};
use ndx_event::{emails_match, mask_email, EventError, IdempotencyKey, NotificationEvent};
use ndx_metrics::{Metric, MetricsSink, Tag};
use std::sync::Arc;

/// Event replay window of the upstream bus
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// Outcome of [`IdempotencyGuard::check_and_reserve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// First occurrence; the key is now reserved for this recipient
    Send {
        /// Reserved key
        key: IdempotencyKey,
    },
    /// Already processed for the same recipient
    SkipDuplicate {
        /// Existing key
        key: IdempotencyKey,
    },
    /// Key replayed with a different recipient
    RejectSecurity {
        /// Existing key
        key: IdempotencyKey,
    },
}

impl GuardDecision {
    /// Key the decision was made for
    #[inline]
    #[must_use]
    pub fn key(&self) -> &IdempotencyKey {
        match self {
            Self::Send { key } | Self::SkipDuplicate { key } | Self::RejectSecurity { key } => key,
        }
    }

    /// Check if the caller should go on to send
    #[inline]
    #[must_use]
    pub fn should_send(&self) -> bool {
        matches!(self, Self::Send { .. })
    }
}

/// Guard failures
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Key could not be derived
    #[error("cannot derive idempotency key: {0}")]
    Key(#[from] EventError),

    /// Event carries no usable `detail.userEmail`
    #[error("event {0} has no recipient")]
    MissingRecipient(String),

    /// Store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GuardError {
    /// Check if redelivery may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }
}

/// Check-and-reserve front of the pipeline
#[derive(Debug, Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
    metrics: Arc<dyn MetricsSink>,
    namespace: String,
    ttl: chrono::Duration,
}

impl IdempotencyGuard {
    /// Create a guard with the default 7-day TTL
    ///
    /// # Errors
    /// Returns `EventError::InvalidNamespace` if the namespace is unusable
    pub fn new(
        store: Arc<dyn IdempotencyStore>,
        metrics: Arc<dyn MetricsSink>,
        namespace: impl Into<String>,
    ) -> Result<Self, EventError> {
        let namespace = namespace.into();
        ndx_event::key::validate_namespace(&namespace)?;
        Ok(Self {
            store,
            metrics,
            namespace,
            ttl: chrono::Duration::days(DEFAULT_TTL_DAYS),
        })
    }

    /// With a custom TTL
    #[inline]
    #[must_use]
    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Namespace prefix of every key
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key for an event
    ///
    /// # Errors
    /// Propagates key derivation failures
    pub fn key_for(&self, event: &NotificationEvent) -> Result<IdempotencyKey, EventError> {
        IdempotencyKey::for_event(&self.namespace, event)
    }

    /// Atomically reserve the event's key or classify the replay
    ///
    /// `now` stamps the reservation and decides whether an existing record is
    /// still live.
    ///
    /// # Errors
    /// - `GuardError::MissingRecipient` if the event has no `userEmail`
    /// - `GuardError::Store` if the store fails
    pub async fn check_and_reserve(
        &self,
        event: &NotificationEvent,
        now: DateTime<Utc>,
    ) -> Result<GuardDecision, GuardError> {
        let key = self.key_for(event)?;
        let email = event
            .user_email()
            .ok_or_else(|| GuardError::MissingRecipient(event.id().to_string()))?;

        let record =
            IdempotencyRecord::reserve(key.clone(), email, event.time(), self.ttl, now);

        match self.store.put_if_absent(record).await? {
            PutOutcome::Inserted => {
                tracing::debug!(key = %key, "idempotency key reserved");
                Ok(GuardDecision::Send { key })
            }
            PutOutcome::Existing(existing) if emails_match(&existing.cached_email, email) => {
                self.metrics.increment(Metric::IdempotencyHit, &[]);
                self.metrics
                    .increment(Metric::NotificationSkipped, &[Tag::reason("duplicate")]);
                tracing::info!(
                    key = %key,
                    first_seen = %existing.created_at,
                    "duplicate event skipped"
                );
                Ok(GuardDecision::SkipDuplicate { key })
            }
            PutOutcome::Existing(existing) => {
                self.metrics.increment(Metric::IdempotencyTampering, &[]);
                tracing::error!(
                    target: "ndx::security",
                    alert = "idempotency_tampering",
                    key = %key,
                    event_id = %event.id(),
                    cached_recipient = %mask_email(&existing.cached_email),
                    incoming_recipient = %mask_email(email),
                    "SECURITY ALERT: idempotency key reused with a different recipient"
                );
                Ok(GuardDecision::RejectSecurity { key })
            }
        }
    }

    /// Drop a reservation so a redelivery of the event can send again
    ///
    /// # Errors
    /// Returns `StoreError` if the store fails
    pub async fn release(&self, key: &IdempotencyKey) -> Result<(), StoreError> {
        self.store.remove(key).await?;
        tracing::debug!(key = %key, "idempotency reservation released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockIdempotencyStore;
    use ndx_event::{EventId, EventKind, SchemaVersion};
    use ndx_metrics::InMemorySink;

    fn event() -> NotificationEvent {
        NotificationEvent::new(
            EventId::new("abc-1").unwrap(),
            Utc::now(),
            SchemaVersion::new("v1").unwrap(),
            EventKind::LeaseApproved,
        )
        .with_detail("userEmail", "a@example.gov.uk")
    }

    #[tokio::test]
    async fn store_outage_is_retryable_and_records_nothing() {
        let mut store = MockIdempotencyStore::new();
        store
            .expect_put_if_absent()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("connection reset".into())));
        let metrics = Arc::new(InMemorySink::new());
        let guard = IdempotencyGuard::new(Arc::new(store), metrics.clone(), "ndx").unwrap();

        let err = guard
            .check_and_reserve(&event(), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, GuardError::Store(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
        assert_eq!(metrics.count(Metric::IdempotencyHit), 0);
        assert_eq!(metrics.count(Metric::IdempotencyTampering), 0);
    }

    #[tokio::test]
    async fn reservation_is_stamped_with_the_given_time() {
        let now = Utc::now() - chrono::Duration::hours(3);
        let mut store = MockIdempotencyStore::new();
        store
            .expect_put_if_absent()
            .withf(move |record| record.created_at == now)
            .times(1)
            .returning(|_| Ok(PutOutcome::Inserted));
        let guard =
            IdempotencyGuard::new(Arc::new(store), Arc::new(InMemorySink::new()), "ndx").unwrap();

        assert!(guard
            .check_and_reserve(&event(), now)
            .await
            .unwrap()
            .should_send());
    }
}
