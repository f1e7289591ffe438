//! Notification pipeline
//!
//! ```text
//! event ─▶ age check ─▶ idempotency guard ─▶ enrichment ─▶ lease window ─▶ send
//!            │               │    │                            │            │
//!          stale        duplicate  tampering              lease ended   failure:
//!          (skip)        (skip)   (security)                (skip)    release key
//! ```
//!
//! The age check runs before the reservation so a stale event never occupies
//! a key. A failed send releases its reservation, letting a redelivery or a
//! DLQ replay try again.

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, NotifyConfig};
use crate::error::{ErrorClass, PipelineError};
use crate::personalisation::personalise;
use crate::templates::TemplateRouter;
use crate::validation::{AgeVerdict, EventAgeValidator};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use ndx_enrichment::{EnrichmentLookup, InMemoryLeaseTable, LeaseTable};
use ndx_event::{IdempotencyKey, LeaseRecord, NotificationEvent};
use ndx_idempotency::{GuardDecision, IdempotencyGuard, IdempotencyStore, MokaIdempotencyStore};
use ndx_metrics::{FacadeSink, Metric, MetricsSink, Tag};
use ndx_sender::{
    GovNotifyClient, NotificationClient, NotificationSender, RenderedEmail, SendReceipt,
};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use tracing::Instrument;

/// Default number of events processed concurrently by a batch
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;

/// Why an event was not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    /// Already sent to the same recipient
    Duplicate,
    /// Older than the replay window
    Stale,
    /// Threshold alert for a lease that has ended
    LeaseWindow,
}

impl SkipReason {
    /// `reason` tag value
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Stale => "stale",
            Self::LeaseWindow => "lease_window",
        }
    }
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful result of processing one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Email accepted by the provider
    Sent {
        /// Provider acknowledgement
        receipt: SendReceipt,
        /// Whether the lease lookup succeeded
        enriched: bool,
        /// Rendered email
        rendered: RenderedEmail,
    },
    /// Nothing to send
    Skipped(SkipReason),
}

impl ProcessOutcome {
    /// Check if an email went out
    #[inline]
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// Result of one batch entry
#[derive(Debug)]
pub struct BatchEntry {
    /// Position in the input
    pub index: usize,
    /// Event id, when the payload parsed
    pub event_id: Option<String>,
    /// Outcome
    pub result: Result<ProcessOutcome, PipelineError>,
}

/// Results of [`NotificationPipeline::process_batch`], in input order
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Per-event results
    pub entries: Vec<BatchEntry>,
}

impl BatchSummary {
    /// Events sent
    #[must_use]
    pub fn sent(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(&e.result, Ok(o) if o.is_sent()))
            .count()
    }

    /// Events skipped for `reason`
    #[must_use]
    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(&e.result, Ok(ProcessOutcome::Skipped(r)) if *r == reason))
            .count()
    }

    /// Events failed with `class`
    #[must_use]
    pub fn failed(&self, class: ErrorClass) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(&e.result, Err(err) if err.class() == class))
            .count()
    }

    /// Check if every event was sent or skipped
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| e.result.is_ok())
    }
}

/// Idempotent, security-checked notification delivery
#[derive(Debug, Clone)]
pub struct NotificationPipeline {
    validator: EventAgeValidator,
    guard: IdempotencyGuard,
    enrichment: EnrichmentLookup,
    sender: NotificationSender,
    router: TemplateRouter,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    batch_concurrency: usize,
}

impl NotificationPipeline {
    /// Start building a pipeline from configuration
    #[must_use]
    pub fn builder(config: NotifyConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Idempotency guard in use
    #[inline]
    #[must_use]
    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }

    /// Sender in use
    #[inline]
    #[must_use]
    pub fn sender(&self) -> &NotificationSender {
        &self.sender
    }

    /// Parse and process one raw EventBridge payload
    ///
    /// # Errors
    /// Returns `PipelineError::Event` for malformed payloads, otherwise as
    /// [`Self::process`]
    pub async fn process_json(&self, payload: &[u8]) -> Result<ProcessOutcome, PipelineError> {
        match NotificationEvent::from_json(payload) {
            Ok(event) => self.process(&event).await,
            Err(err) => {
                let err = PipelineError::from(err);
                self.record_failure(None, &err);
                Err(err)
            }
        }
    }

    /// Process one event
    ///
    /// # Errors
    /// Returns `PipelineError`; its [`ErrorClass`] tells the caller whether
    /// to redeliver
    pub async fn process(
        &self,
        event: &NotificationEvent,
    ) -> Result<ProcessOutcome, PipelineError> {
        let span = tracing::info_span!(
            "process",
            event_id = %event.id(),
            kind = %event.kind(),
        );
        let result = self.run(event).instrument(span).await;
        if let Err(err) = &result {
            self.record_failure(Some(event), err);
        }
        result
    }

    /// Process raw payloads, keeping input order in the summary
    ///
    /// Events are processed concurrently; the idempotency guard keeps
    /// duplicate ids within a batch from both sending.
    pub async fn process_batch<I, B>(&self, payloads: I) -> BatchSummary
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let entries = stream::iter(payloads.into_iter().enumerate())
            .map(|(index, payload)| async move {
                let payload = payload.as_ref();
                let event_id = event_id_hint(payload);
                let result = self.process_json(payload).await;
                BatchEntry {
                    index,
                    event_id,
                    result,
                }
            })
            .buffered(self.batch_concurrency.max(1))
            .collect()
            .await;
        BatchSummary { entries }
    }

    async fn run(&self, event: &NotificationEvent) -> Result<ProcessOutcome, PipelineError> {
        match self.validator.validate_age(event) {
            AgeVerdict::Fresh => {}
            AgeVerdict::Stale { .. } => return Ok(ProcessOutcome::Skipped(SkipReason::Stale)),
            AgeVerdict::FutureDated { ahead } => {
                return Err(PipelineError::FutureDated {
                    event_id: event.id().to_string(),
                    ahead_secs: ahead.num_seconds(),
                })
            }
        }

        let decision = self.guard.check_and_reserve(event, self.clock.now()).await?;
        let key = match decision {
            GuardDecision::Send { key } => key,
            GuardDecision::SkipDuplicate { .. } => {
                return Ok(ProcessOutcome::Skipped(SkipReason::Duplicate))
            }
            GuardDecision::RejectSecurity { key } => return Err(PipelineError::Security { key }),
        };

        let lease = self.enrichment.enrich(event).await.into_record();

        if let Some(lease) = &lease {
            if event.kind().is_threshold_alert() && lease_window_closed(lease, self.clock.now()) {
                self.metrics.increment(Metric::LeaseWindowSkip, &[]);
                self.metrics
                    .increment(Metric::NotificationSkipped, &[Tag::reason("lease_window")]);
                tracing::info!(
                    key = %key,
                    status = lease.get_str("status").unwrap_or("unknown"),
                    "threshold alert for ended lease skipped"
                );
                return Ok(ProcessOutcome::Skipped(SkipReason::LeaseWindow));
            }
        }

        self.send(event, &key, lease.as_ref()).await
    }

    async fn send(
        &self,
        event: &NotificationEvent,
        key: &IdempotencyKey,
        lease: Option<&LeaseRecord>,
    ) -> Result<ProcessOutcome, PipelineError> {
        let template_id = self.router.template_for(event.kind());
        let personalised = personalise(event, lease);
        let recipient = event.user_email().unwrap_or_default();

        match self
            .sender
            .send(template_id, recipient, personalised.values, key.as_str())
            .await
        {
            Ok(dispatched) => {
                self.metrics.increment(
                    Metric::NotificationSuccess,
                    &[Tag::new("template", template_id)],
                );
                Ok(ProcessOutcome::Sent {
                    receipt: dispatched.receipt,
                    enriched: lease.is_some(),
                    rendered: dispatched.rendered,
                })
            }
            Err(err) if err.may_have_delivered() => {
                tracing::warn!(
                    key = %key,
                    error = %err,
                    "provider response unreadable; keeping reservation"
                );
                Err(err.into())
            }
            Err(err) => {
                if let Err(release_err) = self.guard.release(key).await {
                    tracing::error!(
                        key = %key,
                        error = %release_err,
                        "failed to release reservation; redelivery will be treated as duplicate"
                    );
                }
                Err(err.into())
            }
        }
    }

    fn record_failure(&self, event: Option<&NotificationEvent>, err: &PipelineError) {
        self.metrics.increment(
            Metric::NotificationFailure,
            &[Tag::category(err.category())],
        );
        let event_id = event.map(|e| e.id().to_string());
        match err.class() {
            ErrorClass::Security => tracing::error!(
                event_id = ?event_id,
                class = %err.class(),
                error = %err,
                "notification rejected"
            ),
            ErrorClass::Retriable => tracing::warn!(
                event_id = ?event_id,
                class = %err.class(),
                category = err.category(),
                error = %err,
                "notification failed, redelivery may succeed"
            ),
            ErrorClass::Permanent => tracing::error!(
                event_id = ?event_id,
                class = %err.class(),
                category = err.category(),
                error = %err,
                "notification failed permanently"
            ),
        }
    }
}

/// Lease ended, or past its expiry date
fn lease_window_closed(lease: &LeaseRecord, now: DateTime<Utc>) -> bool {
    lease.status().is_some_and(|s| s.is_terminal())
        || lease.expiration_date().is_some_and(|expiry| expiry <= now)
}

/// Best-effort `id` for batch reporting of payloads that fail to parse
fn event_id_hint(payload: &[u8]) -> Option<String> {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()?
        .get("id")?
        .as_str()
        .map(str::to_owned)
}

/// Assembles a [`NotificationPipeline`]
///
/// Unset collaborators default to the production ones: in-process moka
/// store, empty lease table, `metrics` facade, system clock and the Notify
/// HTTP client built from `sender` settings.
#[derive(Debug)]
pub struct PipelineBuilder {
    config: NotifyConfig,
    store: Option<Arc<dyn IdempotencyStore>>,
    lease_table: Option<Arc<dyn LeaseTable>>,
    client: Option<Arc<dyn NotificationClient>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    clock: Option<Arc<dyn Clock>>,
    batch_concurrency: usize,
}

impl PipelineBuilder {
    /// Create a builder
    #[must_use]
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            config,
            store: None,
            lease_table: None,
            client: None,
            metrics: None,
            clock: None,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    /// With an idempotency store
    #[must_use]
    pub fn store(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// With a lease table
    #[must_use]
    pub fn lease_table(mut self, table: Arc<dyn LeaseTable>) -> Self {
        self.lease_table = Some(table);
        self
    }

    /// With a notification client
    #[must_use]
    pub fn client(mut self, client: Arc<dyn NotificationClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// With a metrics sink
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// With a clock
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// With batch concurrency
    #[must_use]
    pub fn batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency;
        self
    }

    /// Validate configuration and wire the pipeline
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid, or no client
    /// was supplied and `sender.api_key` is missing or malformed
    pub fn build(self) -> Result<NotificationPipeline, ConfigError> {
        let config = self.config;
        config.validate()?;

        let metrics = self.metrics.unwrap_or_else(|| {
            FacadeSink::describe_all();
            Arc::new(FacadeSink)
        });
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self.store.unwrap_or_else(|| {
            Arc::new(MokaIdempotencyStore::new(config.idempotency.capacity))
        });
        let lease_table = self
            .lease_table
            .unwrap_or_else(|| Arc::new(InMemoryLeaseTable::new()));
        let client = match self.client {
            Some(client) => client,
            None => {
                let api_key = config.sender.api_key.as_deref().ok_or_else(|| {
                    ConfigError::Invalid(
                        "sender.api_key is required without a custom client".into(),
                    )
                })?;
                let client = GovNotifyClient::new(
                    config.sender.base_url.clone(),
                    api_key,
                    config.sender_timeout(),
                )
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                Arc::new(client)
            }
        };

        let validator = EventAgeValidator::new(clock.clone(), metrics.clone())
            .with_max_age(config.max_age())
            .with_future_skew(config.future_skew());
        let guard = IdempotencyGuard::new(
            store,
            metrics.clone(),
            config.idempotency.namespace.clone(),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))?
        .with_ttl(config.ttl());
        let enrichment = EnrichmentLookup::new(lease_table, metrics.clone())
            .with_config(config.enrichment_config()?);
        let sender = NotificationSender::new(client, Arc::new(config.catalog()))
            .with_retry(config.retry_policy());

        tracing::debug!(
            namespace = %config.idempotency.namespace,
            templates = sender.catalog().len(),
            "notification pipeline ready"
        );

        Ok(NotificationPipeline {
            validator,
            guard,
            enrichment,
            sender,
            router: config.router(),
            metrics,
            clock,
            batch_concurrency: self.batch_concurrency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lease(status: &str, expiry: &str) -> LeaseRecord {
        LeaseRecord::from_value(json!({
            "userEmail": "a@example.gov.uk",
            "uuid": "lease-1",
            "status": status,
            "expirationDate": expiry
        }))
        .unwrap()
    }

    #[test]
    fn window_closes_on_terminal_status_or_expiry() {
        let now = Utc::now();
        let future = (now + chrono::Duration::days(3)).to_rfc3339();
        let past = (now - chrono::Duration::days(1)).to_rfc3339();

        assert!(!lease_window_closed(&lease("Active", &future), now));
        assert!(lease_window_closed(&lease("Expired", &future), now));
        assert!(lease_window_closed(&lease("ManuallyTerminated", &future), now));
        assert!(lease_window_closed(&lease("Active", &past), now));
    }

    #[test]
    fn id_hint_survives_invalid_events() {
        assert_eq!(
            event_id_hint(br#"{"id":"abc-9","time":"not a time"}"#),
            Some("abc-9".into())
        );
        assert_eq!(event_id_hint(b"not json"), None);
    }

    #[test]
    fn builder_requires_client_or_api_key() {
        let err = NotificationPipeline::builder(NotifyConfig::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
