//! Enrichment lookup
//!
//! Fetches the lease behind an event so templates can mention the product,
//! account and budget. Enrichment is strictly additive: every failure ends in
//! [`EnrichmentOutcome::Skipped`], never in an error.
//!
//! # Retry policy
//!
//! ```text
//! throughput exceeded  -> sleep 500ms, retry once
//! anything else        -> skip
//! query > 2s           -> skip
//! ```

use crate::table::LeaseTable;
use ndx_event::{LeaseKey, LeaseRecord, NotificationEvent, SchemaFingerprint};
use ndx_metrics::{Metric, MetricsSink, Tag};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Lookup tuning
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Budget for the whole lookup, throttle retries included
    pub query_timeout: Duration,
    /// Fixed delay before retrying a throttled query
    pub throttle_backoff: Duration,
    /// Retries allowed after throttling
    pub throttle_retries: u32,
    /// Known-good schema; a different fingerprint is logged as drift
    pub expected_fingerprint: Option<SchemaFingerprint>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(2),
            throttle_backoff: Duration::from_millis(500),
            throttle_retries: 1,
            expected_fingerprint: None,
        }
    }
}

/// Why enrichment did not produce a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// `userEmail` or `uuid` missing or not a string
    MissingKey {
        /// Offending field
        field: &'static str,
    },
    /// No lease with that key
    NotFound,
    /// Still throttled after the retry
    Throttled,
    /// Query exceeded its budget
    Timeout,
    /// Non-retriable backend error
    Backend(String),
}

impl SkipReason {
    /// Metric tag value
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingKey { .. } => "missing_key",
            Self::NotFound => "not_found",
            Self::Throttled => "throttled",
            Self::Timeout => "timeout",
            Self::Backend(_) => "backend_error",
        }
    }
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey { field } => write!(f, "missing or non-string {field}"),
            Self::Backend(message) => write!(f, "backend error: {message}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of a lookup
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    /// Lease found
    Found(LeaseRecord),
    /// Continue without enrichment
    Skipped(SkipReason),
}

impl EnrichmentOutcome {
    /// Record, if found
    #[inline]
    #[must_use]
    pub fn record(&self) -> Option<&LeaseRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::Skipped(_) => None,
        }
    }

    /// Consume into the record, if found
    #[inline]
    #[must_use]
    pub fn into_record(self) -> Option<LeaseRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::Skipped(_) => None,
        }
    }
}

/// Lease lookup with bounded retry and latency metrics
#[derive(Debug, Clone)]
pub struct EnrichmentLookup {
    table: Arc<dyn LeaseTable>,
    metrics: Arc<dyn MetricsSink>,
    config: EnrichmentConfig,
}

impl EnrichmentLookup {
    /// Create a lookup with default tuning
    #[must_use]
    pub fn new(table: Arc<dyn LeaseTable>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            table,
            metrics,
            config: EnrichmentConfig::default(),
        }
    }

    /// With custom tuning
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: EnrichmentConfig) -> Self {
        self.config = config;
        self
    }

    /// Current tuning
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Enrich an event from its `detail.userEmail` / `detail.uuid`
    pub async fn enrich(&self, event: &NotificationEvent) -> EnrichmentOutcome {
        self.fetch_lease_record(event.detail_value("userEmail"), event.detail_value("uuid"))
            .await
    }

    /// Fetch the lease for a raw `(userEmail, uuid)` pair
    ///
    /// Accepts raw JSON values so that non-string inputs are classified here
    /// rather than rejected by the caller.
    pub async fn fetch_lease_record(
        &self,
        user_email: Option<&Value>,
        uuid: Option<&Value>,
    ) -> EnrichmentOutcome {
        let Some(user_email) = key_part(user_email) else {
            return self.skip(SkipReason::MissingKey { field: "userEmail" });
        };
        let Some(uuid) = key_part(uuid) else {
            return self.skip(SkipReason::MissingKey { field: "uuid" });
        };
        let key = LeaseKey::new(user_email, uuid);

        let deadline = Instant::now() + self.config.query_timeout;
        let mut retries = 0;
        loop {
            let started = Instant::now();
            let result = tokio::time::timeout_at(deadline, self.table.get_lease(&key)).await;
            let elapsed = started.elapsed();

            match result {
                Err(_) => {
                    self.observe_latency(elapsed, "timeout");
                    return self.skip(SkipReason::Timeout);
                }
                Ok(Ok(Some(record))) => {
                    self.observe_latency(elapsed, "found");
                    self.inspect_schema(&record);
                    tracing::debug!(lease = %key, latency_ms = elapsed.as_millis(), "lease enriched");
                    return EnrichmentOutcome::Found(record);
                }
                Ok(Ok(None)) => {
                    self.observe_latency(elapsed, "not_found");
                    return self.skip(SkipReason::NotFound);
                }
                Ok(Err(err)) if err.is_throttle() => {
                    self.observe_latency(elapsed, "throttled");
                    if retries >= self.config.throttle_retries {
                        return self.skip(SkipReason::Throttled);
                    }
                    if Instant::now() + self.config.throttle_backoff >= deadline {
                        tracing::warn!(
                            lease = %key,
                            "lease table throttled, no budget left to retry"
                        );
                        return self.skip(SkipReason::Throttled);
                    }
                    retries += 1;
                    tracing::warn!(
                        lease = %key,
                        backoff_ms = self.config.throttle_backoff.as_millis(),
                        error = %err,
                        "lease table throttled, retrying"
                    );
                    tokio::time::sleep(self.config.throttle_backoff).await;
                }
                Ok(Err(err)) => {
                    self.observe_latency(elapsed, "error");
                    return self.skip(SkipReason::Backend(err.to_string()));
                }
            }
        }
    }

    fn skip(&self, reason: SkipReason) -> EnrichmentOutcome {
        self.metrics
            .increment(Metric::EnrichmentSkipped, &[Tag::reason(reason.as_str())]);
        tracing::warn!(reason = %reason, "enrichment skipped, sending base notification");
        EnrichmentOutcome::Skipped(reason)
    }

    fn observe_latency(&self, elapsed: Duration, outcome: &'static str) {
        self.metrics.observe(
            Metric::EnrichmentQueryLatencyMs,
            elapsed.as_secs_f64() * 1_000.0,
            &[Tag::outcome(outcome)],
        );
    }

    fn inspect_schema(&self, record: &LeaseRecord) {
        let fingerprint = record.fingerprint();
        tracing::debug!(
            fingerprint = %fingerprint.short(),
            field_count = record.attributes().len(),
            "lease schema fingerprint"
        );
        if let Some(expected) = &self.config.expected_fingerprint {
            if *expected != fingerprint {
                let fields: Vec<&str> = record.attributes().keys().map(String::as_str).collect();
                tracing::warn!(
                    expected = %expected.short(),
                    actual = %fingerprint.short(),
                    fields = ?fields,
                    "lease table schema drift detected"
                );
            }
        }
    }
}

fn key_part(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
