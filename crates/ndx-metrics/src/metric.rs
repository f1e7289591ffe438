//! Metric names and tags emitted by the pipeline

use std::fmt::{self, Display, Formatter};

/// Every metric the pipeline emits
///
/// Names are part of the contract with the external dashboards and alarms;
/// renaming one breaks alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    /// Email accepted by the provider
    NotificationSuccess,
    /// Email could not be sent (tag: `category`)
    NotificationFailure,
    /// Event deliberately not sent (tag: `reason`)
    NotificationSkipped,
    /// Idempotency key seen before with the same recipient
    IdempotencyHit,
    /// Threshold alert for a lease that is no longer live
    LeaseWindowSkip,
    /// Idempotency key reused with a different recipient
    IdempotencyTampering,
    /// Event older than the replay window
    StaleEventRejected,
    /// Lease table query latency (tag: `outcome`)
    EnrichmentQueryLatencyMs,
    /// Enrichment skipped (tag: `reason`)
    EnrichmentSkipped,
}

impl Metric {
    /// All metrics, in declaration order
    pub const ALL: [Metric; 9] = [
        Metric::NotificationSuccess,
        Metric::NotificationFailure,
        Metric::NotificationSkipped,
        Metric::IdempotencyHit,
        Metric::LeaseWindowSkip,
        Metric::IdempotencyTampering,
        Metric::StaleEventRejected,
        Metric::EnrichmentQueryLatencyMs,
        Metric::EnrichmentSkipped,
    ];

    /// Exported metric name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Metric::NotificationSuccess => "NotificationSuccess",
            Metric::NotificationFailure => "NotificationFailure",
            Metric::NotificationSkipped => "NotificationSkipped",
            Metric::IdempotencyHit => "IdempotencyHit",
            Metric::LeaseWindowSkip => "LeaseWindowSkip",
            Metric::IdempotencyTampering => "IdempotencyTampering",
            Metric::StaleEventRejected => "StaleEventRejected",
            Metric::EnrichmentQueryLatencyMs => "EnrichmentQueryLatencyMs",
            Metric::EnrichmentSkipped => "EnrichmentSkipped",
        }
    }

    /// Counter or histogram
    #[must_use]
    pub const fn kind(self) -> MetricKind {
        match self {
            Metric::EnrichmentQueryLatencyMs => MetricKind::Histogram,
            _ => MetricKind::Counter,
        }
    }

    /// One-line description for exporters
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Metric::NotificationSuccess => "Notifications accepted by the email provider",
            Metric::NotificationFailure => "Notifications that failed to send, by error category",
            Metric::NotificationSkipped => "Notifications deliberately not sent, by reason",
            Metric::IdempotencyHit => "Duplicate deliveries of an already processed event",
            Metric::LeaseWindowSkip => "Threshold alerts dropped because the lease has ended",
            Metric::IdempotencyTampering => "Idempotency keys replayed with a different recipient",
            Metric::StaleEventRejected => "Events older than the replay window",
            Metric::EnrichmentQueryLatencyMs => "Lease table query latency in milliseconds",
            Metric::EnrichmentSkipped => "Notifications sent without lease enrichment, by reason",
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonic counter
    Counter,
    /// Distribution of observed values
    Histogram,
}

/// Dimension attached to a metric sample
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    /// Dimension name
    pub key: &'static str,
    /// Dimension value
    pub value: String,
}

impl Tag {
    /// Create a tag
    #[inline]
    #[must_use]
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// `reason=<value>`
    #[inline]
    #[must_use]
    pub fn reason(value: impl Into<String>) -> Self {
        Self::new("reason", value)
    }

    /// `category=<value>`
    #[inline]
    #[must_use]
    pub fn category(value: impl Into<String>) -> Self {
        Self::new("category", value)
    }

    /// `outcome=<value>`
    #[inline]
    #[must_use]
    pub fn outcome(value: impl Into<String>) -> Self {
        Self::new("outcome", value)
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = Metric::ALL.iter().map(|m| m.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Metric::ALL.len());
    }

    #[test]
    fn only_latency_is_histogram() {
        for metric in Metric::ALL {
            let expected = if metric == Metric::EnrichmentQueryLatencyMs {
                MetricKind::Histogram
            } else {
                MetricKind::Counter
            };
            assert_eq!(metric.kind(), expected, "{metric}");
        }
    }

    #[test]
    fn tag_display() {
        assert_eq!(Tag::reason("duplicate").to_string(), "reason=duplicate");
    }
}
