//! In-memory metrics sink
//!
//! Used by tests to assert on emitted metrics and by the CLI to print a run
//! summary.

use crate::metric::{Metric, Tag};
use crate::sink::MetricsSink;
use dashmap::DashMap;
use parking_lot::Mutex;

/// A metric plus its sorted tags
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Series {
    /// Metric
    pub metric: Metric,
    /// Tags, sorted by key
    pub tags: Vec<Tag>,
}

impl Series {
    fn new(metric: Metric, tags: &[Tag]) -> Self {
        let mut tags = tags.to_vec();
        tags.sort();
        Self { metric, tags }
    }

    fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.iter().any(|t| t.key == key && t.value == value)
    }
}

impl std::fmt::Display for Series {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.metric)?;
        if !self.tags.is_empty() {
            let tags: Vec<String> = self.tags.iter().map(ToString::to_string).collect();
            write!(f, "{{{}}}", tags.join(","))?;
        }
        Ok(())
    }
}

/// Counters and observations kept in process memory
#[derive(Debug, Default)]
pub struct InMemorySink {
    counters: DashMap<Series, u64>,
    observations: Mutex<Vec<(Series, f64)>>,
}

impl InMemorySink {
    /// Create an empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total count for a metric across all tag sets
    #[must_use]
    pub fn count(&self, metric: Metric) -> u64 {
        self.counters
            .iter()
            .filter(|entry| entry.key().metric == metric)
            .map(|entry| *entry.value())
            .sum()
    }

    /// Count for a metric restricted to samples carrying `key=value`
    #[must_use]
    pub fn count_tagged(&self, metric: Metric, key: &str, value: &str) -> u64 {
        self.counters
            .iter()
            .filter(|entry| entry.key().metric == metric && entry.key().has_tag(key, value))
            .map(|entry| *entry.value())
            .sum()
    }

    /// Observed values for a histogram, in recording order
    #[must_use]
    pub fn observations(&self, metric: Metric) -> Vec<f64> {
        self.observations
            .lock()
            .iter()
            .filter(|(series, _)| series.metric == metric)
            .map(|(_, value)| *value)
            .collect()
    }

    /// Observations restricted to samples carrying `key=value`
    #[must_use]
    pub fn observations_tagged(&self, metric: Metric, key: &str, value: &str) -> Vec<f64> {
        self.observations
            .lock()
            .iter()
            .filter(|(series, _)| series.metric == metric && series.has_tag(key, value))
            .map(|(_, value)| *value)
            .collect()
    }

    /// All counters, sorted by series
    #[must_use]
    pub fn counter_snapshot(&self) -> Vec<(Series, u64)> {
        let mut snapshot: Vec<_> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        snapshot.sort();
        snapshot
    }

    /// Forget everything recorded so far
    pub fn reset(&self) {
        self.counters.clear();
        self.observations.lock().clear();
    }
}

impl MetricsSink for InMemorySink {
    fn increment(&self, metric: Metric, tags: &[Tag]) {
        *self.counters.entry(Series::new(metric, tags)).or_insert(0) += 1;
    }

    fn observe(&self, metric: Metric, value: f64, tags: &[Tag]) {
        self.observations
            .lock()
            .push((Series::new(metric, tags), value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn counts_by_metric_and_tag() {
        let sink = InMemorySink::new();
        sink.increment(Metric::NotificationSkipped, &[Tag::reason("duplicate")]);
        sink.increment(Metric::NotificationSkipped, &[Tag::reason("duplicate")]);
        sink.increment(Metric::NotificationSkipped, &[Tag::reason("stale")]);
        sink.increment(Metric::IdempotencyHit, &[]);

        assert_eq!(sink.count(Metric::NotificationSkipped), 3);
        assert_eq!(
            sink.count_tagged(Metric::NotificationSkipped, "reason", "duplicate"),
            2
        );
        assert_eq!(sink.count(Metric::IdempotencyHit), 1);
        assert_eq!(sink.count(Metric::NotificationSuccess), 0);
    }

    #[test]
    fn tag_order_does_not_split_series() {
        let sink = InMemorySink::new();
        sink.increment(
            Metric::NotificationFailure,
            &[Tag::category("server"), Tag::new("kind", "LeaseApproved")],
        );
        sink.increment(
            Metric::NotificationFailure,
            &[Tag::new("kind", "LeaseApproved"), Tag::category("server")],
        );

        let snapshot = sink.counter_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].1, 2);
        assert_eq!(
            snapshot[0].0.to_string(),
            "NotificationFailure{category=server,kind=LeaseApproved}"
        );
    }

    #[test]
    fn observations_keep_order() {
        let sink = InMemorySink::new();
        sink.observe(Metric::EnrichmentQueryLatencyMs, 5.0, &[Tag::outcome("throttled")]);
        sink.observe(Metric::EnrichmentQueryLatencyMs, 7.0, &[Tag::outcome("found")]);

        assert_eq!(sink.observations(Metric::EnrichmentQueryLatencyMs), vec![5.0, 7.0]);
        assert_eq!(
            sink.observations_tagged(Metric::EnrichmentQueryLatencyMs, "outcome", "found"),
            vec![7.0]
        );

        sink.reset();
        assert!(sink.observations(Metric::EnrichmentQueryLatencyMs).is_empty());
    }
}
