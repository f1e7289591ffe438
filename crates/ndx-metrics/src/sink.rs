//! Metrics sink abstraction and the `metrics` facade implementation

use crate::metric::{Metric, Tag};
use metrics::Label;
use std::fmt::Debug;
use std::sync::Arc;

/// Destination for pipeline metrics
///
/// Implementations must be cheap to call from hot paths and must never fail:
/// a broken sink cannot stop a notification from being sent.
pub trait MetricsSink: Send + Sync + Debug {
    /// Increment a counter by one
    fn increment(&self, metric: Metric, tags: &[Tag]);

    /// Record a histogram observation
    fn observe(&self, metric: Metric, value: f64, tags: &[Tag]);
}

impl<T: MetricsSink + ?Sized> MetricsSink for Arc<T> {
    fn increment(&self, metric: Metric, tags: &[Tag]) {
        (**self).increment(metric, tags);
    }

    fn observe(&self, metric: Metric, value: f64, tags: &[Tag]) {
        (**self).observe(metric, value, tags);
    }
}

/// Forwards to whatever recorder is installed for the `metrics` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeSink;

impl FacadeSink {
    /// Register descriptions for every metric with the installed recorder
    pub fn describe_all() {
        for metric in Metric::ALL {
            match metric.kind() {
                crate::MetricKind::Counter => {
                    metrics::describe_counter!(metric.name(), metric.description());
                }
                crate::MetricKind::Histogram => {
                    metrics::describe_histogram!(
                        metric.name(),
                        metrics::Unit::Milliseconds,
                        metric.description()
                    );
                }
            }
        }
    }
}

fn labels(tags: &[Tag]) -> Vec<Label> {
    tags.iter()
        .map(|tag| Label::new(tag.key, tag.value.clone()))
        .collect()
}

impl MetricsSink for FacadeSink {
    fn increment(&self, metric: Metric, tags: &[Tag]) {
        metrics::counter!(metric.name(), labels(tags)).increment(1);
    }

    fn observe(&self, metric: Metric, value: f64, tags: &[Tag]) {
        metrics::histogram!(metric.name(), labels(tags)).record(value);
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn increment(&self, _metric: Metric, _tags: &[Tag]) {}

    fn observe(&self, _metric: Metric, _value: f64, _tags: &[Tag]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facade_without_recorder_is_silent() {
        let sink = FacadeSink;
        sink.increment(Metric::NotificationSuccess, &[]);
        sink.observe(
            Metric::EnrichmentQueryLatencyMs,
            12.0,
            &[Tag::outcome("found")],
        );
        FacadeSink::describe_all();
    }

    #[test]
    fn arc_sink_delegates() {
        let sink: Arc<dyn MetricsSink> = Arc::new(NoopSink);
        sink.increment(Metric::IdempotencyHit, &[]);
    }
}
