//! Event-age validation
//!
//! Old events are never sent, whatever the idempotency store says. The
//! window equals the idempotency TTL: an event older than that may have lost
//! its reservation, so sending it could duplicate an email.

use crate::clock::Clock;
use ndx_event::NotificationEvent;
use ndx_metrics::{Metric, MetricsSink, Tag};
use std::sync::Arc;

/// Default maximum event age in days
pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// Default tolerance for producer clocks running ahead, in seconds
pub const DEFAULT_FUTURE_SKEW_SECS: i64 = 300;

/// Outcome of an age check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeVerdict {
    /// Inside the window
    Fresh,
    /// Older than the window
    Stale {
        /// Age at check time
        age: chrono::Duration,
    },
    /// Timestamped further ahead than the skew tolerance
    FutureDated {
        /// How far ahead
        ahead: chrono::Duration,
    },
}

impl AgeVerdict {
    /// Check if the event may proceed
    #[inline]
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}

/// Rejects events outside the replay window
#[derive(Debug, Clone)]
pub struct EventAgeValidator {
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    max_age: chrono::Duration,
    future_skew: chrono::Duration,
}

impl EventAgeValidator {
    /// Create a validator with the default window and skew
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            clock,
            metrics,
            max_age: chrono::Duration::days(DEFAULT_MAX_AGE_DAYS),
            future_skew: chrono::Duration::seconds(DEFAULT_FUTURE_SKEW_SECS),
        }
    }

    /// With a custom maximum age
    #[inline]
    #[must_use]
    pub fn with_max_age(mut self, max_age: chrono::Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// With a custom future skew tolerance
    #[inline]
    #[must_use]
    pub fn with_future_skew(mut self, skew: chrono::Duration) -> Self {
        self.future_skew = skew;
        self
    }

    /// Classify an event by age
    ///
    /// Stale events are counted here (`StaleEventRejected` and
    /// `NotificationSkipped{reason=stale}`); future-dated ones are left to
    /// the caller's failure accounting.
    pub fn validate_age(&self, event: &NotificationEvent) -> AgeVerdict {
        let age = event.age_at(self.clock.now());

        if age > self.max_age {
            self.metrics.increment(Metric::StaleEventRejected, &[]);
            self.metrics
                .increment(Metric::NotificationSkipped, &[Tag::reason("stale")]);
            tracing::warn!(
                event_id = %event.id(),
                age_hours = age.num_hours(),
                max_age_days = self.max_age.num_days(),
                "stale event rejected"
            );
            return AgeVerdict::Stale { age };
        }

        let ahead = -age;
        if ahead > self.future_skew {
            tracing::warn!(
                event_id = %event.id(),
                ahead_secs = ahead.num_seconds(),
                "event timestamp is in the future"
            );
            return AgeVerdict::FutureDated { ahead };
        }

        AgeVerdict::Fresh
    }
}
