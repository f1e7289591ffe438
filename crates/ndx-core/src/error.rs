//! Pipeline error taxonomy
//!
//! Every failure belongs to exactly one [`ErrorClass`]. Skips are not errors;
//! they are reported as `ProcessOutcome::Skipped`.

use ndx_event::{EventError, IdempotencyKey};
use ndx_idempotency::GuardError;
use ndx_sender::SendError;
use std::fmt::{self, Display, Formatter};

/// How the event source should treat a failed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad input, template or configuration: fail, do not retry
    Permanent,
    /// Transient: redeliver with backoff
    Retriable,
    /// Idempotency key reused for another recipient: fail, alert, never retry
    Security,
}

impl ErrorClass {
    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permanent => "permanent",
            Self::Retriable => "retriable",
            Self::Security => "security",
        }
    }
}

impl Display for ErrorClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline failures
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Event could not be parsed
    #[error("malformed event: {0}")]
    Event(#[from] EventError),

    /// Event timestamp is too far ahead
    #[error("event {event_id} is dated {ahead_secs}s in the future")]
    FutureDated {
        /// Event id
        event_id: String,
        /// Seconds ahead of the pipeline clock
        ahead_secs: i64,
    },

    /// Idempotency guard failed
    #[error(transparent)]
    Idempotency(#[from] GuardError),

    /// Idempotency key replayed with a different recipient
    #[error("security violation: idempotency key {key} reused with a different recipient")]
    Security {
        /// Reused key
        key: IdempotencyKey,
    },

    /// Email could not be sent
    #[error("send failed: {0}")]
    Send(#[from] SendError),
}

impl PipelineError {
    /// Failure class
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Security { .. } => ErrorClass::Security,
            Self::Idempotency(e) if e.is_retryable() => ErrorClass::Retriable,
            Self::Send(e) if e.is_retryable() => ErrorClass::Retriable,
            Self::Event(_) | Self::FutureDated { .. } | Self::Idempotency(_) | Self::Send(_) => {
                ErrorClass::Permanent
            }
        }
    }

    /// Check if redelivery may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retriable
    }

    /// `category` tag for `NotificationFailure`
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Event(_) => "malformed",
            Self::FutureDated { .. } => "future_dated",
            Self::Idempotency(GuardError::MissingRecipient(_)) => "missing_recipient",
            Self::Idempotency(GuardError::Key(_)) => "malformed",
            Self::Idempotency(GuardError::Store(_)) => "idempotency_store",
            Self::Security { .. } => "security",
            Self::Send(e) => e.category().as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndx_idempotency::StoreError;

    #[test]
    fn classes() {
        assert_eq!(
            PipelineError::from(SendError::api(503, "x")).class(),
            ErrorClass::Retriable
        );
        assert_eq!(
            PipelineError::from(SendError::api(404, "x")).class(),
            ErrorClass::Permanent
        );
        assert_eq!(
            PipelineError::from(GuardError::Store(StoreError::Throttled("x".into()))).class(),
            ErrorClass::Retriable
        );
        assert_eq!(
            PipelineError::from(GuardError::MissingRecipient("abc".into())).class(),
            ErrorClass::Permanent
        );
        assert_eq!(
            PipelineError::FutureDated {
                event_id: "abc".into(),
                ahead_secs: 3600
            }
            .class(),
            ErrorClass::Permanent
        );
    }

    #[test]
    fn categories() {
        assert_eq!(PipelineError::from(SendError::api(429, "x")).category(), "rate_limit");
        assert_eq!(
            PipelineError::from(GuardError::MissingRecipient("abc".into())).category(),
            "missing_recipient"
        );
    }
}
