//! Send error taxonomy

use crate::render::RenderError;
use std::fmt::{self, Display, Formatter};

/// User-facing failure category, used as the `category` metric tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 401 / 403
    Auth,
    /// 404
    NotFound,
    /// 409
    Conflict,
    /// Any other 4xx
    Validation,
    /// 429
    RateLimit,
    /// 5xx
    Server,
    /// Connection failure
    Network,
    /// Request exceeded its budget
    Timeout,
    /// Template could not be rendered
    Render,
    /// Client misconfigured
    Config,
    /// Accepted but the response could not be read
    Protocol,
}

impl ErrorCategory {
    /// Classify an HTTP status
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            404 => Self::NotFound,
            409 => Self::Conflict,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Validation,
        }
    }

    /// Metric tag value
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Validation => "validation",
            Self::RateLimit => "rate_limit",
            Self::Server => "server",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Render => "render",
            Self::Config => "config",
            Self::Protocol => "protocol",
        }
    }

    /// Check if a later attempt may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Server | Self::Network | Self::Timeout
        )
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Send failures
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Local rendering failed
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Provider rejected the request
    #[error("notify returned {status} ({category}): {message}")]
    Api {
        /// HTTP status
        status: u16,
        /// Classified status
        category: ErrorCategory,
        /// Provider message
        message: String,
    },

    /// Connection failed
    #[error("network error: {0}")]
    Network(String),

    /// No response within the budget
    #[error("request timed out")]
    Timeout,

    /// Client cannot be built from its settings
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// Provider accepted the request but its response is unreadable
    #[error("unreadable provider response: {0}")]
    InvalidResponse(String),
}

impl SendError {
    /// Build an API error from a status and provider message
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            category: ErrorCategory::from_status(status),
            message: message.into(),
        }
    }

    /// Failure category
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Render(_) => ErrorCategory::Render,
            Self::Api { category, .. } => *category,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout => ErrorCategory::Timeout,
            Self::Config(_) => ErrorCategory::Config,
            Self::InvalidResponse(_) => ErrorCategory::Protocol,
        }
    }

    /// Check if the send may be retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Check if the provider may already have accepted the email
    #[inline]
    #[must_use]
    pub fn may_have_delivered(&self) -> bool {
        matches!(self, Self::InvalidResponse(_))
    }
}

impl From<reqwest::Error> for SendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::api(status.as_u16(), err.to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            Self::Config(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(ErrorCategory::from_status(401), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(403), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::NotFound);
        assert_eq!(ErrorCategory::from_status(409), ErrorCategory::Conflict);
        assert_eq!(ErrorCategory::from_status(400), ErrorCategory::Validation);
        assert_eq!(ErrorCategory::from_status(429), ErrorCategory::RateLimit);
        for status in 500..=504 {
            assert_eq!(ErrorCategory::from_status(status), ErrorCategory::Server);
        }
    }

    #[test]
    fn only_transient_failures_retry() {
        assert!(SendError::api(429, "slow down").is_retryable());
        assert!(SendError::api(503, "unavailable").is_retryable());
        assert!(SendError::Timeout.is_retryable());
        assert!(SendError::Network("reset".into()).is_retryable());

        assert!(!SendError::api(400, "bad email").is_retryable());
        assert!(!SendError::api(403, "bad key").is_retryable());
        assert!(!SendError::from(RenderError::UnknownTemplate("t".into())).is_retryable());
        assert!(!SendError::InvalidResponse("eof".into()).is_retryable());
    }

    #[test]
    fn only_unreadable_success_counts_as_possibly_delivered() {
        assert!(SendError::InvalidResponse("eof".into()).may_have_delivered());
        assert!(!SendError::api(503, "unavailable").may_have_delivered());
        assert!(!SendError::Timeout.may_have_delivered());
    }
}
