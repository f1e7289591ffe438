//! Error types for event parsing and key derivation

/// Errors raised while turning raw JSON into a [`crate::NotificationEvent`]
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Payload is not valid JSON or not an object
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A required envelope field is absent
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong shape
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Field name as it appears on the wire
        field: &'static str,
        /// Human-readable reason
        reason: String,
    },

    /// `time` is not an RFC 3339 timestamp
    #[error("invalid event time '{value}': {source}")]
    InvalidTime {
        /// Raw value received
        value: String,
        /// Parser failure
        #[source]
        source: chrono::ParseError,
    },

    /// Idempotency namespace is empty or contains the key separator
    #[error("invalid idempotency namespace '{0}'")]
    InvalidNamespace(String),
}

impl EventError {
    /// Create an invalid field error
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_display() {
        let err = EventError::MissingField("id");
        assert_eq!(err.to_string(), "missing required field: id");
    }

    #[test]
    fn invalid_field_display() {
        let err = EventError::invalid_field("detail", "expected object");
        assert!(err.to_string().contains("expected object"));
    }
}
