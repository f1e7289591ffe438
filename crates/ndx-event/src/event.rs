//! Parsed lease lifecycle event
//!
//! The event source publishes EventBridge envelopes:
//!
//! ```text
//! { "id", "time", "schemaVersion", "detail-type", "source",
//!   "detail": { "userEmail", "uuid", ...event specific fields } }
//! ```
//!
//! `schemaVersion` is accepted either on the envelope or inside `detail`.

use crate::error::EventError;
use crate::key::KEY_SEPARATOR;
use crate::kind::EventKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};

/// Event identifier assigned by the event source
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Create an event id
    ///
    /// # Errors
    /// Returns `EventError::InvalidField` if the id is blank
    pub fn new(id: impl Into<String>) -> Result<Self, EventError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(EventError::invalid_field("id", "must not be blank"));
        }
        Ok(Self(id))
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Event schema version (`"v1"`, `"1.0"`, ...)
///
/// Never contains the idempotency key separator, so the version segment of a
/// key is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion(String);

impl SchemaVersion {
    /// Create a schema version
    ///
    /// # Errors
    /// Returns `EventError::InvalidField` if blank or containing `:`
    pub fn new(version: impl Into<String>) -> Result<Self, EventError> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(EventError::invalid_field("schemaVersion", "must not be blank"));
        }
        if version.contains(KEY_SEPARATOR) {
            return Err(EventError::invalid_field("schemaVersion", "must not contain ':'"));
        }
        Ok(Self(version))
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = EventError;

    fn try_from(version: String) -> Result<Self, Self::Error> {
        Self::new(version)
    }
}

impl From<SchemaVersion> for String {
    fn from(version: SchemaVersion) -> Self {
        version.0
    }
}

impl Display for SchemaVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wire envelope, every field optional so that absence is reported precisely
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    id: Option<Value>,
    time: Option<Value>,
    #[serde(rename = "schemaVersion")]
    schema_version: Option<Value>,
    #[serde(rename = "detail-type")]
    detail_type: Option<Value>,
    source: Option<Value>,
    detail: Option<Value>,
}

/// A lease lifecycle event, immutable once parsed
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    id: EventId,
    time: DateTime<Utc>,
    schema_version: SchemaVersion,
    kind: EventKind,
    source: Option<String>,
    detail: Map<String, Value>,
}

impl NotificationEvent {
    /// Create an event with an empty detail object
    #[must_use]
    pub fn new(
        id: EventId,
        time: DateTime<Utc>,
        schema_version: SchemaVersion,
        kind: EventKind,
    ) -> Self {
        Self {
            id,
            time,
            schema_version,
            kind,
            source: None,
            detail: Map::new(),
        }
    }

    /// With a detail field
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }

    /// With event source name
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Parse an event from raw JSON bytes
    ///
    /// # Errors
    /// Returns `EventError` if the payload is malformed or a required field is missing
    pub fn from_json(bytes: &[u8]) -> Result<Self, EventError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Parse an event from a JSON value
    ///
    /// # Errors
    /// Returns `EventError` if a required field is missing or malformed
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        if !value.is_object() {
            return Err(EventError::invalid_field("event", "expected a JSON object"));
        }
        let raw: RawEnvelope = serde_json::from_value(value)?;

        let detail = match raw.detail {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(EventError::invalid_field("detail", "expected an object")),
        };

        let id = EventId::new(required_string(raw.id, "id")?)?;

        let time_raw = required_string(raw.time, "time")?;
        let time = DateTime::parse_from_rfc3339(&time_raw)
            .map_err(|source| EventError::InvalidTime {
                value: time_raw.clone(),
                source,
            })?
            .with_timezone(&Utc);

        let schema_version = match raw.schema_version {
            Some(v) => required_string(Some(v), "schemaVersion")?,
            None => required_string(detail.get("schemaVersion").cloned(), "schemaVersion")?,
        };
        let schema_version = SchemaVersion::new(schema_version)?;

        let kind = match raw.detail_type {
            Some(Value::String(s)) => EventKind::from_detail_type(&s),
            None | Some(Value::Null) => EventKind::Unknown,
            Some(_) => return Err(EventError::invalid_field("detail-type", "expected a string")),
        };

        let source = raw.source.and_then(|v| v.as_str().map(str::to_owned));

        Ok(Self {
            id,
            time,
            schema_version,
            kind,
            source,
            detail,
        })
    }

    /// Render back to the EventBridge envelope shape
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut envelope = Map::new();
        envelope.insert("id".into(), Value::String(self.id.to_string()));
        envelope.insert("time".into(), Value::String(self.time.to_rfc3339()));
        envelope.insert(
            "schemaVersion".into(),
            Value::String(self.schema_version.to_string()),
        );
        envelope.insert(
            "detail-type".into(),
            Value::String(self.kind.as_str().to_owned()),
        );
        if let Some(source) = &self.source {
            envelope.insert("source".into(), Value::String(source.clone()));
        }
        envelope.insert("detail".into(), Value::Object(self.detail.clone()));
        Value::Object(envelope)
    }

    /// Event id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// Emission time
    #[inline]
    #[must_use]
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Schema version
    #[inline]
    #[must_use]
    pub fn schema_version(&self) -> &SchemaVersion {
        &self.schema_version
    }

    /// Event kind from `detail-type`
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Event source, if provided
    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Full detail object
    #[inline]
    #[must_use]
    pub fn detail(&self) -> &Map<String, Value> {
        &self.detail
    }

    /// Raw detail value
    #[inline]
    #[must_use]
    pub fn detail_value(&self, key: &str) -> Option<&Value> {
        self.detail.get(key)
    }

    /// `detail.userEmail` when it is a non-empty string
    #[must_use]
    pub fn user_email(&self) -> Option<&str> {
        non_empty_str(self.detail.get("userEmail"))
    }

    /// `detail.uuid` (lease id) when it is a non-empty string
    #[must_use]
    pub fn lease_uuid(&self) -> Option<&str> {
        non_empty_str(self.detail.get("uuid"))
    }

    /// Age of the event relative to `now` (negative for future-dated events)
    #[inline]
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.time
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_string(value: Option<Value>, field: &'static str) -> Result<String, EventError> {
    match value {
        None | Some(Value::Null) => Err(EventError::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) if field == "schemaVersion" => Ok(n.to_string()),
        Some(_) => Err(EventError::invalid_field(field, "expected a string")),
    }
}
