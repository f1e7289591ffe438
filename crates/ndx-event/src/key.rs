//! Idempotency key derivation

use crate::error::EventError;
use crate::event::NotificationEvent;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Separator between key segments
pub const KEY_SEPARATOR: char = ':';

/// Deterministic `<namespace>:<schemaVersion>:<event.id>` key
///
/// The namespace keeps keys of different deployments (or of a future
/// incompatible pipeline) from colliding in a shared store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derive the key for an event
    ///
    /// # Errors
    /// Returns `EventError::InvalidNamespace` if the namespace is blank or
    /// contains the key separator
    pub fn for_event(namespace: &str, event: &NotificationEvent) -> Result<Self, EventError> {
        validate_namespace(namespace)?;
        Ok(Self(format!(
            "{namespace}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            event.schema_version(),
            event.id()
        )))
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace segment
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.0.split(KEY_SEPARATOR).next().unwrap_or_default()
    }
}

impl Display for IdempotencyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check a namespace is usable as the first key segment
///
/// # Errors
/// Returns `EventError::InvalidNamespace` when blank or containing `:`
pub fn validate_namespace(namespace: &str) -> Result<(), EventError> {
    if namespace.trim().is_empty() || namespace.contains(KEY_SEPARATOR) {
        return Err(EventError::InvalidNamespace(namespace.to_owned()));
    }
    Ok(())
}
