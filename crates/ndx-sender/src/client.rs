//! Notification provider interface

use crate::error::SendError;
use crate::render::Personalisation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Body of a Notify email request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailRequest {
    /// Recipient
    pub email_address: String,
    /// Notify template id
    pub template_id: String,
    /// Placeholder values
    pub personalisation: Personalisation,
    /// Caller reference, the idempotency key
    pub reference: String,
}

/// Provider acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Provider notification id
    pub id: String,
    /// Echoed reference
    #[serde(default)]
    pub reference: Option<String>,
    /// Attempts used, set by the dispatcher
    #[serde(default, skip_serializing)]
    pub attempts: u32,
}

impl SendReceipt {
    /// Receipt for a single attempt
    #[must_use]
    pub fn new(id: impl Into<String>, reference: Option<String>) -> Self {
        Self {
            id: id.into(),
            reference,
            attempts: 1,
        }
    }
}

/// Email provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationClient: Send + Sync + Debug {
    /// Send one email; one call is one attempt
    async fn send_email(&self, request: &EmailRequest) -> Result<SendReceipt, SendError>;
}
