//! In-process Notify stand-in
//!
//! Records every accepted request together with the locally rendered email.
//! Failures can be scripted to exercise retry paths.

use crate::client::{EmailRequest, NotificationClient, SendReceipt};
use crate::error::SendError;
use crate::render::{render, RenderedEmail};
use crate::template::TemplateCatalog;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// One accepted email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Notification id handed back to the caller
    pub id: String,
    /// Request as received
    pub request: EmailRequest,
    /// Rendered email, when the template is in the catalog
    pub rendered: Option<RenderedEmail>,
    /// Acceptance time
    pub accepted_at: DateTime<Utc>,
}

/// Notification client that keeps emails in memory
#[derive(Debug, Default)]
pub struct SandboxClient {
    catalog: TemplateCatalog,
    deliveries: Mutex<Vec<Delivery>>,
    scripted: Mutex<VecDeque<SendError>>,
    calls: AtomicU64,
}

impl SandboxClient {
    /// Create a sandbox that does not render
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sandbox that renders requests against a catalog
    #[must_use]
    pub fn with_catalog(catalog: TemplateCatalog) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    /// Fail the next call with `error`; queued failures are used in order
    pub fn fail_next(&self, error: SendError) {
        self.scripted.lock().push_back(error);
    }

    /// Accepted emails, oldest first
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Accepted emails for one recipient
    #[must_use]
    pub fn sent_to(&self, email_address: &str) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| d.request.email_address == email_address)
            .cloned()
            .collect()
    }

    /// Number of accepted emails
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.deliveries.lock().len()
    }

    /// Number of calls, failed ones included
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationClient for SandboxClient {
    async fn send_email(&self, request: &EmailRequest) -> Result<SendReceipt, SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.scripted.lock().pop_front() {
            tracing::debug!(error = %error, "sandbox returning scripted failure");
            return Err(error);
        }

        let rendered = match self.catalog.get(&request.template_id) {
            Some(template) => Some(render(template, &request.personalisation)?),
            None if self.catalog.is_empty() => None,
            None => return Err(SendError::api(400, "template not found")),
        };

        let id = Uuid::new_v4().to_string();
        self.deliveries.lock().push(Delivery {
            id: id.clone(),
            request: request.clone(),
            rendered,
            accepted_at: Utc::now(),
        });
        tracing::info!(
            notification_id = %id,
            template_id = %request.template_id,
            reference = %request.reference,
            "sandbox email accepted"
        );

        Ok(SendReceipt::new(id, Some(request.reference.clone())))
    }
}
