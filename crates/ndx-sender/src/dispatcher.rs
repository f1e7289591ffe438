//! Render-then-send with bounded retry

use crate::client::{EmailRequest, NotificationClient, SendReceipt};
use crate::error::SendError;
use crate::render::{render, Personalisation, RenderError, RenderedEmail};
use crate::template::TemplateCatalog;
use std::sync::Arc;
use std::time::Duration;

/// Retry policy for retriable send failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Accepted email with the body that was rendered for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    /// Provider acknowledgement
    pub receipt: SendReceipt,
    /// Locally rendered email
    pub rendered: RenderedEmail,
}

/// Renders emails locally and hands them to a [`NotificationClient`]
#[derive(Debug, Clone)]
pub struct NotificationSender {
    client: Arc<dyn NotificationClient>,
    catalog: Arc<TemplateCatalog>,
    retry: RetryPolicy,
}

impl NotificationSender {
    /// Create a sender with the default retry policy
    #[must_use]
    pub fn new(client: Arc<dyn NotificationClient>, catalog: Arc<TemplateCatalog>) -> Self {
        Self {
            client,
            catalog,
            retry: RetryPolicy::default(),
        }
    }

    /// With a custom retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Templates available to this sender
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Render a template without sending
    ///
    /// # Errors
    /// Returns `RenderError` if the template is unknown or a placeholder has
    /// no value
    pub fn preview(
        &self,
        template_id: &str,
        personalisation: &Personalisation,
    ) -> Result<RenderedEmail, RenderError> {
        let template = self
            .catalog
            .get(template_id)
            .ok_or_else(|| RenderError::UnknownTemplate(template_id.to_owned()))?;
        render(template, personalisation)
    }

    /// Render and send one email
    ///
    /// Rendering failures never reach the provider. Retriable provider
    /// failures are retried up to the policy's attempt limit.
    ///
    /// # Errors
    /// Returns the first permanent `SendError`, or the last retriable one once
    /// attempts are exhausted
    pub async fn send(
        &self,
        template_id: &str,
        recipient: &str,
        personalisation: Personalisation,
        reference: &str,
    ) -> Result<Dispatched, SendError> {
        let rendered = self.preview(template_id, &personalisation)?;
        let request = EmailRequest {
            email_address: recipient.to_owned(),
            template_id: template_id.to_owned(),
            personalisation,
            reference: reference.to_owned(),
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.client.send_email(&request).await {
                Ok(mut receipt) => {
                    receipt.attempts = attempt;
                    tracing::info!(
                        notification_id = %receipt.id,
                        template_id,
                        reference,
                        attempt,
                        "email accepted"
                    );
                    return Ok(Dispatched { receipt, rendered });
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        error = %err,
                        category = %err.category(),
                        attempt,
                        max_attempts,
                        reference,
                        "send failed, retrying"
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        category = %err.category(),
                        attempt,
                        retryable = err.is_retryable(),
                        reference,
                        "send failed"
                    );
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockNotificationClient;
    use crate::error::ErrorCategory;
    use crate::template::Template;
    use mockall::Sequence;

    fn catalog() -> Arc<TemplateCatalog> {
        Arc::new(TemplateCatalog::new().with(Template::new("t1", "Hi", "Hello ((name))")))
    }

    fn values() -> Personalisation {
        [("name".to_owned(), "Ada".to_owned())].into_iter().collect()
    }

    #[tokio::test]
    async fn render_failure_never_calls_provider() {
        let mut client = MockNotificationClient::new();
        client.expect_send_email().never();
        let sender = NotificationSender::new(Arc::new(client), catalog());

        let err = sender
            .send("t1", "a@example.gov.uk", Personalisation::new(), "ref")
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Render);
    }

    #[tokio::test]
    async fn unknown_template_is_permanent() {
        let mut client = MockNotificationClient::new();
        client.expect_send_email().never();
        let sender = NotificationSender::new(Arc::new(client), catalog());

        let err = sender
            .send("nope", "a@example.gov.uk", values(), "ref")
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_with_fixed_backoff() {
        let mut seq = Sequence::new();
        let mut client = MockNotificationClient::new();
        client
            .expect_send_email()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(SendError::api(503, "down")));
        client
            .expect_send_email()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|r| Ok(SendReceipt::new("n-1", Some(r.reference.clone()))));
        let sender = NotificationSender::new(Arc::new(client), catalog());

        let started = tokio::time::Instant::now();
        let dispatched = sender
            .send("t1", "a@example.gov.uk", values(), "ref")
            .await
            .unwrap();

        assert_eq!(dispatched.receipt.attempts, 3);
        assert_eq!(dispatched.rendered.body, "Hello Ada");
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let mut client = MockNotificationClient::new();
        client
            .expect_send_email()
            .times(3)
            .returning(|_| Err(SendError::Timeout));
        let sender = NotificationSender::new(Arc::new(client), catalog());

        let err = sender
            .send("t1", "a@example.gov.uk", values(), "ref")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let mut client = MockNotificationClient::new();
        client
            .expect_send_email()
            .times(1)
            .returning(|_| Err(SendError::api(403, "invalid token")));
        let sender = NotificationSender::new(Arc::new(client), catalog());

        let err = sender
            .send("t1", "a@example.gov.uk", values(), "ref")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Auth);
    }
}
