use ndx_sender::{
    has_unfilled_placeholders, ErrorCategory, NotificationSender, Personalisation, RetryPolicy,
    SandboxClient, SendError, Template, TemplateCatalog,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn catalog() -> TemplateCatalog {
    TemplateCatalog::new().with(Template::new(
        "lease-approved",
        "Your ((productName)) sandbox is ready",
        "Hello,\n\nLease ((uuid)) for account ((accountId)) is active.\nBudget: £((maxSpend))",
    ))
}

fn personalisation() -> Personalisation {
    [
        ("productName", "Bedrock"),
        ("uuid", "lease-1"),
        ("accountId", "123456789012"),
        ("maxSpend", "50.00"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect()
}

fn sender(client: Arc<SandboxClient>) -> NotificationSender {
    NotificationSender::new(client, Arc::new(catalog())).with_retry(RetryPolicy {
        max_attempts: 3,
        backoff: Duration::from_millis(10),
    })
}

#[tokio::test]
async fn sandbox_receives_rendered_email() {
    let client = Arc::new(SandboxClient::with_catalog(catalog()));
    let dispatched = sender(client.clone())
        .send("lease-approved", "a@example.gov.uk", personalisation(), "ndx:v1:abc-1")
        .await
        .unwrap();

    let deliveries = client.sent_to("a@example.gov.uk");
    assert_eq!(deliveries.len(), 1);
    let rendered = deliveries[0].rendered.clone().unwrap();
    assert_eq!(rendered, dispatched.rendered);
    assert_eq!(rendered.subject, "Your Bedrock sandbox is ready");
    assert!(!has_unfilled_placeholders(&rendered.body));
    for value in personalisation().values() {
        assert!(rendered.body.contains(value.as_str()) || rendered.subject.contains(value.as_str()));
    }
    assert_eq!(deliveries[0].request.reference, "ndx:v1:abc-1");
}

#[tokio::test]
async fn rate_limit_then_success() {
    let client = Arc::new(SandboxClient::with_catalog(catalog()));
    client.fail_next(SendError::api(429, "TooManyRequestsError"));

    let dispatched = sender(client.clone())
        .send("lease-approved", "a@example.gov.uk", personalisation(), "r")
        .await
        .unwrap();

    assert_eq!(dispatched.receipt.attempts, 2);
    assert_eq!(client.calls(), 2);
    assert_eq!(client.delivered(), 1);
}

#[tokio::test]
async fn missing_value_fails_before_provider() {
    let client = Arc::new(SandboxClient::with_catalog(catalog()));
    let mut values = personalisation();
    values.remove("accountId");

    let err = sender(client.clone())
        .send("lease-approved", "a@example.gov.uk", values, "r")
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Render);
    assert!(err.to_string().contains("accountId"));
    assert_eq!(client.calls(), 0);
}
