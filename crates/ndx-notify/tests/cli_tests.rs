//! End-to-end runs of the CLI commands against temp files

use chrono::{Duration, Utc};
use ndx_core::NotifyConfig;
use ndx_notify::commands::{self, ProcessArgs};
use ndx_test_utils::{approved_event, event_json};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

fn input_file(lines: &[Vec<u8>]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        file.write_all(line).unwrap();
        file.write_all(b"\n").unwrap();
    }
    file
}

fn sandbox_args(input: &NamedTempFile) -> ProcessArgs {
    ProcessArgs {
        input: input.path().display().to_string(),
        sandbox: true,
        ..ProcessArgs::default()
    }
}

async fn run(args: &ProcessArgs) -> (bool, String) {
    let mut out = Vec::new();
    let clean = commands::run_process(args, &mut out).await.unwrap();
    (clean, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn sandbox_run_sends_once_per_event_id() {
    let now = Utc::now();
    let event = event_json(&approved_event("evt-cli-1", "user@example.gov.uk", now));
    let input = input_file(&[event.clone(), event]);

    let (clean, out) = run(&sandbox_args(&input)).await;

    assert!(clean);
    assert!(out.contains("#0 evt-cli-1 sent"), "{out}");
    assert!(out.contains("#1 evt-cli-1 skipped reason=duplicate"), "{out}");
    assert!(out.contains("sent=1 duplicate=1"), "{out}");
    assert!(out.contains("sandbox deliveries: 1"), "{out}");
    assert!(!out.contains("user@example.gov.uk"), "recipient must be masked: {out}");
}

#[tokio::test]
async fn malformed_lines_fail_without_stopping_the_batch() {
    let now = Utc::now();
    let input = input_file(&[
        b"{not json".to_vec(),
        event_json(&approved_event("evt-cli-2", "user@example.gov.uk", now)),
    ]);

    let (clean, out) = run(&sandbox_args(&input)).await;

    assert!(!clean);
    assert!(out.contains("#0 - failed class=permanent category=malformed"), "{out}");
    assert!(out.contains("#1 evt-cli-2 sent"), "{out}");
}

#[tokio::test]
async fn stale_events_are_reported_as_skipped() {
    let old = Utc::now() - Duration::days(8);
    let input = input_file(&[event_json(&approved_event(
        "evt-cli-3",
        "user@example.gov.uk",
        old,
    ))]);

    let (clean, out) = run(&sandbox_args(&input)).await;

    assert!(clean);
    assert!(out.contains("skipped reason=stale"), "{out}");
    assert!(out.contains("sent=0 duplicate=0 stale=1"), "{out}");
}

#[tokio::test]
async fn lease_file_enriches_the_email() {
    let now = Utc::now();
    let mut leases = NamedTempFile::new().unwrap();
    let rows = json!([{
        "userEmail": "user@example.gov.uk",
        "uuid": "lease-1",
        "status": "Active",
        "originalLeaseTemplateName": "Bedrock Sandbox",
        "awsAccountId": "123456789012",
        "expirationDate": (now + Duration::days(14)).to_rfc3339(),
        "maxSpend": 50
    }]);
    leases.write_all(rows.to_string().as_bytes()).unwrap();
    let input = input_file(&[event_json(&approved_event(
        "evt-cli-4",
        "user@example.gov.uk",
        now,
    ))]);

    let args = ProcessArgs {
        leases: Some(leases.path().to_path_buf()),
        ..sandbox_args(&input)
    };
    let (clean, out) = run(&args).await;

    assert!(clean);
    assert!(out.contains("enriched=true"), "{out}");
    assert!(out.contains("subject=Your Bedrock Sandbox sandbox is ready"), "{out}");
}

#[tokio::test]
async fn json_array_input_is_accepted() {
    let now = Utc::now();
    let a = approved_event("evt-cli-5", "a@example.gov.uk", now).to_value();
    let b = approved_event("evt-cli-6", "b@example.gov.uk", now).to_value();
    let mut input = NamedTempFile::new().unwrap();
    input
        .write_all(json!([a, b]).to_string().as_bytes())
        .unwrap();

    let (clean, out) = run(&sandbox_args(&input)).await;

    assert!(clean);
    assert!(out.contains("sent=2"), "{out}");
}

#[tokio::test]
async fn missing_input_file_is_an_error() {
    let args = ProcessArgs {
        input: "/nonexistent/events.jsonl".into(),
        sandbox: true,
        ..ProcessArgs::default()
    };
    let mut out = Vec::new();
    assert!(commands::run_process(&args, &mut out).await.is_err());
}

#[test]
fn render_fills_placeholders() {
    let config = NotifyConfig::new();
    let personalisation = commands::parse_personalisation([
        "productName=Bedrock",
        "accountId=123456789012",
        "maxSpend=$50.00",
        "expiryDate=1 March 2026",
        "uuid=lease-1",
    ])
    .unwrap();

    let mut out = Vec::new();
    commands::run_render(&config, "lease-approved", &personalisation, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(out.starts_with("Subject: Your Bedrock sandbox is ready\n"), "{out}");
    assert!(out.contains("Budget: $50.00"), "{out}");
}

#[test]
fn render_reports_missing_values() {
    let config = NotifyConfig::new();
    let personalisation = commands::parse_personalisation(["productName=Bedrock"]).unwrap();
    let mut out = Vec::new();

    let err = commands::run_render(&config, "lease-approved", &personalisation, &mut out)
        .unwrap_err()
        .to_string();
    assert!(err.contains("accountId"), "{err}");
    assert!(commands::run_render(&config, "no-such-template", &personalisation, &mut out).is_err());
}

#[test]
fn check_config_lists_routes_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"
[validation]
max_age_days = 3

[templates.routes]
LeaseExtended = "lease-generic"
"#,
    )
    .unwrap();

    let config = commands::load_config(Some(file.path())).unwrap();
    let mut out = Vec::new();
    commands::run_check_config(&config, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();

    assert_eq!(out.lines().next(), Some("configuration ok"));
    assert!(out.contains("max_age_days=3"), "{out}");
    assert!(out.contains("  LeaseApproved -> lease-approved"), "{out}");
    assert!(out.contains("  LeaseExtended -> lease-generic"), "{out}");
    assert!(out.contains("  * -> lease-generic"), "{out}");
}

#[test]
fn check_config_rejects_invalid_files() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[validation]\nmax_age_days = 90\n").unwrap();
    assert!(commands::load_config(Some(file.path())).is_err());
}
