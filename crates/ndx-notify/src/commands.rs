//! Subcommand implementations
//!
//! Each command writes its report to the supplied writer and returns whether
//! the run was clean. Errors that stop a command from running at all are
//! returned as `anyhow::Error`.

use anyhow::{bail, Context, Result};
use ndx_core::{BatchEntry, BatchSummary, ErrorClass, NotificationPipeline, NotifyConfig};
use ndx_core::{ProcessOutcome, SkipReason};
use ndx_enrichment::InMemoryLeaseTable;
use ndx_event::mask_email;
use ndx_metrics::InMemorySink;
use ndx_sender::{render, Personalisation, SandboxClient};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Arguments for `process`
#[derive(Debug, Clone, Default)]
pub struct ProcessArgs {
    /// Event file, or `-` for stdin
    pub input: String,
    /// Configuration file
    pub config: Option<PathBuf>,
    /// Use the local sandbox client
    pub sandbox: bool,
    /// Lease records for enrichment
    pub leases: Option<PathBuf>,
}

/// Load configuration from an optional file plus the environment
///
/// # Errors
/// Returns an error if the file cannot be read or the result is invalid
pub fn load_config(path: Option<&Path>) -> Result<NotifyConfig> {
    NotifyConfig::load(path).context("loading configuration")
}

/// Split input text into raw event payloads
///
/// Text starting with `[` is a JSON array of events; anything else is read
/// as one event per non-empty line.
///
/// # Errors
/// Returns an error if array input is not valid JSON
pub fn split_events(text: &str) -> Result<Vec<Vec<u8>>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        let events: Vec<Value> =
            serde_json::from_str(trimmed).context("parsing event array")?;
        return events
            .iter()
            .map(|event| serde_json::to_vec(event).context("encoding event"))
            .collect();
    }
    Ok(trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.as_bytes().to_vec())
        .collect())
}

async fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("reading stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading {input}"))
}

/// Load lease records from a JSON array file
///
/// # Errors
/// Returns an error if the file is unreadable or a row is invalid
pub async fn load_leases(path: &Path) -> Result<InMemoryLeaseTable> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    InMemoryLeaseTable::from_json(value).with_context(|| format!("loading {}", path.display()))
}

/// Run `process`
///
/// # Errors
/// Returns an error if input, leases or configuration cannot be loaded
pub async fn run_process<W: Write>(args: &ProcessArgs, out: &mut W) -> Result<bool> {
    let config = load_config(args.config.as_deref())?;
    let metrics = Arc::new(InMemorySink::new());
    let mut builder = NotificationPipeline::builder(config.clone()).metrics(metrics.clone());

    if let Some(path) = &args.leases {
        let table = load_leases(path).await?;
        tracing::info!(rows = table.len(), path = %path.display(), "loaded lease records");
        builder = builder.lease_table(Arc::new(table));
    }

    let sandbox = args
        .sandbox
        .then(|| Arc::new(SandboxClient::with_catalog(config.catalog())));
    if let Some(client) = &sandbox {
        builder = builder.client(client.clone());
    }

    let pipeline = builder.build().context("building pipeline")?;
    let text = read_input(&args.input).await?;
    let payloads = split_events(&text)?;
    tracing::info!(events = payloads.len(), "processing input");

    let summary = pipeline.process_batch(&payloads).await;
    write_summary(out, &summary)?;

    if let Some(client) = &sandbox {
        writeln!(out, "sandbox deliveries: {}", client.delivered())?;
        for delivery in client.deliveries() {
            let subject = delivery
                .rendered
                .as_ref()
                .map_or("-", |rendered| rendered.subject.as_str());
            writeln!(
                out,
                "  {} to={} template={} subject={subject}",
                delivery.id,
                mask_email(&delivery.request.email_address),
                delivery.request.template_id,
            )?;
        }
    }

    writeln!(out, "metrics:")?;
    for (series, count) in metrics.counter_snapshot() {
        writeln!(out, "  {series} {count}")?;
    }

    Ok(summary.is_clean())
}

fn write_summary<W: Write>(out: &mut W, summary: &BatchSummary) -> Result<()> {
    for entry in &summary.entries {
        writeln!(out, "{}", describe_entry(entry))?;
    }
    writeln!(
        out,
        "sent={} duplicate={} stale={} lease_window={} permanent={} retriable={} security={}",
        summary.sent(),
        summary.skipped(SkipReason::Duplicate),
        summary.skipped(SkipReason::Stale),
        summary.skipped(SkipReason::LeaseWindow),
        summary.failed(ErrorClass::Permanent),
        summary.failed(ErrorClass::Retriable),
        summary.failed(ErrorClass::Security),
    )?;
    Ok(())
}

/// One report line for a batch entry
#[must_use]
pub fn describe_entry(entry: &BatchEntry) -> String {
    let event_id = entry.event_id.as_deref().unwrap_or("-");
    let status = match &entry.result {
        Ok(ProcessOutcome::Sent {
            receipt, enriched, ..
        }) => format!(
            "sent notification={} attempts={} enriched={enriched}",
            receipt.id, receipt.attempts
        ),
        Ok(ProcessOutcome::Skipped(reason)) => format!("skipped reason={reason}"),
        Err(err) => format!(
            "failed class={} category={}: {err}",
            err.class(),
            err.category()
        ),
    };
    format!("#{} {event_id} {status}", entry.index)
}

/// Parse `key=value` pairs into personalisation
///
/// # Errors
/// Returns an error for a pair without `=` or with an empty key
pub fn parse_personalisation<'a, I>(pairs: I) -> Result<Personalisation>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut personalisation = Personalisation::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("expected KEY=VALUE, got {pair:?}");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("empty key in {pair:?}");
        }
        personalisation.insert(key.to_owned(), value.to_owned());
    }
    Ok(personalisation)
}

/// Run `render`
///
/// # Errors
/// Returns an error for an unknown template or missing personalisation
pub fn run_render<W: Write>(
    config: &NotifyConfig,
    template_id: &str,
    personalisation: &Personalisation,
    out: &mut W,
) -> Result<()> {
    let catalog = config.catalog();
    let Some(template) = catalog.get(template_id) else {
        bail!("unknown template {template_id}");
    };
    let rendered = render(template, personalisation)?;
    writeln!(out, "Subject: {}", rendered.subject)?;
    writeln!(out)?;
    writeln!(out, "{}", rendered.body)?;
    Ok(())
}

/// Run `check-config`
///
/// # Errors
/// Returns an error if the configuration cannot be written out
pub fn run_check_config<W: Write>(config: &NotifyConfig, out: &mut W) -> Result<()> {
    let router = config.router();
    let catalog = config.catalog();

    writeln!(out, "configuration ok")?;
    writeln!(
        out,
        "idempotency: namespace={} ttl_days={} capacity={}",
        config.idempotency.namespace, config.idempotency.ttl_days, config.idempotency.capacity
    )?;
    writeln!(
        out,
        "validation: max_age_days={} future_skew_secs={}",
        config.validation.max_age_days, config.validation.future_skew_secs
    )?;
    writeln!(
        out,
        "sender: base_url={} api_key={}",
        config.sender.base_url,
        if config.sender.api_key.is_some() {
            "set"
        } else {
            "missing"
        }
    )?;
    writeln!(out, "routes:")?;
    for (kind, template_id) in router.routes() {
        writeln!(out, "  {kind} -> {template_id}")?;
    }
    writeln!(out, "  * -> {}", router.default_template())?;

    let mut templates: Vec<_> = catalog.iter().collect();
    templates.sort_by(|a, b| a.id.cmp(&b.id));
    writeln!(out, "templates:")?;
    for template in templates {
        let placeholders: Vec<&str> = template.placeholders().into_iter().collect();
        writeln!(out, "  {} ({})", template.id, placeholders.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_json_lines() {
        let events = split_events("{\"a\":1}\n\n  {\"b\":2}\n").unwrap();
        assert_eq!(events, vec![b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec()]);
    }

    #[test]
    fn splits_json_array() {
        let events = split_events(" [{\"a\":1},{\"b\":2}]").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], b"{\"b\":2}".to_vec());
    }

    #[test]
    fn rejects_broken_array() {
        assert!(split_events("[{\"a\":1}").is_err());
    }

    #[test]
    fn parses_pairs() {
        let p = parse_personalisation(["userEmail=a@b.c", "note=x=y"]).unwrap();
        assert_eq!(p.get("userEmail").map(String::as_str), Some("a@b.c"));
        assert_eq!(p.get("note").map(String::as_str), Some("x=y"));
        assert!(parse_personalisation(["novalue"]).is_err());
        assert!(parse_personalisation(["=x"]).is_err());
    }
}
