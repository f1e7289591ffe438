//! Personalisation assembly
//!
//! Precedence, lowest first:
//!
//! ```text
//! fallback value  <  event detail scalar  <  lease table value  <  base field
//! ```
//!
//! Fallbacks only fill enriched keys that nothing else provided, so a
//! template using them always renders. `uuid` is the one envelope field an
//! event may lack; it falls back to [`UUID_FALLBACK`].

use ndx_event::{LeaseRecord, NotificationEvent};
use ndx_sender::Personalisation;
use serde_json::Value;

/// Keys taken from the event envelope
pub const BASE_FIELDS: [&str; 4] = ["userEmail", "eventId", "eventType", "eventTime"];

/// Lease reference used when the event has no string `uuid`
pub const UUID_FALLBACK: &str = "not available";

/// Keys taken from the lease record, with their fallback values
pub const ENRICHED_FIELDS: [(&str, &str); 6] = [
    ("productName", "your sandbox"),
    ("accountId", "not yet assigned"),
    ("leaseStatus", "unknown"),
    ("expiryDate", "not set"),
    ("maxSpend", "not set"),
    ("totalCost", "$0.00"),
];

/// Personalisation plus the enriched keys that fell back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Personalised {
    /// Values for rendering
    pub values: Personalisation,
    /// Keys filled with a fallback: [`ENRICHED_FIELDS`] order, then `uuid`
    pub fallbacks: Vec<&'static str>,
}

/// Assemble personalisation for an event and its lease, if one was found
#[must_use]
pub fn personalise(event: &NotificationEvent, lease: Option<&LeaseRecord>) -> Personalised {
    let mut values = Personalisation::new();

    for (key, value) in event.detail() {
        if let Some(text) = scalar(value) {
            values.insert(key.clone(), text);
        }
    }

    if let Some(lease) = lease {
        for (key, value) in enriched_values(lease) {
            values.insert(key.to_owned(), value);
        }
    }

    let mut fallbacks = Vec::new();
    for (key, fallback) in ENRICHED_FIELDS {
        if !values.contains_key(key) {
            values.insert(key.to_owned(), fallback.to_owned());
            fallbacks.push(key);
        }
    }

    for (key, value) in base_values(event) {
        values.insert(key.to_owned(), value);
    }
    if event.lease_uuid().is_none() {
        values.insert("uuid".to_owned(), UUID_FALLBACK.to_owned());
        fallbacks.push("uuid");
    }

    if !fallbacks.is_empty() {
        tracing::info!(
            event_id = %event.id(),
            enriched = lease.is_some(),
            fallbacks = ?fallbacks,
            "personalisation fallbacks applied"
        );
    }

    Personalised { values, fallbacks }
}

fn base_values(event: &NotificationEvent) -> Vec<(&'static str, String)> {
    let mut base = vec![
        ("eventId", event.id().to_string()),
        ("eventType", event.kind().as_str().to_owned()),
        ("eventTime", event.time().to_rfc3339()),
    ];
    if let Some(email) = event.user_email() {
        base.push(("userEmail", email.to_owned()));
    }
    if let Some(uuid) = event.lease_uuid() {
        base.push(("uuid", uuid.to_owned()));
    }
    base
}

fn enriched_values(lease: &LeaseRecord) -> Vec<(&'static str, String)> {
    let mut enriched = Vec::new();
    if let Some(name) = lease.template_name() {
        enriched.push(("productName", name.to_owned()));
    }
    if let Some(account) = lease.account_id() {
        enriched.push(("accountId", account.to_owned()));
    }
    if let Some(status) = lease.get_str("status") {
        enriched.push(("leaseStatus", status.to_owned()));
    }
    if let Some(expiry) = lease.expiration_date() {
        enriched.push(("expiryDate", expiry.format("%-d %B %Y").to_string()));
    }
    if let Some(max_spend) = lease.max_spend() {
        enriched.push(("maxSpend", dollars(max_spend)));
    }
    if let Some(total) = lease.total_cost_accrued() {
        enriched.push(("totalCost", dollars(total)));
    }
    enriched
}

fn dollars(amount: f64) -> String {
    format!("${amount:.2}")
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ndx_event::{EventId, EventKind, SchemaVersion};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event() -> NotificationEvent {
        NotificationEvent::new(
            EventId::new("abc-1").unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            SchemaVersion::new("v1").unwrap(),
            EventKind::LeaseApproved,
        )
        .with_detail("userEmail", "a@example.gov.uk")
        .with_detail("uuid", "lease-1")
        .with_detail("accountId", "from-event")
        .with_detail("thresholdPercent", 75)
        .with_detail("nested", json!({ "ignored": true }))
    }

    fn lease() -> LeaseRecord {
        LeaseRecord::from_value(json!({
            "userEmail": "a@example.gov.uk",
            "uuid": "lease-1",
            "status": "Active",
            "originalLeaseTemplateName": "Bedrock",
            "awsAccountId": "123456789012",
            "expirationDate": "2026-03-08T09:30:00Z",
            "maxSpend": 50,
            "totalCostAccrued": "12.5"
        }))
        .unwrap()
    }

    #[test]
    fn enriched_values_win_over_detail() {
        let p = personalise(&event(), Some(&lease()));

        assert!(p.fallbacks.is_empty());
        assert_eq!(p.values["accountId"], "123456789012");
        assert_eq!(p.values["productName"], "Bedrock");
        assert_eq!(p.values["expiryDate"], "8 March 2026");
        assert_eq!(p.values["maxSpend"], "$50.00");
        assert_eq!(p.values["totalCost"], "$12.50");
        assert_eq!(p.values["thresholdPercent"], "75");
        assert!(!p.values.contains_key("nested"));
    }

    #[test]
    fn base_fields_are_always_present() {
        let p = personalise(&event(), None);

        assert_eq!(p.values["eventId"], "abc-1");
        assert_eq!(p.values["eventType"], "LeaseApproved");
        assert_eq!(p.values["eventTime"], "2026-03-01T09:30:00+00:00");
        assert_eq!(p.values["userEmail"], "a@example.gov.uk");
        assert_eq!(p.values["uuid"], "lease-1");
    }

    #[test]
    fn missing_lease_uses_detail_then_fallbacks() {
        let p = personalise(&event(), None);

        assert_eq!(p.values["accountId"], "from-event");
        assert_eq!(p.values["productName"], "your sandbox");
        assert_eq!(
            p.fallbacks,
            vec!["productName", "leaseStatus", "expiryDate", "maxSpend", "totalCost"]
        );
    }

    #[test]
    fn missing_or_non_string_uuid_falls_back() {
        let bare = NotificationEvent::new(
            EventId::new("abc-2").unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            SchemaVersion::new("v1").unwrap(),
            EventKind::LeaseApproved,
        )
        .with_detail("userEmail", "a@example.gov.uk");
        let p = personalise(&bare, None);
        assert_eq!(p.values["uuid"], UUID_FALLBACK);
        assert_eq!(p.fallbacks.last(), Some(&"uuid"));

        let numeric = event().with_detail("uuid", 42);
        let p = personalise(&numeric, None);
        assert_eq!(p.values["uuid"], UUID_FALLBACK);
    }
}
