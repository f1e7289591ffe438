//! Lease table records used to enrich notifications
//!
//! The lease table is owned upstream and its schema drifts; records are
//! therefore kept as raw attribute maps with typed accessors on top.

use crate::error::EventError;
use crate::fingerprint::SchemaFingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};

/// Composite lease table key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LeaseKey {
    /// Lease owner
    #[serde(rename = "userEmail")]
    pub user_email: String,
    /// Lease id
    pub uuid: String,
}

impl LeaseKey {
    /// Create a lease key
    #[inline]
    #[must_use]
    pub fn new(user_email: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            user_email: user_email.into(),
            uuid: uuid.into(),
        }
    }
}

impl Display for LeaseKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", crate::email::mask_email(&self.user_email), self.uuid)
    }
}

/// Lease status as stored in the lease table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LeaseStatus {
    /// Awaiting approval
    PendingApproval,
    /// Request denied
    ApprovalDenied,
    /// Lease in use
    Active,
    /// Lease paused at a limit
    Frozen,
    /// Lease reached end date
    Expired,
    /// Spend exceeded budget
    BudgetExceeded,
    /// Terminated by an operator
    ManuallyTerminated,
    /// Account quarantined after failed cleanup
    AccountQuarantined,
    /// Account ejected from the pool
    Ejected,
    /// Unrecognised status string
    Other(String),
}

impl LeaseStatus {
    /// Parse the stored status string
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "PendingApproval" => Self::PendingApproval,
            "ApprovalDenied" => Self::ApprovalDenied,
            "Active" => Self::Active,
            "Frozen" => Self::Frozen,
            "Expired" => Self::Expired,
            "BudgetExceeded" => Self::BudgetExceeded,
            "ManuallyTerminated" | "Terminated" => Self::ManuallyTerminated,
            "AccountQuarantined" => Self::AccountQuarantined,
            "Ejected" => Self::Ejected,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Lease can no longer change state
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ApprovalDenied
                | Self::Expired
                | Self::BudgetExceeded
                | Self::ManuallyTerminated
                | Self::AccountQuarantined
                | Self::Ejected
        )
    }
}

/// One row of the lease table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaseRecord {
    key: LeaseKey,
    attributes: Map<String, Value>,
}

impl LeaseRecord {
    /// Build a record from a raw attribute map
    ///
    /// # Errors
    /// Returns `EventError` if `userEmail` or `uuid` is missing or not a string
    pub fn from_attributes(attributes: Map<String, Value>) -> Result<Self, EventError> {
        let user_email = attributes
            .get("userEmail")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField("userEmail"))?
            .to_owned();
        let uuid = attributes
            .get("uuid")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField("uuid"))?
            .to_owned();
        Ok(Self {
            key: LeaseKey { user_email, uuid },
            attributes,
        })
    }

    /// Build a record from a JSON object
    ///
    /// # Errors
    /// Returns `EventError` if the value is not an object or lacks key fields
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        match value {
            Value::Object(map) => Self::from_attributes(map),
            _ => Err(EventError::invalid_field("lease", "expected an object")),
        }
    }

    /// Composite key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &LeaseKey {
        &self.key
    }

    /// All attributes as returned by the table
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Raw attribute
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// String attribute
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).and_then(Value::as_str)
    }

    /// Numeric attribute, accepting numbers stored as strings
    #[must_use]
    pub fn get_f64(&self, field: &str) -> Option<f64> {
        match self.attributes.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Lease status
    #[must_use]
    pub fn status(&self) -> Option<LeaseStatus> {
        self.get_str("status").map(LeaseStatus::parse)
    }

    /// Lease template (product) name
    #[must_use]
    pub fn template_name(&self) -> Option<&str> {
        self.get_str("originalLeaseTemplateName")
            .or_else(|| self.get_str("leaseTemplateName"))
    }

    /// Sandbox account id
    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        self.get_str("awsAccountId")
            .or_else(|| self.get_str("accountId"))
    }

    /// Expiration timestamp
    #[must_use]
    pub fn expiration_date(&self) -> Option<DateTime<Utc>> {
        self.get_str("expirationDate")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Budget in USD
    #[must_use]
    pub fn max_spend(&self) -> Option<f64> {
        self.get_f64("maxSpend")
    }

    /// Spend so far in USD
    #[must_use]
    pub fn total_cost_accrued(&self) -> Option<f64> {
        self.get_f64("totalCostAccrued")
    }

    /// Fingerprint of this record's field names
    #[must_use]
    pub fn fingerprint(&self) -> SchemaFingerprint {
        SchemaFingerprint::of_fields(self.attributes.keys().map(String::as_str))
    }
}
