//! Event kinds published by the sandbox lease service

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Lease lifecycle event kind (`detail-type` on the envelope)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// User asked for a sandbox lease
    LeaseRequested,
    /// Lease request approved
    LeaseApproved,
    /// Lease request denied
    LeaseDenied,
    /// Lease ended by an operator or the user
    LeaseTerminated,
    /// Lease frozen (spend/duration limit reached)
    LeaseFrozen,
    /// Lease reached its end date
    LeaseExpired,
    /// Lease spend exceeded its budget
    LeaseBudgetExceeded,
    /// Spend crossed an alert threshold
    LeaseBudgetThresholdAlert,
    /// Remaining duration crossed an alert threshold
    LeaseDurationThresholdAlert,
    /// Lease is about to be frozen
    LeaseFreezingThresholdAlert,
    /// Any other detail type
    Other(String),
    /// Envelope carried no `detail-type`
    Unknown,
}

impl EventKind {
    /// Map an EventBridge `detail-type` to a kind
    #[must_use]
    pub fn from_detail_type(detail_type: &str) -> Self {
        match detail_type.trim() {
            "LeaseRequested" => Self::LeaseRequested,
            "LeaseApproved" => Self::LeaseApproved,
            "LeaseDenied" => Self::LeaseDenied,
            "LeaseTerminated" => Self::LeaseTerminated,
            "LeaseFrozen" => Self::LeaseFrozen,
            "LeaseExpired" => Self::LeaseExpired,
            "LeaseBudgetExceeded" => Self::LeaseBudgetExceeded,
            "LeaseBudgetThresholdAlert" => Self::LeaseBudgetThresholdAlert,
            "LeaseDurationThresholdAlert" => Self::LeaseDurationThresholdAlert,
            "LeaseFreezingThresholdAlert" => Self::LeaseFreezingThresholdAlert,
            "" => Self::Unknown,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::LeaseRequested => "LeaseRequested",
            Self::LeaseApproved => "LeaseApproved",
            Self::LeaseDenied => "LeaseDenied",
            Self::LeaseTerminated => "LeaseTerminated",
            Self::LeaseFrozen => "LeaseFrozen",
            Self::LeaseExpired => "LeaseExpired",
            Self::LeaseBudgetExceeded => "LeaseBudgetExceeded",
            Self::LeaseBudgetThresholdAlert => "LeaseBudgetThresholdAlert",
            Self::LeaseDurationThresholdAlert => "LeaseDurationThresholdAlert",
            Self::LeaseFreezingThresholdAlert => "LeaseFreezingThresholdAlert",
            Self::Other(name) => name,
            Self::Unknown => "Unknown",
        }
    }

    /// Threshold alerts only matter while the lease is still live
    #[inline]
    #[must_use]
    pub fn is_threshold_alert(&self) -> bool {
        matches!(
            self,
            Self::LeaseBudgetThresholdAlert
                | Self::LeaseDurationThresholdAlert
                | Self::LeaseFreezingThresholdAlert
        )
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_detail_types_roundtrip() {
        for name in [
            "LeaseRequested",
            "LeaseApproved",
            "LeaseDenied",
            "LeaseTerminated",
            "LeaseFrozen",
            "LeaseExpired",
            "LeaseBudgetExceeded",
            "LeaseBudgetThresholdAlert",
            "LeaseDurationThresholdAlert",
            "LeaseFreezingThresholdAlert",
        ] {
            let kind = EventKind::from_detail_type(name);
            assert!(!matches!(kind, EventKind::Other(_)), "{name}");
            assert_eq!(kind.as_str(), name);
        }
    }

    #[test]
    fn unrecognised_detail_type_is_kept() {
        let kind = EventKind::from_detail_type("AccountCleanupFailure");
        assert_eq!(kind, EventKind::Other("AccountCleanupFailure".into()));
        assert_eq!(kind.to_string(), "AccountCleanupFailure");
    }

    #[test]
    fn threshold_alerts() {
        assert!(EventKind::LeaseBudgetThresholdAlert.is_threshold_alert());
        assert!(EventKind::LeaseFreezingThresholdAlert.is_threshold_alert());
        assert!(!EventKind::LeaseApproved.is_threshold_alert());
    }
}
