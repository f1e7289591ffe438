//! Lease table interface

use async_trait::async_trait;
use ndx_event::{LeaseKey, LeaseRecord};
use std::fmt::Debug;

/// Lease table failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum LeaseTableError {
    /// Provisioned throughput exceeded; the only retriable condition
    #[error("provisioned throughput exceeded: {0}")]
    ThroughputExceeded(String),

    /// Table unreachable
    #[error("lease table unavailable: {0}")]
    Unavailable(String),

    /// Caller lacks permission
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Row exists but cannot be decoded
    #[error("malformed lease record: {0}")]
    Malformed(String),
}

impl LeaseTableError {
    /// Check if the error is a throttling condition
    #[inline]
    #[must_use]
    pub fn is_throttle(&self) -> bool {
        matches!(self, Self::ThroughputExceeded(_))
    }
}

/// Read-only view of the lease table
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeaseTable: Send + Sync + Debug {
    /// Get a lease by composite key
    async fn get_lease(&self, key: &LeaseKey) -> Result<Option<LeaseRecord>, LeaseTableError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_throughput_is_throttle() {
        assert!(LeaseTableError::ThroughputExceeded("x".into()).is_throttle());
        assert!(!LeaseTableError::Unavailable("x".into()).is_throttle());
        assert!(!LeaseTableError::AccessDenied("x".into()).is_throttle());
    }
}
