//! In-memory lease table

use crate::table::{LeaseTable, LeaseTableError};
use async_trait::async_trait;
use dashmap::DashMap;
use ndx_event::{EventError, LeaseKey, LeaseRecord};
use serde_json::Value;

/// Lease table held in a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryLeaseTable {
    rows: DashMap<LeaseKey, LeaseRecord>,
}

impl InMemoryLeaseTable {
    /// Create an empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rows from a JSON array of attribute objects
    ///
    /// # Errors
    /// Returns `EventError` if the value is not an array or a row lacks its key
    pub fn from_json(value: Value) -> Result<Self, EventError> {
        let Value::Array(rows) = value else {
            return Err(EventError::invalid_field("leases", "expected an array"));
        };
        let table = Self::new();
        for row in rows {
            table.insert(LeaseRecord::from_value(row)?);
        }
        Ok(table)
    }

    /// Insert or replace a row
    pub fn insert(&self, record: LeaseRecord) {
        self.rows.insert(record.key().clone(), record);
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl LeaseTable for InMemoryLeaseTable {
    async fn get_lease(&self, key: &LeaseKey) -> Result<Option<LeaseRecord>, LeaseTableError> {
        Ok(self.rows.get(key).map(|row| row.value().clone()))
    }
}
