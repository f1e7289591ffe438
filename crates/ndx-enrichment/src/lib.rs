//! NDX Enrichment - best-effort lease lookup
//!
//! Looks up the lease behind a notification so templates can carry product,
//! account and budget details. A lookup never fails the pipeline; it either
//! finds the lease or explains why it skipped.
//!
//! - [`LeaseTable`]: read-only lease table seam
//! - [`InMemoryLeaseTable`]: table backed by a concurrent map
//! - [`EnrichmentLookup`]: bounded retry, timeout and latency metrics

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod lookup;
pub mod memory;
pub mod table;

pub use lookup::{EnrichmentConfig, EnrichmentLookup, EnrichmentOutcome, SkipReason};
pub use memory::InMemoryLeaseTable;
pub use table::{LeaseTable, LeaseTableError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
