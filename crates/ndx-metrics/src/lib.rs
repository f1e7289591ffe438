//! NDX Metrics - operational signals of the notification pipeline
//!
//! Every skip and every security rejection has its own metric so dashboards
//! can tell "nothing to do" apart from "something is wrong".
//!
//! - [`MetricsSink`]: narrow trait the pipeline writes to
//! - [`FacadeSink`]: forwards to the `metrics` crate recorder
//! - [`InMemorySink`]: keeps samples in memory for tests and run summaries

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod memory;
pub mod metric;
pub mod sink;

pub use memory::{InMemorySink, Series};
pub use metric::{Metric, MetricKind, Tag};
pub use sink::{FacadeSink, MetricsSink, NoopSink};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
