//! NDX Core - lease notification pipeline
//!
//! Wires the stages into one idempotent, security-checked delivery path:
//!
//! 1. [`EventAgeValidator`]: drop events older than the replay window
//! 2. [`IdempotencyGuard`](ndx_idempotency::IdempotencyGuard): reserve the
//!    event id or classify the replay
//! 3. [`EnrichmentLookup`](ndx_enrichment::EnrichmentLookup): best-effort
//!    lease details
//! 4. Lease-window check for threshold alerts
//! 5. [`NotificationSender`](ndx_sender::NotificationSender): render and send
//!
//! # Example
//!
//! ```rust,ignore
//! let pipeline = NotificationPipeline::builder(NotifyConfig::load(None)?)
//!     .lease_table(table)
//!     .build()?;
//!
//! match pipeline.process_json(payload).await {
//!     Ok(outcome) => tracing::info!(?outcome, "done"),
//!     Err(err) if err.is_retryable() => return Err(err), // redeliver
//!     Err(err) => dead_letter(err),
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod clock;
pub mod config;
pub mod error;
pub mod personalisation;
pub mod pipeline;
pub mod templates;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, NotifyConfig};
pub use error::{ErrorClass, PipelineError};
pub use personalisation::{personalise, Personalised};
pub use pipeline::{
    BatchEntry, BatchSummary, NotificationPipeline, PipelineBuilder, ProcessOutcome, SkipReason,
};
pub use templates::{default_catalog, TemplateRouter, DEFAULT_TEMPLATE_ID};
pub use validation::{AgeVerdict, EventAgeValidator};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the pipeline
    pub use crate::{
        Clock, ErrorClass, NotificationPipeline, NotifyConfig, PipelineError, ProcessOutcome,
        SkipReason,
    };
    pub use ndx_event::NotificationEvent;
}
