//! NDX Idempotency - at-most-once notification delivery
//!
//! The event bus delivers at least once. This crate turns that into "at most
//! one email per event id inside the replay window":
//!
//! - [`IdempotencyStore`]: narrow `get` / `put_if_absent` / `remove` interface
//! - [`MokaIdempotencyStore`]: in-process implementation with per-record TTL
//! - [`IdempotencyGuard`]: check-and-reserve returning a [`GuardDecision`]
//!
//! # Example
//!
//! ```rust,ignore
//! let guard = IdempotencyGuard::new(store, metrics, "ndx-notify")?;
//! match guard.check_and_reserve(&event, clock.now()).await? {
//!     GuardDecision::Send { key } => send(&event, &key).await?,
//!     GuardDecision::SkipDuplicate { .. } => {}
//!     GuardDecision::RejectSecurity { key } => return Err(security(key)),
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod guard;
pub mod moka_store;
pub mod record;
pub mod store;

pub use guard::{GuardDecision, GuardError, IdempotencyGuard, DEFAULT_TTL_DAYS};
pub use moka_store::MokaIdempotencyStore;
pub use record::IdempotencyRecord;
pub use store::{IdempotencyStore, PutOutcome, StoreError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
