//! NDX Event - lease lifecycle event contract
//!
//! Foundation types shared by every stage of the notification pipeline:
//! - [`NotificationEvent`]: parsed EventBridge envelope
//! - [`IdempotencyKey`]: `<namespace>:<schemaVersion>:<event.id>`
//! - [`LeaseRecord`]: lease table row used for enrichment
//! - [`SchemaFingerprint`]: stable hash of a record's field names
//!
//! # Example
//!
//! ```rust
//! use ndx_event::{IdempotencyKey, NotificationEvent};
//!
//! let raw = br#"{
//!     "id": "abc-1",
//!     "time": "2026-01-01T10:00:00Z",
//!     "schemaVersion": "v1",
//!     "detail-type": "LeaseApproved",
//!     "detail": { "userEmail": "a@example.gov.uk", "uuid": "lease-1" }
//! }"#;
//!
//! let event = NotificationEvent::from_json(raw).unwrap();
//! let key = IdempotencyKey::for_event("ndx-notify", &event).unwrap();
//! assert_eq!(key.as_str(), "ndx-notify:v1:abc-1");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod email;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod key;
pub mod kind;
pub mod lease;

pub use email::{emails_match, mask_email};
pub use error::EventError;
pub use event::{EventId, NotificationEvent, SchemaVersion};
pub use fingerprint::SchemaFingerprint;
pub use key::IdempotencyKey;
pub use kind::EventKind;
pub use lease::{LeaseKey, LeaseRecord, LeaseStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with lease events
    pub use crate::{
        EventError, EventId, EventKind, IdempotencyKey, LeaseKey, LeaseRecord, LeaseStatus,
        NotificationEvent, SchemaFingerprint, SchemaVersion,
    };
}
