//! NDX Sender - template rendering and email dispatch
//!
//! Emails are rendered locally before the provider is called, so an unfilled
//! `((placeholder))` is caught as a permanent error on our side.
//!
//! - [`TemplateCatalog`] / [`Template`]: Notify-style templates
//! - [`render`]: single-pass placeholder substitution
//! - [`NotificationSender`]: render, send, retry transient failures
//! - [`GovNotifyClient`]: GOV.UK Notify over HTTPS
//! - [`SandboxClient`]: in-memory provider for tests and dry runs

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod notify;
pub mod render;
pub mod sandbox;
pub mod template;

pub use client::{EmailRequest, NotificationClient, SendReceipt};
pub use dispatcher::{Dispatched, NotificationSender, RetryPolicy};
pub use error::{ErrorCategory, SendError};
pub use notify::{GovNotifyClient, NotifyApiKey};
pub use render::{has_unfilled_placeholders, render, Personalisation, RenderError, RenderedEmail};
pub use sandbox::{Delivery, SandboxClient};
pub use template::{Template, TemplateCatalog};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
