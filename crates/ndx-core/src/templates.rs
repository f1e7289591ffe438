//! Built-in templates and event routing
//!
//! Built-in templates only use placeholders the pipeline always fills (base
//! event fields, `uuid` and enriched fields, which fall back when missing),
//! so they render for any event kind.

use ndx_event::EventKind;
use ndx_sender::{Template, TemplateCatalog};
use std::collections::HashMap;

/// Template for kinds without a route
pub const DEFAULT_TEMPLATE_ID: &str = "lease-generic";

const SIGN_OFF: &str = "\n\nThe National Digital Exchange team";

/// `(template id, event kind, subject, body)` of every built-in template
const BUILT_IN: &[(&str, Option<&str>, &str, &str)] = &[
    (
        "lease-requested",
        Some("LeaseRequested"),
        "We have received your ((productName)) sandbox request",
        "Your request for a ((productName)) sandbox has been received and is waiting for approval.\n\nLease reference: ((uuid))",
    ),
    (
        "lease-approved",
        Some("LeaseApproved"),
        "Your ((productName)) sandbox is ready",
        "Your ((productName)) sandbox has been approved.\n\nAWS account: ((accountId))\nBudget: ((maxSpend))\nExpires: ((expiryDate))\n\nLease reference: ((uuid))",
    ),
    (
        "lease-denied",
        Some("LeaseDenied"),
        "Your ((productName)) sandbox request was not approved",
        "Your request for a ((productName)) sandbox was not approved.\n\nLease reference: ((uuid))",
    ),
    (
        "lease-terminated",
        Some("LeaseTerminated"),
        "Your ((productName)) sandbox has ended",
        "Your ((productName)) sandbox in account ((accountId)) has ended and its resources are being removed.\n\nTotal spend: ((totalCost))\nLease reference: ((uuid))",
    ),
    (
        "lease-frozen",
        Some("LeaseFrozen"),
        "Your ((productName)) sandbox has been frozen",
        "Your ((productName)) sandbox in account ((accountId)) has been frozen. You can no longer create resources in it.\n\nLease reference: ((uuid))",
    ),
    (
        "lease-expired",
        Some("LeaseExpired"),
        "Your ((productName)) sandbox has expired",
        "Your ((productName)) sandbox reached its expiry date (((expiryDate))).\n\nTotal spend: ((totalCost))\nLease reference: ((uuid))",
    ),
    (
        "lease-budget-exceeded",
        Some("LeaseBudgetExceeded"),
        "Your ((productName)) sandbox has used its budget",
        "Your ((productName)) sandbox has spent ((totalCost)) of its ((maxSpend)) budget and has been stopped.\n\nLease reference: ((uuid))",
    ),
    (
        "lease-budget-threshold",
        Some("LeaseBudgetThresholdAlert"),
        "Your ((productName)) sandbox is nearing its budget",
        "Your ((productName)) sandbox has spent ((totalCost)) of its ((maxSpend)) budget.\n\nLease reference: ((uuid))",
    ),
    (
        "lease-duration-threshold",
        Some("LeaseDurationThresholdAlert"),
        "Your ((productName)) sandbox expires soon",
        "Your ((productName)) sandbox expires on ((expiryDate)).\n\nLease reference: ((uuid))",
    ),
    (
        "lease-freezing-threshold",
        Some("LeaseFreezingThresholdAlert"),
        "Your ((productName)) sandbox will be frozen soon",
        "Your ((productName)) sandbox in account ((accountId)) will be frozen soon.\n\nLease reference: ((uuid))",
    ),
    (
        DEFAULT_TEMPLATE_ID,
        None,
        "Update on your ((productName)) sandbox",
        "There has been an update to your ((productName)) sandbox (((eventType))).\n\nStatus: ((leaseStatus))\nLease reference: ((uuid))",
    ),
];

/// Catalog of built-in templates
#[must_use]
pub fn default_catalog() -> TemplateCatalog {
    BUILT_IN
        .iter()
        .map(|(id, _, subject, body)| {
            Template::new(*id, *subject, format!("{body}{SIGN_OFF}")).with_name(*id)
        })
        .collect()
}

/// Routes of the built-in templates, keyed by detail type
#[must_use]
pub fn default_routes() -> HashMap<String, String> {
    BUILT_IN
        .iter()
        .filter_map(|(id, kind, _, _)| kind.map(|k| (k.to_owned(), (*id).to_owned())))
        .collect()
}

/// Picks the template for an event kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRouter {
    routes: HashMap<String, String>,
    default: String,
}

impl TemplateRouter {
    /// Create a router
    #[must_use]
    pub fn new(routes: HashMap<String, String>, default: impl Into<String>) -> Self {
        Self {
            routes,
            default: default.into(),
        }
    }

    /// Template id for `kind`, falling back to the default route
    #[must_use]
    pub fn template_for(&self, kind: &EventKind) -> &str {
        self.routes
            .get(kind.as_str())
            .map_or(self.default.as_str(), String::as_str)
    }

    /// Default template id
    #[inline]
    #[must_use]
    pub fn default_template(&self) -> &str {
        &self.default
    }

    /// Detail type to template id, sorted by detail type
    #[must_use]
    pub fn routes(&self) -> Vec<(&str, &str)> {
        let mut routes: Vec<(&str, &str)> = self
            .routes
            .iter()
            .map(|(kind, id)| (kind.as_str(), id.as_str()))
            .collect();
        routes.sort_unstable();
        routes
    }

    /// Every template id the router can return
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.routes
            .values()
            .map(String::as_str)
            .chain(std::iter::once(self.default.as_str()))
    }
}

impl Default for TemplateRouter {
    fn default() -> Self {
        Self::new(default_routes(), DEFAULT_TEMPLATE_ID)
    }
}
