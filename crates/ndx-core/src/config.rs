//! Pipeline configuration
//!
//! Loaded from TOML; every field has a default, so an empty file is a valid
//! configuration. A few deployment settings can be overridden from the
//! environment:
//!
//! | Variable                | Field                       |
//! |-------------------------|-----------------------------|
//! | `NDX_NOTIFY_NAMESPACE`  | `idempotency.namespace`     |
//! | `NDX_NOTIFY_BASE_URL`   | `sender.base_url`           |
//! | `NDX_NOTIFY_API_KEY`    | `sender.api_key`            |

use crate::templates::{default_catalog, default_routes, TemplateRouter, DEFAULT_TEMPLATE_ID};
use crate::validation::{DEFAULT_FUTURE_SKEW_SECS, DEFAULT_MAX_AGE_DAYS};
use ndx_enrichment::EnrichmentConfig;
use ndx_event::SchemaFingerprint;
use ndx_idempotency::DEFAULT_TTL_DAYS;
use ndx_sender::{RetryPolicy, Template, TemplateCatalog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Namespace override
pub const ENV_NAMESPACE: &str = "NDX_NOTIFY_NAMESPACE";
/// Notify base URL override
pub const ENV_BASE_URL: &str = "NDX_NOTIFY_BASE_URL";
/// Notify API key override
pub const ENV_API_KEY: &str = "NDX_NOTIFY_API_KEY";

/// Configuration failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Settings are inconsistent
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Idempotency settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdempotencySettings {
    /// First segment of every key
    pub namespace: String,
    /// Reservation lifetime, from event time
    pub ttl_days: i64,
    /// Maximum reservations held by the in-process store
    pub capacity: u64,
}

impl Default for IdempotencySettings {
    fn default() -> Self {
        Self {
            namespace: "ndx-notify".into(),
            ttl_days: DEFAULT_TTL_DAYS,
            capacity: 1_000_000,
        }
    }
}

/// Event-age settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSettings {
    /// Events older than this are never sent
    pub max_age_days: i64,
    /// Tolerated producer clock lead
    pub future_skew_secs: i64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            future_skew_secs: DEFAULT_FUTURE_SKEW_SECS,
        }
    }
}

/// Enrichment settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnrichmentSettings {
    /// Budget for the whole lookup, throttle retries included
    pub timeout_ms: u64,
    /// Delay before retrying a throttled query
    pub throttle_backoff_ms: u64,
    /// Retries after throttling
    pub throttle_retries: u32,
    /// Hex SHA-256 of the expected lease field names
    pub expected_fingerprint: Option<String>,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            throttle_backoff_ms: 500,
            throttle_retries: 1,
            expected_fingerprint: None,
        }
    }
}

/// Notify client settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SenderSettings {
    /// Notify API root
    pub base_url: String,
    /// Combined Notify API key
    pub api_key: Option<String>,
    /// Per-request budget
    pub timeout_secs: u64,
    /// Attempts for retriable failures, first one included
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff_ms: u64,
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self {
            base_url: ndx_sender::notify::DEFAULT_BASE_URL.into(),
            api_key: None,
            timeout_secs: ndx_sender::notify::DEFAULT_TIMEOUT.as_secs(),
            max_attempts: 3,
            backoff_ms: 1_000,
        }
    }
}

impl std::fmt::Debug for SenderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_ms", &self.backoff_ms)
            .finish()
    }
}

/// Template catalog and routing
///
/// Catalog entries and routes are merged over the built-in ones by id and
/// detail type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateSettings {
    /// Template for kinds without a route
    pub default: String,
    /// Detail type to template id
    pub routes: BTreeMap<String, String>,
    /// Extra or replacement templates
    pub catalog: Vec<Template>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            default: DEFAULT_TEMPLATE_ID.into(),
            routes: BTreeMap::new(),
            catalog: Vec::new(),
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    /// Idempotency guard
    pub idempotency: IdempotencySettings,
    /// Event-age validator
    pub validation: ValidationSettings,
    /// Lease lookup
    pub enrichment: EnrichmentSettings,
    /// Notify client and retry
    pub sender: SenderSettings,
    /// Templates
    pub templates: TemplateSettings,
}

impl NotifyConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML without environment overrides or validation
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` on malformed TOML or unknown keys
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load, apply environment overrides and validate
    ///
    /// Without a path the defaults are used.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed, or the
    /// result is invalid
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        tracing::debug!(config = ?config, "configuration loaded");
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(namespace) = var(ENV_NAMESPACE) {
            self.idempotency.namespace = namespace;
        }
        if let Some(base_url) = var(ENV_BASE_URL) {
            self.sender.base_url = base_url;
        }
        if let Some(api_key) = var(ENV_API_KEY) {
            self.sender.api_key = Some(api_key);
        }
    }

    /// Reject inconsistent settings
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` describing the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        ndx_event::key::validate_namespace(&self.idempotency.namespace)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let idem = &self.idempotency;
        let age = &self.validation;
        if idem.ttl_days <= 0 {
            return invalid("idempotency.ttl_days must be positive");
        }
        if idem.capacity == 0 {
            return invalid("idempotency.capacity must be positive");
        }
        if age.max_age_days <= 0 {
            return invalid("validation.max_age_days must be positive");
        }
        if age.max_age_days > idem.ttl_days {
            return invalid("validation.max_age_days cannot exceed idempotency.ttl_days");
        }
        if age.future_skew_secs < 0 {
            return invalid("validation.future_skew_secs cannot be negative");
        }
        if self.enrichment.timeout_ms == 0 {
            return invalid("enrichment.timeout_ms must be positive");
        }
        self.expected_fingerprint()?;

        if self.sender.max_attempts == 0 {
            return invalid("sender.max_attempts must be at least 1");
        }
        if self.sender.timeout_secs == 0 {
            return invalid("sender.timeout_secs must be positive");
        }

        let catalog = self.catalog();
        let router = self.router();
        for id in router.targets() {
            if !catalog.contains(id) {
                return Err(ConfigError::Invalid(format!(
                    "template route points at unknown template {id}"
                )));
            }
        }
        Ok(())
    }

    /// Idempotency reservation lifetime
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.idempotency.ttl_days)
    }

    /// Maximum event age
    #[must_use]
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.validation.max_age_days)
    }

    /// Future skew tolerance
    #[must_use]
    pub fn future_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.validation.future_skew_secs)
    }

    /// Parsed expected fingerprint
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if the value is not 64 hex characters
    pub fn expected_fingerprint(&self) -> Result<Option<SchemaFingerprint>, ConfigError> {
        self.enrichment
            .expected_fingerprint
            .as_deref()
            .map(|hex| {
                hex.parse::<SchemaFingerprint>().map_err(|e| {
                    ConfigError::Invalid(format!("enrichment.expected_fingerprint: {e}"))
                })
            })
            .transpose()
    }

    /// Lookup tuning
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if the expected fingerprint is malformed
    pub fn enrichment_config(&self) -> Result<EnrichmentConfig, ConfigError> {
        Ok(EnrichmentConfig {
            query_timeout: Duration::from_millis(self.enrichment.timeout_ms),
            throttle_backoff: Duration::from_millis(self.enrichment.throttle_backoff_ms),
            throttle_retries: self.enrichment.throttle_retries,
            expected_fingerprint: self.expected_fingerprint()?,
        })
    }

    /// Sender retry policy
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.sender.max_attempts,
            backoff: Duration::from_millis(self.sender.backoff_ms),
        }
    }

    /// Notify request budget
    #[must_use]
    pub fn sender_timeout(&self) -> Duration {
        Duration::from_secs(self.sender.timeout_secs)
    }

    /// Built-in templates with configured ones merged over them
    #[must_use]
    pub fn catalog(&self) -> TemplateCatalog {
        let mut catalog = default_catalog();
        for template in &self.templates.catalog {
            catalog.insert(template.clone());
        }
        catalog
    }

    /// Built-in routes with configured ones merged over them
    #[must_use]
    pub fn router(&self) -> TemplateRouter {
        let mut routes = default_routes();
        routes.extend(
            self.templates
                .routes
                .iter()
                .map(|(kind, id)| (kind.clone(), id.clone())),
        );
        TemplateRouter::new(routes, self.templates.default.clone())
    }
}

fn invalid<T>(message: &str) -> Result<T, ConfigError> {
    Err(ConfigError::Invalid(message.to_owned()))
}
