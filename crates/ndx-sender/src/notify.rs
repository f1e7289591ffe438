//! GOV.UK Notify HTTP client
//!
//! Notify API keys look like `<key name>-<service id>-<secret>`, where both
//! ids are 36-character UUIDs. Requests carry a short-lived HS256 JWT with
//! `iss = service id` and `iat = now`, signed with the secret.

use crate::client::{EmailRequest, NotificationClient, SendReceipt};
use crate::error::SendError;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Formatter};
use std::time::Duration;
use uuid::Uuid;

/// Production Notify endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.notifications.service.gov.uk";

/// Outbound request budget
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const UUID_LEN: usize = 36;
const EMAIL_PATH: &str = "/v2/notifications/email";

/// Parsed Notify API key
#[derive(Clone)]
pub struct NotifyApiKey {
    service_id: Uuid,
    secret: String,
}

impl NotifyApiKey {
    /// Parse a combined API key
    ///
    /// # Errors
    /// Returns `SendError::Config` if the key does not end in two UUIDs
    pub fn parse(key: &str) -> Result<Self, SendError> {
        let key = key.trim();
        let len = key.len();
        if len < 2 * UUID_LEN + 1 || !key.is_ascii() {
            return Err(SendError::Config("notify api key is too short".into()));
        }
        let secret = &key[len - UUID_LEN..];
        let service = &key[len - 2 * UUID_LEN - 1..len - UUID_LEN - 1];
        if &key[len - UUID_LEN - 1..len - UUID_LEN] != "-" {
            return Err(SendError::Config("notify api key is malformed".into()));
        }

        let service_id = Uuid::parse_str(service)
            .map_err(|e| SendError::Config(format!("notify service id: {e}")))?;
        Uuid::parse_str(secret)
            .map_err(|e| SendError::Config(format!("notify secret: {e}")))?;

        Ok(Self {
            service_id,
            secret: secret.to_owned(),
        })
    }

    /// Service the key belongs to
    #[inline]
    #[must_use]
    pub fn service_id(&self) -> Uuid {
        self.service_id
    }

    /// Sign a bearer token issued now
    ///
    /// # Errors
    /// Returns `SendError::Config` if signing fails
    pub fn bearer_token(&self) -> Result<String, SendError> {
        let claims = Claims {
            iss: self.service_id.to_string(),
            iat: Utc::now().timestamp(),
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| SendError::Config(format!("cannot sign notify token: {e}")))
    }
}

impl Debug for NotifyApiKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyApiKey")
            .field("service_id", &self.service_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    iat: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// Notify client over HTTPS
#[derive(Debug, Clone)]
pub struct GovNotifyClient {
    http: reqwest::Client,
    base_url: String,
    key: NotifyApiKey,
}

impl GovNotifyClient {
    /// Create a client
    ///
    /// # Errors
    /// Returns `SendError::Config` if the key is malformed or the HTTP client
    /// cannot be built
    pub fn new(
        base_url: impl Into<String>,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, SendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ndx-notify/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SendError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            key: NotifyApiKey::parse(api_key)?,
        })
    }

    /// Service id from the API key
    #[must_use]
    pub fn service_id(&self) -> Uuid {
        self.key.service_id()
    }

    fn email_url(&self) -> String {
        format!("{}{EMAIL_PATH}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl NotificationClient for GovNotifyClient {
    async fn send_email(&self, request: &EmailRequest) -> Result<SendReceipt, SendError> {
        let token = self.key.bearer_token()?;
        let response = self
            .http
            .post(self.email_url())
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let mut receipt: SendReceipt = response.json().await?;
            receipt.attempts = 1;
            return Ok(receipt);
        }

        let text = response.text().await.unwrap_or_default();
        Err(SendError::api(status.as_u16(), provider_message(&text)))
    }
}

/// First error from a Notify error body, or the raw body
fn provider_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.errors.into_iter().next())
        .map_or_else(
            || body.trim().to_owned(),
            |entry| format!("{}: {}", entry.error, entry.message),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};

    const SERVICE: &str = "26785a09-ab16-4eb0-8407-a37497a57506";
    const SECRET: &str = "3d844edf-8d35-48ac-975b-e847b4f122b0";

    fn key() -> String {
        format!("my_test_key-{SERVICE}-{SECRET}")
    }

    #[test]
    fn parses_service_id_and_secret() {
        let parsed = NotifyApiKey::parse(&key()).unwrap();
        assert_eq!(parsed.service_id().to_string(), SERVICE);
        assert!(!format!("{parsed:?}").contains(SECRET));
    }

    #[test]
    fn key_names_with_dashes_are_allowed() {
        let parsed = NotifyApiKey::parse(&format!("ndx-prod-key-{SERVICE}-{SECRET}")).unwrap();
        assert_eq!(parsed.service_id().to_string(), SERVICE);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(NotifyApiKey::parse("short").is_err());
        assert!(NotifyApiKey::parse(&format!("k-{SERVICE}{SECRET}x")).is_err());
        assert!(NotifyApiKey::parse(&format!("k-{}-{SECRET}", "z".repeat(36))).is_err());
    }

    #[test]
    fn token_is_signed_with_secret() {
        let token = NotifyApiKey::parse(&key()).unwrap().bearer_token().unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.set_issuer(&[SERVICE]);
        let decoded = jsonwebtoken::decode::<Claims>(
            &token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.iss, SERVICE);
        assert!((Utc::now().timestamp() - decoded.claims.iat).abs() < 5);
    }

    #[test]
    fn extracts_provider_message() {
        let body = r#"{"errors":[{"error":"BadRequestError","message":"Missing personalisation: name"}],"status_code":400}"#;
        assert_eq!(
            provider_message(body),
            "BadRequestError: Missing personalisation: name"
        );
        assert_eq!(provider_message("gateway timeout\n"), "gateway timeout");
    }

    #[test]
    fn builds_email_url() {
        let client = GovNotifyClient::new("http://localhost:6011/", &key(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.email_url(), "http://localhost:6011/v2/notifications/email");
    }
}
