// Authentication types

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::EncodingKey;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ConfigError;

/// Grant type for the OAuth 2.0 JWT bearer flow
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Grant type for the Data Cloud token exchange
pub const CDP_EXCHANGE_GRANT_TYPE: &str = "urn:salesforce:grant-type:external:cdp";

/// Subject token type sent with the exchange request
pub const ACCESS_TOKEN_SUBJECT_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";

/// Token route on the login endpoint
pub const IDENTITY_TOKEN_PATH: &str = "/services/oauth2/token";

/// Token exchange route on the platform instance
pub const EXCHANGE_TOKEN_PATH: &str = "/services/a360/token";

/// Lifetime assumed when the exchange response has no `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Process-wide credential material
///
/// Built once at startup and never mutated afterwards.
#[derive(Clone)]
pub struct Credential {
    pub client_id: String,
    pub username: String,
    pub login_url: String,
    pub(crate) signing_key: EncodingKey,
}

impl Credential {
    /// Build a credential, rejecting empty fields and non-http login URLs
    pub fn new(
        client_id: impl Into<String>,
        username: impl Into<String>,
        login_url: impl Into<String>,
        signing_key: EncodingKey,
    ) -> Result<Self, ConfigError> {
        let client_id = client_id.into().trim().to_string();
        let username = username.into().trim().to_string();
        let login_url = login_url.into().trim().trim_end_matches('/').to_string();

        if client_id.is_empty() {
            return Err(ConfigError::MissingField("client_id"));
        }
        if username.is_empty() {
            return Err(ConfigError::MissingField("username"));
        }
        if login_url.is_empty() {
            return Err(ConfigError::MissingField("login_url"));
        }
        if !login_url.starts_with("https://") && !login_url.starts_with("http://") {
            return Err(ConfigError::InvalidLoginUrl(login_url));
        }

        Ok(Self {
            client_id,
            username,
            login_url,
            signing_key,
        })
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("login_url", &self.login_url)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

/// Tunables for the token chain
#[derive(Debug, Clone)]
pub struct TokenSettings {
    /// Tokens within this window of expiry are treated as expired
    pub safety_margin: Duration,

    /// Lifetime of each signed assertion
    pub assertion_lifetime: Duration,

    /// Optional Data Cloud dataspace sent with the exchange request
    pub dataspace: Option<String>,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            safety_margin: Duration::seconds(60),
            assertion_lifetime: Duration::seconds(180),
            dataspace: None,
        }
    }
}

/// Resource-scoped token held by the token manager
#[derive(Debug, Clone, PartialEq)]
pub struct CachedToken {
    pub value: String,
    pub base_url: String,
    pub expires_at: DateTime<Utc>,
    pub obtained_at: DateTime<Utc>,
}

impl CachedToken {
    /// Valid iff `now < expires_at - margin`
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now < self.expires_at - margin
    }
}

/// Platform token from the identity step. Never cached or handed out.
#[derive(Debug, Clone)]
pub struct PlatformToken {
    pub access_token: String,
    pub instance_url: String,
}

/// Identity step response
#[derive(Deserialize)]
pub struct IdentityTokenResponse {
    pub access_token: String,
    pub instance_url: String,
}

/// Exchange step response
///
/// Data Cloud reports the tenant endpoint as `instance_url`; `base_url` is
/// accepted as well.
#[derive(Deserialize)]
pub struct ExchangeTokenResponse {
    pub access_token: String,
    #[serde(alias = "instance_url")]
    pub base_url: String,
    pub expires_in: Option<i64>,
}

/// OAuth error body
#[derive(Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// Diagnostic snapshot of the cache
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub has_token: bool,
    pub valid: bool,
    pub base_url: Option<String>,
    pub obtained_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}
