// Signed JWT bearer assertions

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, Header};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::types::Credential;

/// Claims of the identity step assertion
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

/// Sign a fresh RS256 assertion valid for `lifetime` from `now`
///
/// Assertions are single-use; callers build a new one for every identity
/// request.
pub fn build_assertion(
    credential: &Credential,
    now: DateTime<Utc>,
    lifetime: Duration,
) -> Result<String, AuthError> {
    let claims = AssertionClaims {
        iss: credential.client_id.clone(),
        sub: credential.username.clone(),
        aud: credential.login_url.clone(),
        exp: (now + lifetime).timestamp(),
        iat: now.timestamp(),
    };

    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &credential.signing_key)
        .map_err(|e| AuthError::identity(None, format!("failed to sign assertion: {}", e)))
}
