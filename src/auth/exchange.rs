// Two-step token chain: identity token, then resource token exchange

use chrono::{DateTime, Duration, Utc};

use super::assertion::build_assertion;
use super::error::AuthError;
use super::transport::{Transport, TransportRequest, TransportResponse};
use super::types::{
    CachedToken, Credential, ExchangeTokenResponse, IdentityTokenResponse, OAuthErrorResponse,
    PlatformToken, TokenSettings, ACCESS_TOKEN_SUBJECT_TYPE, CDP_EXCHANGE_GRANT_TYPE,
    DEFAULT_EXPIRES_IN_SECS, EXCHANGE_TOKEN_PATH, IDENTITY_TOKEN_PATH, JWT_BEARER_GRANT_TYPE,
};

/// Trade a freshly signed assertion for a platform token
pub async fn request_identity_token(
    transport: &dyn Transport,
    credential: &Credential,
    settings: &TokenSettings,
    now: DateTime<Utc>,
) -> Result<PlatformToken, AuthError> {
    let assertion = build_assertion(credential, now, settings.assertion_lifetime)?;
    let url = format!("{}{}", credential.login_url, IDENTITY_TOKEN_PATH);

    tracing::info!(url = %url, "Requesting platform token via JWT bearer flow");

    let request = TransportRequest::post_form(
        url,
        [
            ("grant_type", JWT_BEARER_GRANT_TYPE),
            ("assertion", assertion.as_str()),
        ],
    );

    let response = transport
        .send(request)
        .await
        .map_err(|e| AuthError::identity(None, e.to_string()))?;

    if !response.is_success() {
        let detail = describe_failure(&response);
        tracing::error!(status = response.status, detail = %detail, "Identity token request failed");
        return Err(AuthError::identity(Some(response.status), detail));
    }

    let data: IdentityTokenResponse = response.json().map_err(|e| {
        AuthError::identity(
            Some(response.status),
            format!("malformed identity response: {}", e),
        )
    })?;

    if data.access_token.is_empty() {
        return Err(AuthError::identity(
            Some(response.status),
            "identity response does not contain access_token",
        ));
    }
    if data.instance_url.trim().is_empty() {
        return Err(AuthError::identity(
            Some(response.status),
            "identity response does not contain instance_url",
        ));
    }

    tracing::info!(instance_url = %data.instance_url, "Obtained platform token");

    Ok(PlatformToken {
        access_token: data.access_token,
        instance_url: normalize_base_url(&data.instance_url),
    })
}

/// Trade a platform token for a resource-scoped token
pub async fn exchange_for_resource_token(
    transport: &dyn Transport,
    platform: &PlatformToken,
    settings: &TokenSettings,
    now: DateTime<Utc>,
) -> Result<CachedToken, AuthError> {
    let url = format!("{}{}", platform.instance_url, EXCHANGE_TOKEN_PATH);

    tracing::info!(
        url = %url,
        dataspace = settings.dataspace.as_deref().unwrap_or("default"),
        "Exchanging platform token for Data Cloud token"
    );

    let mut form = vec![
        ("grant_type", CDP_EXCHANGE_GRANT_TYPE.to_string()),
        ("subject_token", platform.access_token.clone()),
        ("subject_token_type", ACCESS_TOKEN_SUBJECT_TYPE.to_string()),
    ];
    if let Some(ref dataspace) = settings.dataspace {
        form.push(("dataspace", dataspace.clone()));
    }

    let response = transport
        .send(TransportRequest::post_form(url, form))
        .await
        .map_err(|e| AuthError::exchange(None, e.to_string()))?;

    if !response.is_success() {
        let detail = describe_failure(&response);
        tracing::error!(status = response.status, detail = %detail, "Token exchange failed");
        return Err(AuthError::exchange(Some(response.status), detail));
    }

    let data: ExchangeTokenResponse = response.json().map_err(|e| {
        AuthError::exchange(
            Some(response.status),
            format!("malformed exchange response: {}", e),
        )
    })?;

    if data.access_token.is_empty() {
        return Err(AuthError::exchange(
            Some(response.status),
            "exchange response does not contain access_token",
        ));
    }
    if data.base_url.trim().is_empty() {
        return Err(AuthError::exchange(
            Some(response.status),
            "exchange response does not contain a base URL",
        ));
    }

    let expires_in = data.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    let expires_at = Some(expires_in)
        .filter(|secs| *secs > 0)
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AuthError::exchange(
                Some(response.status),
                format!("invalid expires_in in exchange response: {}", expires_in),
            )
        })?;

    tracing::info!(
        expires_at = %expires_at.to_rfc3339(),
        "Obtained Data Cloud token"
    );

    Ok(CachedToken {
        value: data.access_token,
        base_url: normalize_base_url(&data.base_url),
        expires_at,
        obtained_at: now,
    })
}

/// Prefix bare hosts with `https://` and drop trailing slashes
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Human-readable reason from an OAuth error body, falling back to raw text
fn describe_failure(response: &TransportResponse) -> String {
    match response.json::<OAuthErrorResponse>() {
        Ok(err) => match err.error_description {
            Some(desc) => format!("{}: {}", err.error, desc),
            None => err.error,
        },
        Err(_) if response.body.trim().is_empty() => format!("HTTP {}", response.status),
        Err(_) => response.body.clone(),
    }
}
