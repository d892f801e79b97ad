// Authentication error types

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Step of the token chain that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStage {
    /// Signed assertion traded for a platform token
    Identity,

    /// Platform token traded for a resource-scoped token
    Exchange,

    /// Resource API still rejected the token after a forced refresh
    Downstream,
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthStage::Identity => "identity",
            AuthStage::Exchange => "exchange",
            AuthStage::Downstream => "downstream",
        };
        f.write_str(name)
    }
}

/// Failure while acquiring or using a platform token
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{stage} step failed{}: {message}", status_suffix(.status))]
pub struct AuthError {
    pub stage: AuthStage,
    pub status: Option<u16>,
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl AuthError {
    pub fn identity(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            stage: AuthStage::Identity,
            status,
            message: message.into(),
        }
    }

    pub fn exchange(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            stage: AuthStage::Exchange,
            status,
            message: message.into(),
        }
    }

    pub fn downstream(status: u16, message: impl Into<String>) -> Self {
        Self {
            stage: AuthStage::Downstream,
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Invalid or missing credential material, raised once at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required credential field: {0}")]
    MissingField(&'static str),

    #[error("invalid login URL '{0}': expected an http(s) URL")]
    InvalidLoginUrl(String),

    #[error("failed to read signing key {}: {source}", .path.display())]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid RSA signing key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display_with_status() {
        let err = AuthError::identity(Some(400), "invalid_grant: user hasn't approved this consumer");
        assert_eq!(
            err.to_string(),
            "identity step failed (HTTP 400): invalid_grant: user hasn't approved this consumer"
        );
    }

    #[test]
    fn test_auth_error_display_without_status() {
        let err = AuthError::exchange(None, "connection refused");
        assert_eq!(err.to_string(), "exchange step failed: connection refused");
    }

    #[test]
    fn test_downstream_error_carries_status() {
        let err = AuthError::downstream(401, "Session expired");
        assert_eq!(err.stage, AuthStage::Downstream);
        assert_eq!(err.status, Some(401));
    }

    #[test]
    fn test_stage_serializes_lowercase() {
        let value = serde_json::to_value(AuthStage::Exchange).unwrap();
        assert_eq!(value, serde_json::json!("exchange"));
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::MissingField("client_id");
        assert_eq!(err.to_string(), "missing required credential field: client_id");

        let err = ConfigError::InvalidLoginUrl("login.salesforce.com".to_string());
        assert!(err.to_string().contains("login.salesforce.com"));
    }
}
