// Error handling module
// Defines error types and HTTP response conversion

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::transport::TransportError;
use crate::auth::{AuthError, ConfigError};

/// API errors that can occur during request processing
#[derive(Error, Debug)]
pub enum ApiError {
    /// Caller did not present the gateway API key
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Could not obtain (or use) a platform token
    #[error("Platform authentication failed: {0}")]
    PlatformAuth(#[from] AuthError),

    /// Non-success response from Data Cloud
    #[error("Data Cloud API error: {status} - {message}")]
    DataCloudError { status: u16, message: String },

    /// Data Cloud could not be reached
    #[error("Data Cloud unreachable: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Request validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Short machine-readable kind used in the response body
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::PlatformAuth(_) => "platform_auth_error",
            ApiError::DataCloudError { .. } => "data_cloud_error",
            ApiError::Transport(_) => "upstream_unreachable",
            ApiError::ConfigError(_) => "config_error",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::PlatformAuth(err) => {
                tracing::error!(stage = %err.stage, status = ?err.status, "Platform authentication failed: {}", err.message);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("Authentication with Data Cloud failed: {}", err),
                )
            }
            ApiError::DataCloudError { status, message } => {
                let status_code =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status_code, message)
            }
            ApiError::Transport(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            ApiError::ConfigError(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(err) => {
                // Log internal errors
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "message": message,
                "type": kind,
            }
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_messages() {
        let err = ApiError::Unauthorized("Invalid or missing API Key".to_string());
        assert_eq!(err.to_string(), "Unauthorized: Invalid or missing API Key");

        let err = ApiError::DataCloudError {
            status: 429,
            message: "Rate limit exceeded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Data Cloud API error: 429 - Rate limit exceeded"
        );

        let err = ApiError::from(AuthError::identity(Some(400), "invalid_grant"));
        assert_eq!(
            err.to_string(),
            "Platform authentication failed: identity step failed (HTTP 400): invalid_grant"
        );
    }

    #[test]
    fn test_internal_error_message() {
        let err = ApiError::Internal(anyhow::anyhow!("Something went wrong"));
        assert_eq!(err.to_string(), "Internal error: Something went wrong");
    }

    #[tokio::test]
    async fn test_platform_auth_maps_to_bad_gateway() {
        let err = ApiError::from(AuthError::exchange(Some(401), "invalid_token"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["type"], "platform_auth_error");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("exchange step failed"));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let response = ApiError::Unauthorized("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ApiError::ValidationError("sql is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::Transport(TransportError::Timeout {
            url: "https://r.example".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response =
            ApiError::ConfigError(ConfigError::MissingField("client_id")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_data_cloud_error_mirrors_status() {
        for (status, expected) in [
            (400, StatusCode::BAD_REQUEST),
            (404, StatusCode::NOT_FOUND),
            (429, StatusCode::TOO_MANY_REQUESTS),
            (503, StatusCode::SERVICE_UNAVAILABLE),
        ] {
            let response = ApiError::DataCloudError {
                status,
                message: "err".to_string(),
            }
            .into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_invalid_upstream_status_falls_back_to_500() {
        let err = ApiError::DataCloudError {
            status: 1000,
            message: "Unknown error".to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = ApiError::Internal(anyhow::anyhow!("db password leaked")).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Internal server error");
        assert_eq!(body["error"]["type"], "internal_error");
    }
}
