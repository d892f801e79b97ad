use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::transport::{Method, TransportRequest, TransportResponse};
use crate::auth::{AuthError, TokenManager, Transport};
use crate::error::ApiError;

/// Request against the Data Cloud API, relative to the token's base URL
#[derive(Debug, Clone)]
pub struct PlatformRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl PlatformRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    fn to_transport(&self, base_url: &str, token: &str) -> TransportRequest {
        let url = format!("{}{}", base_url, self.path);
        let request = match (self.method, &self.body) {
            (Method::Post, Some(body)) => TransportRequest::post_json(url, body.clone()),
            (Method::Post, None) => TransportRequest::post_json(url, Value::Object(Default::default())),
            (Method::Get, _) => TransportRequest::get(url),
        };
        request
            .bearer(token)
            .header("Accept", "application/json")
    }
}

/// HTTP client for the Data Cloud API with retry logic
pub struct DataCloudHttpClient {
    /// Transport shared with the token manager
    transport: Arc<dyn Transport>,

    /// Source of bearer tokens
    token_manager: Arc<TokenManager>,

    /// Maximum number of retries for 429/5xx/network errors
    max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    base_delay_ms: u64,
}

impl DataCloudHttpClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        token_manager: Arc<TokenManager>,
        max_retries: u32,
    ) -> Self {
        Self {
            transport,
            token_manager,
            max_retries,
            base_delay_ms: 1000, // 1 second base delay
        }
    }

    /// Override the backoff base delay
    pub fn with_base_delay(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    /// Execute an authenticated request and parse the JSON response
    ///
    /// A 401/403 invalidates the cached token and retries exactly once with
    /// a fresh one. A second rejection is terminal.
    pub async fn execute(&self, request: &PlatformRequest) -> Result<Value, ApiError> {
        let mut refreshed = false;

        loop {
            let (token, base_url) = self.token_manager.get_token().await?;
            let response = self
                .send_with_backoff(request.to_transport(&base_url, &token))
                .await?;

            match response.status {
                200..=299 => return parse_body(&response),
                401 | 403 if !refreshed => {
                    tracing::warn!(
                        status = response.status,
                        path = %request.path,
                        "Data Cloud rejected token, refreshing and retrying once..."
                    );
                    self.token_manager.invalidate().await;
                    refreshed = true;
                }
                401 | 403 => {
                    tracing::error!(
                        status = response.status,
                        path = %request.path,
                        "Data Cloud rejected freshly issued token"
                    );
                    return Err(AuthError::downstream(response.status, response.body).into());
                }
                status => {
                    tracing::error!(
                        status,
                        path = %request.path,
                        response_body = %response.body,
                        "Data Cloud request failed with error response"
                    );
                    return Err(ApiError::DataCloudError {
                        status,
                        message: response.body,
                    });
                }
            }
        }
    }

    /// Send one request, backing off on 429, 5xx and network errors
    async fn send_with_backoff(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, ApiError> {
        let mut attempt = 0;

        loop {
            tracing::debug!(
                attempt = attempt + 1,
                max_retries = self.max_retries,
                url = %request.url,
                "Executing request attempt"
            );

            match self.transport.send(request.clone()).await {
                Ok(response) => {
                    let retryable = matches!(response.status, 429 | 500..=599);
                    if retryable && attempt < self.max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            "Received {}, retrying after {}ms (attempt {}/{})",
                            response.status,
                            delay,
                            attempt + 1,
                            self.max_retries
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            "Request failed: {}, retrying after {}ms (attempt {}/{})",
                            e,
                            delay,
                            attempt + 1,
                            self.max_retries
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    tracing::error!(
                        error = %e,
                        total_attempts = attempt + 1,
                        "HTTP request failed after all retries"
                    );
                    return Err(ApiError::Transport(e));
                }
            }
        }
    }

    /// Exponential backoff: base_delay * 2^attempt
    fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        self.base_delay_ms * 2_u64.pow(attempt)
    }
}

fn parse_body(response: &TransportResponse) -> Result<Value, ApiError> {
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    response.json().map_err(|e| {
        ApiError::Internal(anyhow::anyhow!("Malformed Data Cloud response: {}", e))
    })
}
