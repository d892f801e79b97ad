// Test doubles for the token chain

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::EncodingKey;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::clock::Clock;
use super::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use super::types::Credential;

pub fn test_credential() -> Credential {
    let key = EncodingKey::from_rsa_pem(include_bytes!("../../tests/fixtures/test_signing_key.pem"))
        .unwrap();
    Credential::new("test-client-id", "user@example.com", "https://login.example", key).unwrap()
}

/// Scripted transport that records every request it receives
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<TransportRequest>>,
    delay: Option<std::time::Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every response for `delay` before returning it
    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push(Ok(TransportResponse::new(status, body.to_string())));
    }

    pub fn push_text(&self, status: u16, body: &str) {
        self.push(Ok(TransportResponse::new(status, body)));
    }

    pub fn push_timeout(&self) {
        self.push(Err(TransportError::Timeout {
            url: "mock".to_string(),
        }));
    }

    /// Queue a successful identity + exchange pair
    pub fn push_token_chain(&self, token: &str, base_url: &str, expires_in: i64) {
        self.push_json(
            200,
            serde_json::json!({"access_token": format!("platform-{}", token), "instance_url": "https://i.example"}),
        );
        self.push_json(
            200,
            serde_json::json!({"access_token": token, "base_url": base_url, "expires_in": expires_in}),
        );
    }

    fn push(&self, response: Result<TransportResponse, TransportError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TransportResponse::new(500, "no scripted response")))
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
