// Request middleware: gateway key check, correlation ids, CORS

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tower_http::cors::{Any, CorsLayer};
use tracing::Instrument;

use crate::error::ApiError;
use crate::routes::AppState;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Longest caller-supplied correlation id that is accepted as is
const MAX_CORRELATION_ID_LEN: usize = 128;

/// Correlation id attached to the request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Gateway key check
///
/// Accepts `Authorization: Bearer {PROXY_API_KEY}` or the bare key in
/// `x-api-key`. The presented key is never logged.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if presented_key_matches(request.headers(), &state.proxy_api_key) {
        return Ok(next.run(request).await);
    }

    tracing::warn!(
        method = %request.method(),
        path = %request.uri().path(),
        "Rejected request with invalid or missing gateway key"
    );
    Err(ApiError::Unauthorized(
        "Invalid or missing API Key".to_string(),
    ))
}

fn presented_key_matches(headers: &HeaderMap, expected: &str) -> bool {
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    [bearer, api_key]
        .into_iter()
        .flatten()
        .any(|candidate| keys_equal(candidate, expected))
}

fn keys_equal(candidate: &str, expected: &str) -> bool {
    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Propagate `X-Correlation-ID`, generating one when the caller sent none
///
/// The id is stored in the request extensions, recorded on a tracing span
/// covering the request and echoed on the response, errors included.
pub async fn correlation_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_CORRELATION_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let span = tracing::info_span!("request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

/// Create CORS middleware layer
///
/// Allows all origins, methods, and headers; OPTIONS preflight is handled here.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{test_credential, MockTransport};
    use crate::auth::{TokenManager, TokenSettings};
    use crate::data_cloud::DataCloudService;
    use crate::http_client::DataCloudHttpClient;
    use axum::{
        http::StatusCode,
        routing::{get, post},
        Extension, Router,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    const KEY: &str = "dc-gateway-key";

    fn state_with(transport: Arc<MockTransport>) -> AppState {
        let token_manager = Arc::new(TokenManager::new(
            test_credential(),
            TokenSettings::default(),
            transport.clone(),
        ));
        let client = Arc::new(DataCloudHttpClient::new(transport, token_manager.clone(), 0));

        AppState {
            proxy_api_key: KEY.to_string(),
            token_manager,
            data_cloud: Arc::new(DataCloudService::new(client)),
        }
    }

    async fn echo_correlation(Extension(id): Extension<CorrelationId>) -> String {
        id.0
    }

    /// Invalidate route guarded by the key check, like the real router
    fn guarded_app(state: AppState) -> Router {
        Router::new()
            .route(
                "/v1/auth/invalidate",
                post(|State(state): State<AppState>| async move {
                    state.token_manager.invalidate().await;
                    "cleared"
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ))
            .layer(axum::middleware::from_fn(correlation_id_middleware))
            .with_state(state)
    }

    fn invalidate_request(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/v1/auth/invalidate");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_presented_key_matching() {
        let mut headers = HeaderMap::new();
        assert!(!presented_key_matches(&headers, KEY));

        headers.insert("authorization", HeaderValue::from_static("Bearer dc-gateway-key"));
        assert!(presented_key_matches(&headers, KEY));

        headers.insert("authorization", HeaderValue::from_static("Bearer dc-gateway-ke"));
        assert!(!presented_key_matches(&headers, KEY));

        // A wrong bearer does not hide a correct x-api-key
        headers.insert("x-api-key", HeaderValue::from_static("dc-gateway-key"));
        assert!(presented_key_matches(&headers, KEY));
    }

    #[test]
    fn test_keys_equal_handles_length_mismatch() {
        assert!(keys_equal("abc", "abc"));
        assert!(!keys_equal("abc", "abcd"));
        assert!(!keys_equal("", "abc"));
    }

    #[tokio::test]
    async fn test_bearer_key_reaches_token_manager() {
        let transport = Arc::new(MockTransport::new());
        let response = guarded_app(state_with(transport.clone()))
            .oneshot(invalidate_request(&[("authorization", "Bearer dc-gateway-key")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_x_api_key_is_accepted() {
        let response = guarded_app(state_with(Arc::new(MockTransport::new())))
            .oneshot(invalidate_request(&[("x-api-key", KEY)]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rejected_keys() {
        let cases: [&[(&str, &str)]; 4] = [
            &[],
            &[("authorization", "Bearer wrong")],
            &[("authorization", "dc-gateway-key")],
            &[("authorization", "Basic dc-gateway-key"), ("x-api-key", "wrong")],
        ];

        for headers in cases {
            let response = guarded_app(state_with(Arc::new(MockTransport::new())))
                .oneshot(invalidate_request(headers))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{:?}", headers);
        }
    }

    #[tokio::test]
    async fn test_rejection_echoes_correlation_id() {
        let response = guarded_app(state_with(Arc::new(MockTransport::new())))
            .oneshot(invalidate_request(&[(CORRELATION_ID_HEADER, "req-42")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[CORRELATION_ID_HEADER], "req-42");
    }

    #[tokio::test]
    async fn test_correlation_id_is_propagated_to_handlers() {
        let app = Router::new()
            .route("/echo", get(echo_correlation))
            .layer(axum::middleware::from_fn(correlation_id_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/echo")
                    .header("X-Correlation-ID", "  trace-abc  ")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[CORRELATION_ID_HEADER], "trace-abc");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"trace-abc");
    }

    #[tokio::test]
    async fn test_correlation_id_generated_when_missing_or_oversized() {
        let app = Router::new()
            .route("/echo", get(echo_correlation))
            .layer(axum::middleware::from_fn(correlation_id_middleware));
        let oversized = "x".repeat(MAX_CORRELATION_ID_LEN + 1);

        for header in [None, Some(oversized.as_str())] {
            let mut builder = Request::builder().uri("/echo");
            if let Some(value) = header {
                builder = builder.header(CORRELATION_ID_HEADER, value);
            }
            let response = app
                .clone()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();

            let echoed = response.headers()[CORRELATION_ID_HEADER].to_str().unwrap();
            assert!(uuid::Uuid::parse_str(echoed).is_ok(), "{}", echoed);
        }
    }

    #[tokio::test]
    async fn test_cors_preflight_for_query_route() {
        let app = Router::new()
            .route("/v1/query", post(|| async { "ok" }))
            .layer(cors_layer());

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/v1/query")
                    .header("origin", "https://console.example")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "content-type,x-api-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(response
            .headers()
            .contains_key("access-control-allow-methods"));
    }
}
