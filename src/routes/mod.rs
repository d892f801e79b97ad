use axum::{
    extract::{FromRequest, Path, Query, State},
    middleware::{self as axum_middleware},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{TokenInfo, TokenManager};
use crate::data_cloud::DataCloudService;
use crate::error::ApiError;
use crate::middleware;
use crate::models::{
    BatchQueryRequest, BatchQueryResult, ConnectionStatus, Envelope, ObjectList, ObjectMetadata,
    QueryRequest, QueryResult,
};

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub proxy_api_key: String,
    pub token_manager: Arc<TokenManager>,
    pub data_cloud: Arc<DataCloudService>,
}

/// JSON body extractor whose rejections use the gateway error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Health check routes (no authentication required)
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .layer(axum_middleware::from_fn(middleware::correlation_id_middleware))
        .with_state(state)
}

/// Data Cloud routes (require authentication)
pub fn data_cloud_routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/query", post(query_handler))
        .route("/v1/batch-query", post(batch_query_handler))
        .route("/v1/objects", get(list_objects_handler))
        .route("/v1/objects/:name", get(object_metadata_handler))
        .route("/v1/connection", get(connection_handler))
        .route("/v1/auth/status", get(auth_status_handler))
        .route("/v1/auth/invalidate", post(auth_invalidate_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::correlation_id_middleware))
        .with_state(state)
}

/// GET / - Simple health check
///
/// This endpoint does not require authentication (for load balancers).
async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Data Cloud Gateway is running",
        "version": VERSION
    }))
}

#[derive(Debug, Default, Deserialize)]
struct HealthParams {
    /// Run the token chain (or reuse a cached token) to prove the platform is reachable
    #[serde(default)]
    check_dependencies: bool,
}

/// GET /health - Detailed health check
///
/// Always reports the cached token state. With `?check_dependencies=true`
/// it also obtains a token; a failure there marks the gateway degraded.
async fn health_handler(
    State(state): State<AppState>,
    Query(params): Query<HealthParams>,
) -> Json<Value> {
    let mut body = json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION,
        "token": state.token_manager.token_info().await,
    });

    if params.check_dependencies {
        let auth = match state.token_manager.get_token().await {
            Ok(_) => "healthy",
            Err(e) => {
                tracing::warn!(error = %e, "Health check could not obtain a Data Cloud token");
                "unhealthy"
            }
        };
        if auth == "unhealthy" {
            body["status"] = json!("degraded");
        }
        body["dependencies"] = json!({ "data_cloud_auth": auth });
        body["token"] = json!(state.token_manager.token_info().await);
    }

    Json(body)
}

/// POST /v1/query - Run an ANSI SQL query against Data Cloud
async fn query_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<QueryRequest>,
) -> Result<Json<Envelope<QueryResult>>, ApiError> {
    tracing::info!("Request to /v1/query");

    let result = state.data_cloud.query(&request).await?;
    Ok(Json(Envelope::ok(result)))
}

/// POST /v1/batch-query - Run up to ten queries, reporting each outcome
async fn batch_query_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BatchQueryRequest>,
) -> Result<Json<Envelope<BatchQueryResult>>, ApiError> {
    tracing::info!(query_count = request.queries.len(), "Request to /v1/batch-query");

    let result = state.data_cloud.batch_query(&request.queries).await?;
    Ok(Json(Envelope::ok(result)))
}

/// GET /v1/objects - List available data model objects
async fn list_objects_handler(
    State(state): State<AppState>,
) -> Result<Json<Envelope<ObjectList>>, ApiError> {
    tracing::info!("Request to /v1/objects");

    let result = state.data_cloud.list_objects().await?;
    Ok(Json(Envelope::ok(result)))
}

/// GET /v1/objects/:name - Metadata for one object
async fn object_metadata_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Envelope<ObjectMetadata>>, ApiError> {
    tracing::info!("Request to /v1/objects/{}", name);

    let result = state.data_cloud.object_metadata(&name).await?;
    Ok(Json(Envelope::ok(result)))
}

/// GET /v1/connection - Authenticate and call the metadata API once
async fn connection_handler(
    State(state): State<AppState>,
) -> Result<Json<Envelope<ConnectionStatus>>, ApiError> {
    tracing::info!("Request to /v1/connection");

    let result = state.data_cloud.test_connection().await?;
    Ok(Json(Envelope::ok(result)))
}

/// GET /v1/auth/status - Cached token diagnostics, no network
async fn auth_status_handler(State(state): State<AppState>) -> Json<Envelope<TokenInfo>> {
    Json(Envelope::ok(state.token_manager.token_info().await))
}

/// POST /v1/auth/invalidate - Force the next call to re-authenticate
async fn auth_invalidate_handler(State(state): State<AppState>) -> Json<Value> {
    state.token_manager.invalidate().await;
    Json(json!({
        "success": true,
        "message": "Cached token cleared"
    }))
}
