// Data Cloud query and metadata operations

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{ApiError, Result};
use crate::http_client::{DataCloudHttpClient, PlatformRequest};
use crate::models::{
    BatchItem, BatchQueryResult, BatchStatus, ConnectionStatus, ObjectList, ObjectMetadata,
    QueryFailure, QueryRequest, QueryResult,
};

const QUERY_PATH: &str = "/api/v2/query";
const METADATA_PATH: &str = "/api/v1/metadata";

pub const MAX_BATCH_QUERIES: usize = 10;
pub const MAX_QUERY_LIMIT: u32 = 1000;

/// Object API names such as `UnifiedIndividual__dlm`
static OBJECT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Data Cloud operations exposed by the gateway
pub struct DataCloudService {
    client: Arc<DataCloudHttpClient>,
}

impl DataCloudService {
    pub fn new(client: Arc<DataCloudHttpClient>) -> Self {
        Self { client }
    }

    /// Run an ANSI SQL query
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        let sql = request.sql.trim();
        if sql.is_empty() {
            return Err(ApiError::ValidationError("sql cannot be empty".to_string()));
        }
        let path = query_path(request.limit, request.offset)?;

        tracing::info!(query = %sql, limit = ?request.limit, offset = ?request.offset, "Executing Data Cloud query");
        let data = self
            .client
            .execute(&PlatformRequest::post_json(path, json!({ "sql": sql })))
            .await?;

        let record_count = count_items(&data, &["data", "records"]);
        tracing::info!(record_count, "Query executed successfully");

        Ok(QueryResult {
            next_records_url: string_field(&data, "nextRecordsUrl"),
            next_batch_id: string_field(&data, "nextBatchId"),
            data,
            query: sql.to_string(),
            record_count,
        })
    }

    /// Run several queries in order, collecting a result or error for each
    ///
    /// One failing query does not stop the rest. All queries share the cached
    /// token, so at most one token exchange happens for the whole batch.
    pub async fn batch_query(&self, queries: &[QueryRequest]) -> Result<BatchQueryResult> {
        if queries.is_empty() || queries.len() > MAX_BATCH_QUERIES {
            return Err(ApiError::ValidationError(format!(
                "batch must contain between 1 and {} queries, got {}",
                MAX_BATCH_QUERIES,
                queries.len()
            )));
        }

        let start = Instant::now();
        tracing::info!(query_count = queries.len(), "Executing batch query");

        let mut results = Vec::with_capacity(queries.len());
        for request in queries {
            let item = match self.query(request).await {
                Ok(result) => BatchItem {
                    success: true,
                    query: request.sql.clone(),
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(query = %request.sql, error = %e, "Query in batch failed");
                    BatchItem {
                        success: false,
                        query: request.sql.clone(),
                        result: None,
                        error: Some(QueryFailure {
                            message: e.to_string(),
                            kind: e.kind().to_string(),
                        }),
                    }
                }
            };
            results.push(item);
        }

        let successful_queries = results.iter().filter(|item| item.success).count();
        let failed_queries = results.len() - successful_queries;
        let processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            successful_queries,
            failed_queries,
            processing_time_ms,
            "Batch query executed"
        );

        Ok(BatchQueryResult {
            status: BatchStatus::from_counts(successful_queries, failed_queries),
            total_queries: results.len(),
            results,
            successful_queries,
            failed_queries,
            processing_time_ms,
        })
    }

    /// List the data model objects available to the connected user
    pub async fn list_objects(&self) -> Result<ObjectList> {
        let data = self
            .client
            .execute(&PlatformRequest::get(METADATA_PATH))
            .await?;

        let object_count = count_items(&data, &["metadata", "objects"]);
        tracing::info!(object_count, "Available objects retrieved");

        Ok(ObjectList { data, object_count })
    }

    /// Fetch the schema of a single object
    pub async fn object_metadata(&self, object_name: &str) -> Result<ObjectMetadata> {
        if !OBJECT_NAME.is_match(object_name) {
            return Err(ApiError::ValidationError(format!(
                "invalid object name '{}': expected letters, digits and underscores",
                object_name
            )));
        }

        let path = format!("{}/{}", METADATA_PATH, object_name);
        let data = self.client.execute(&PlatformRequest::get(path)).await?;
        tracing::info!(object_name, "Metadata retrieved");

        Ok(ObjectMetadata {
            data,
            object_name: object_name.to_string(),
        })
    }

    /// Authenticate and make one metadata call
    pub async fn test_connection(&self) -> Result<ConnectionStatus> {
        let (_, instance_url) = self.client.token_manager().get_token().await?;
        self.client
            .execute(&PlatformRequest::get(METADATA_PATH))
            .await?;

        tracing::info!(instance_url = %instance_url, "Connection test successful");

        Ok(ConnectionStatus {
            message: "Successfully connected to Salesforce Data Cloud".to_string(),
            instance_url,
            token_valid: true,
        })
    }
}

/// Query endpoint with optional `limit`/`offset` passed through as URL parameters
fn query_path(limit: Option<u32>, offset: Option<u64>) -> Result<String> {
    let mut params = Vec::new();
    if let Some(limit) = limit {
        if limit == 0 || limit > MAX_QUERY_LIMIT {
            return Err(ApiError::ValidationError(format!(
                "limit must be between 1 and {}, got {}",
                MAX_QUERY_LIMIT, limit
            )));
        }
        params.push(format!("limit={}", limit));
    }
    if let Some(offset) = offset {
        params.push(format!("offset={}", offset));
    }

    if params.is_empty() {
        Ok(QUERY_PATH.to_string())
    } else {
        Ok(format!("{}?{}", QUERY_PATH, params.join("&")))
    }
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Length of the first array found under any of `keys`
fn count_items(data: &Value, keys: &[&str]) -> usize {
    keys.iter()
        .find_map(|key| data.get(*key).and_then(Value::as_array))
        .map(Vec::len)
        .unwrap_or(0)
}
