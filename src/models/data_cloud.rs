use serde::{Deserialize, Serialize};
use serde_json::Value;

// ==================================================================================================
// Envelope shared by all successful responses
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn ok(body: T) -> Self {
        Self {
            success: true,
            body,
        }
    }
}

// ==================================================================================================
// Models for /v1/query endpoint
// ==================================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,

    /// Maximum rows to return (1-1000)
    #[serde(default)]
    pub limit: Option<u32>,

    /// Rows to skip before the first returned row
    #[serde(default)]
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Value,
    pub query: String,
    pub record_count: usize,

    /// Continuation link returned by the platform for large result sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_records_url: Option<String>,

    /// Batch id for fetching the next page of a v2 query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_batch_id: Option<String>,
}

// ==================================================================================================
// Models for /v1/batch-query endpoint
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchQueryRequest {
    pub queries: Vec<QueryRequest>,
}

/// Outcome of the whole batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Partial,
    Failed,
}

impl BatchStatus {
    pub fn from_counts(successful: usize, failed: usize) -> Self {
        match (successful, failed) {
            (_, 0) => BatchStatus::Success,
            (0, _) => BatchStatus::Failed,
            _ => BatchStatus::Partial,
        }
    }
}

/// Error reported for one query inside a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Result of one query inside a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub success: bool,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchQueryResult {
    pub status: BatchStatus,
    pub results: Vec<BatchItem>,
    pub total_queries: usize,
    pub successful_queries: usize,
    pub failed_queries: usize,
    pub processing_time_ms: u64,
}

// ==================================================================================================
// Models for /v1/objects endpoints
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectList {
    pub data: Value,
    pub object_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub data: Value,
    pub object_name: String,
}

// ==================================================================================================
// Models for /v1/connection endpoint
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub message: String,
    pub instance_url: String,
    pub token_valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_flattens_body() {
        let envelope = Envelope::ok(ObjectMetadata {
            data: json!({"fields": []}),
            object_name: "UnifiedIndividual__dlm".to_string(),
        });

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "success": true,
                "data": {"fields": []},
                "object_name": "UnifiedIndividual__dlm"
            })
        );
    }

    #[test]
    fn test_query_request_deserialization() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"sql": "SELECT Id__c FROM Contact__dlm LIMIT 10"}"#).unwrap();
        assert_eq!(req.sql, "SELECT Id__c FROM Contact__dlm LIMIT 10");
        assert_eq!(req.limit, None);
        assert_eq!(req.offset, None);

        let req: QueryRequest =
            serde_json::from_str(r#"{"sql": "SELECT 1", "limit": 50, "offset": 100}"#).unwrap();
        assert_eq!(req.limit, Some(50));
        assert_eq!(req.offset, Some(100));
    }

    #[test]
    fn test_query_result_omits_missing_pagination() {
        let result = QueryResult {
            data: json!({"data": []}),
            query: "SELECT 1".to_string(),
            record_count: 0,
            next_records_url: None,
            next_batch_id: Some("b-2".to_string()),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("next_records_url").is_none());
        assert_eq!(value["next_batch_id"], "b-2");
    }

    #[test]
    fn test_batch_status_from_counts() {
        assert_eq!(BatchStatus::from_counts(3, 0), BatchStatus::Success);
        assert_eq!(BatchStatus::from_counts(2, 1), BatchStatus::Partial);
        assert_eq!(BatchStatus::from_counts(0, 2), BatchStatus::Failed);
        assert_eq!(
            serde_json::to_value(BatchStatus::Partial).unwrap(),
            json!("partial")
        );
    }
}
