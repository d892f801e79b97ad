// Data models for the gateway API

pub mod data_cloud;

pub use data_cloud::{
    BatchItem, BatchQueryRequest, BatchQueryResult, BatchStatus, ConnectionStatus, Envelope,
    ObjectList, ObjectMetadata, QueryFailure, QueryRequest, QueryResult,
};
