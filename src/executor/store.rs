//! Abstract document store interface
//!
//! The engine consumes this interface and never talks to a driver
//! directly. Every call takes a maximum-execution-time bound (carried in
//! its options) and a caller comment tag; the store, not the engine,
//! enforces the deadline. Cursor draining happens behind this seam:
//! multi-document operations return fully materialized sequences.

use async_trait::async_trait;
use serde_json::Value;

use super::errors::StoreResult;
use super::options::{AggregateOptions, CountOptions, FindOptions};

/// Document store primitives consumed by the executor
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Filtered multi-document lookup. `projection: None` returns full
    /// documents.
    async fn find(
        &self,
        collection: &str,
        filter: &Value,
        projection: Option<&Value>,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>>;

    /// Filtered single-document lookup
    async fn find_one(
        &self,
        collection: &str,
        filter: &Value,
        options: &FindOptions,
    ) -> StoreResult<Option<Value>>;

    /// Count documents matching a filter
    async fn count_documents(
        &self,
        collection: &str,
        filter: &Value,
        options: &CountOptions,
    ) -> StoreResult<u64>;

    /// Collection size estimate from metadata, no filter applied
    async fn estimated_document_count(
        &self,
        collection: &str,
        options: &CountOptions,
    ) -> StoreResult<u64>;

    /// Distinct values of a field among documents matching a filter
    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: &Value,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>>;

    /// Run an aggregation pipeline
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Value],
        options: &AggregateOptions,
    ) -> StoreResult<Vec<Value>>;

    /// Names of every collection in the store
    async fn list_collection_names(&self) -> StoreResult<Vec<String>>;

    /// Index descriptions for a collection
    async fn index_information(&self, collection: &str) -> StoreResult<Value>;

    /// Run a named store command (`collstats`, `dbstats`, ...) against an
    /// optional target collection
    async fn command(&self, name: &str, target: Option<&str>) -> StoreResult<Value>;

    /// Create an index over the given keys; returns the index name
    async fn create_index(&self, collection: &str, keys: &Value, unique: bool)
        -> StoreResult<String>;
}
