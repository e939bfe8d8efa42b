//! # Query Executor
//!
//! Maps a normalized query onto document-store primitives. Every path
//! passes a maximum-execution-time bound to the store; per-type option
//! allow-lists decide which caller kwargs are forwarded; results are
//! shaped into the `query_result` envelope the portal has always
//! returned. The executor performs no authorization: a query that
//! reaches it has already passed the access policy and sandbox.

use serde_json::{json, Map, Value};

use crate::config::EngineConfig;
use crate::query::errors::{QueryError, QueryResult};
use crate::query::{InfoCommand, NormalizedPayload, NormalizedQuery};

use super::general::{self, GeneralOp};
use super::options::{AggregateOptions, CountOptions, FindOptions};
use super::store::DocumentStore;

/// Executes normalized queries against a document store
pub struct QueryExecutor<'a> {
    config: &'a EngineConfig,
    store: &'a dyn DocumentStore,
}

impl<'a> QueryExecutor<'a> {
    /// Build an executor over a store
    pub fn new(config: &'a EngineConfig, store: &'a dyn DocumentStore) -> Self {
        Self { config, store }
    }

    /// Execute a query, returning the shaped result payload
    pub async fn execute(&self, query: &NormalizedQuery) -> QueryResult<Value> {
        let max_time_ms = self.deadline_ms(&query.kwargs)?;

        match &query.query {
            NormalizedPayload::Find {
                catalog,
                filter,
                projection,
            } => {
                let options = FindOptions::from_kwargs(&query.kwargs, max_time_ms, &query.user);
                let projection = non_empty_projection(projection);
                let docs = self
                    .store
                    .find(catalog, filter, projection, &options)
                    .await?;
                Ok(json!({ "query_result": docs }))
            }

            NormalizedPayload::FindOne { catalog, filter } => {
                let options = FindOptions::from_kwargs(&query.kwargs, max_time_ms, &query.user);
                let doc = self.store.find_one(catalog, filter, &options).await?;
                Ok(json!({ "query_result": doc }))
            }

            NormalizedPayload::CountDocuments { catalog, filter } => {
                let options = CountOptions::from_kwargs(&query.kwargs, max_time_ms, &query.user);
                let count = self
                    .store
                    .count_documents(catalog, filter, &options)
                    .await?;
                Ok(json!({ "query_result": count }))
            }

            NormalizedPayload::Aggregate { catalog, pipeline } => {
                let options =
                    AggregateOptions::from_kwargs(&query.kwargs, max_time_ms, &query.user);
                let docs = self.store.aggregate(catalog, pipeline, &options).await?;
                Ok(json!({ "query_result": docs }))
            }

            NormalizedPayload::ConeSearch { catalogs } => {
                let options = FindOptions::from_kwargs(&query.kwargs, max_time_ms, &query.user);
                let mut result = Map::new();
                for (catalog, objects) in catalogs {
                    let mut per_object = Map::new();
                    for (name, cone) in objects {
                        let projection = non_empty_projection(&cone.projection);
                        let docs = self
                            .store
                            .find(catalog, &cone.filter, projection, &options)
                            .await?;
                        // the store forbids dots in field keys
                        per_object.insert(name.replace('.', "_"), Value::Array(docs));
                    }
                    result.insert(catalog.clone(), Value::Object(per_object));
                }
                Ok(Value::Object(result))
            }

            NormalizedPayload::GeneralSearch { expression } => {
                let value = self
                    .run_general(expression, &query.kwargs, max_time_ms, &query.user)
                    .await?;
                Ok(json!({ "query_result": value }))
            }

            NormalizedPayload::Info { command } => {
                let value = self.run_info(command).await?;
                Ok(json!({ "query_result": value }))
            }
        }
    }

    /// Resolve and validate the execution deadline: caller override via
    /// `kwargs.max_time_ms`, configuration default otherwise, always ≥ 1
    fn deadline_ms(&self, kwargs: &Map<String, Value>) -> QueryResult<u64> {
        let max_time_ms = match kwargs.get("max_time_ms") {
            None => self.config.default_max_time_ms,
            Some(value) => lenient_u64(value).ok_or_else(|| {
                QueryError::validation(format!("bad max_time_ms, must be int >= 1: {}", value))
            })?,
        };
        if max_time_ms < 1 {
            return Err(QueryError::validation(
                "bad max_time_ms, must be int >= 1",
            ));
        }
        Ok(max_time_ms)
    }

    async fn run_general(
        &self,
        expression: &str,
        kwargs: &Map<String, Value>,
        max_time_ms: u64,
        user: &str,
    ) -> QueryResult<Value> {
        let call =
            general::parse_call(expression).map_err(|e| QueryError::execution(e.to_string()))?;
        let collection = call.collection;

        match call.op {
            GeneralOp::Find { filter, projection } => {
                let options = FindOptions::from_kwargs(kwargs, max_time_ms, user);
                let docs = self
                    .store
                    .find(&collection, &filter, projection.as_ref(), &options)
                    .await?;
                Ok(Value::Array(docs))
            }
            GeneralOp::FindOne { filter } => {
                let options = FindOptions::from_kwargs(kwargs, max_time_ms, user);
                let doc = self.store.find_one(&collection, &filter, &options).await?;
                Ok(doc.unwrap_or(Value::Null))
            }
            GeneralOp::CountDocuments { filter } => {
                let options = CountOptions::from_kwargs(kwargs, max_time_ms, user);
                let count = self
                    .store
                    .count_documents(&collection, &filter, &options)
                    .await?;
                Ok(json!(count))
            }
            GeneralOp::EstimatedDocumentCount => {
                let options = CountOptions::from_kwargs(kwargs, max_time_ms, user);
                let count = self
                    .store
                    .estimated_document_count(&collection, &options)
                    .await?;
                Ok(json!(count))
            }
            GeneralOp::Distinct { field, filter } => {
                let options = FindOptions::from_kwargs(kwargs, max_time_ms, user);
                let values = self
                    .store
                    .distinct(&collection, &field, &filter, &options)
                    .await?;
                Ok(Value::Array(values))
            }
            GeneralOp::Aggregate { pipeline } => {
                let options = AggregateOptions::from_kwargs(kwargs, max_time_ms, user);
                let docs = self
                    .store
                    .aggregate(&collection, &pipeline, &options)
                    .await?;
                Ok(Value::Array(docs))
            }
            GeneralOp::IndexInformation => {
                Ok(self.store.index_information(&collection).await?)
            }
        }
    }

    async fn run_info(&self, command: &InfoCommand) -> QueryResult<Value> {
        match command {
            InfoCommand::CatalogNames => {
                let mut names: Vec<String> = self
                    .store
                    .list_collection_names()
                    .await?
                    .into_iter()
                    .filter(|name| !self.config.is_system(name))
                    .collect();
                // reverse-alphabetical, newest survey epochs first
                names.sort_by(|a, b| b.cmp(a));
                Ok(json!(names))
            }
            InfoCommand::CatalogInfo { catalog } => {
                Ok(self.store.command("collstats", Some(catalog)).await?)
            }
            InfoCommand::IndexInfo { catalog } => {
                Ok(self.store.index_information(catalog).await?)
            }
            InfoCommand::DbInfo => Ok(self.store.command("dbstats", None).await?),
        }
    }
}

/// Accept a deadline as a native integer or a numeric string
fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Treat an empty projection object as "return full documents"
fn non_empty_projection(projection: &Value) -> Option<&Value> {
    match projection {
        Value::Object(map) if map.is_empty() => None,
        Value::Null => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_u64() {
        assert_eq!(lenient_u64(&json!(5)), Some(5));
        assert_eq!(lenient_u64(&json!("5")), Some(5));
        assert_eq!(lenient_u64(&json!(-1)), None);
        assert_eq!(lenient_u64(&json!("five")), None);
        assert_eq!(lenient_u64(&json!(null)), None);
    }

    #[test]
    fn test_non_empty_projection() {
        assert!(non_empty_projection(&json!({})).is_none());
        assert!(non_empty_projection(&Value::Null).is_none());
        assert!(non_empty_projection(&json!({"_id": 1})).is_some());
    }
}
