//! # Query Model
//!
//! Descriptor types as received from callers (untrusted) and the
//! normalized, validated forms the executor runs (trusted). A
//! `NormalizedQuery` that escapes the normalizer has already passed the
//! access policy and, for free-form queries, the sandbox screen; the
//! executor performs no further authorization.

pub mod errors;
pub mod normalizer;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use errors::{QueryError, QueryResult};
pub use normalizer::Normalizer;

/// The closed set of supported query types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Spherical-cap search around one or more sky positions
    ConeSearch,
    /// Free-form expression evaluated through the closed grammar
    GeneralSearch,
    /// Filtered multi-document lookup
    Find,
    /// Filtered single-document lookup
    FindOne,
    /// Filtered document count
    CountDocuments,
    /// Aggregation pipeline
    Aggregate,
    /// Catalog/store metadata commands
    Info,
}

impl QueryType {
    /// String form used in logs and API payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::ConeSearch => "cone_search",
            QueryType::GeneralSearch => "general_search",
            QueryType::Find => "find",
            QueryType::FindOne => "find_one",
            QueryType::CountDocuments => "count_documents",
            QueryType::Aggregate => "aggregate",
            QueryType::Info => "info",
        }
    }
}

/// A query as submitted by a caller. Untrusted until normalized.
///
/// `user` and `is_admin` are filled in by the serving layer from the
/// already-authenticated identity, never from the request body.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryDescriptor {
    /// Requested query type; unknown values fail deserialization
    pub query_type: QueryType,

    /// Type-specific payload
    #[serde(default)]
    pub query: Value,

    /// Execution options; only allow-listed keys are ever forwarded
    #[serde(default)]
    pub kwargs: Map<String, Value>,

    /// Authenticated user identity
    #[serde(skip)]
    pub user: String,

    /// Whether the user holds admin rights
    #[serde(skip)]
    pub is_admin: bool,
}

/// Metadata commands supported by the `info` query type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoCommand {
    /// Queryable catalog names, system collections excluded
    CatalogNames,
    /// Storage statistics for one catalog
    CatalogInfo { catalog: String },
    /// Index descriptions for one catalog
    IndexInfo { catalog: String },
    /// Store-wide statistics
    DbInfo,
}

/// Filter and projection pair for one catalog of a cone search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConeQuery {
    /// Merged geospatial predicate and caller filter
    pub filter: Value,
    /// Projection; empty object means full documents
    pub projection: Value,
}

/// Canonical, validated payload per query type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizedPayload {
    /// `find`: catalog, filter and projection all native
    Find {
        catalog: String,
        filter: Value,
        projection: Value,
    },
    /// `find_one`
    FindOne { catalog: String, filter: Value },
    /// `count_documents`
    CountDocuments { catalog: String, filter: Value },
    /// `aggregate`
    Aggregate { catalog: String, pipeline: Vec<Value> },
    /// `cone_search`: catalog name, then object name, then the per-object
    /// filter/projection pair
    ConeSearch {
        catalogs: BTreeMap<String, BTreeMap<String, ConeQuery>>,
    },
    /// `general_search`: screened expression text, parsed by the
    /// executor's closed grammar
    GeneralSearch { expression: String },
    /// `info`
    Info { command: InfoCommand },
}

impl NormalizedPayload {
    /// The query type this payload belongs to
    pub fn query_type(&self) -> QueryType {
        match self {
            NormalizedPayload::Find { .. } => QueryType::Find,
            NormalizedPayload::FindOne { .. } => QueryType::FindOne,
            NormalizedPayload::CountDocuments { .. } => QueryType::CountDocuments,
            NormalizedPayload::Aggregate { .. } => QueryType::Aggregate,
            NormalizedPayload::ConeSearch { .. } => QueryType::ConeSearch,
            NormalizedPayload::GeneralSearch { .. } => QueryType::GeneralSearch,
            NormalizedPayload::Info { .. } => QueryType::Info,
        }
    }
}

/// A validated query. Every filter, projection and pipeline is a native
/// structured value; access checks have already passed.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedQuery {
    /// Query type, kept explicit for logging and hashing
    pub query_type: QueryType,
    /// Canonical payload
    pub query: NormalizedPayload,
    /// Caller-supplied execution options (allow-listed at use)
    pub kwargs: Map<String, Value>,
    /// Authenticated user identity, attached to every store call
    pub user: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_query_type_rejected() {
        let raw = json!({"query_type": "drop_everything", "query": {}});
        assert!(serde_json::from_value::<QueryDescriptor>(raw).is_err());
    }

    #[test]
    fn test_descriptor_ignores_identity_in_body() {
        let raw = json!({
            "query_type": "find",
            "query": {"catalog": "sources", "filter": {}},
            "user": "mallory",
            "is_admin": true
        });
        let descriptor: QueryDescriptor = serde_json::from_value(raw).unwrap();
        assert_eq!(descriptor.user, "");
        assert!(!descriptor.is_admin);
    }

    #[test]
    fn test_payload_query_type() {
        let payload = NormalizedPayload::FindOne {
            catalog: "sources".to_string(),
            filter: json!({}),
        };
        assert_eq!(payload.query_type(), QueryType::FindOne);
    }
}
