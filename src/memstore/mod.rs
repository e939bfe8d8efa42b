//! # In-Memory Document Store
//!
//! A small `DocumentStore` implementation backing the demo server and
//! the test suite. Collections are plain vectors of JSON documents;
//! filters, projections and the aggregation subset are evaluated
//! in-process. Not a real database: no durability, index metadata is
//! tracked but never used for access paths.

pub mod filter;
pub mod pipeline;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::executor::errors::{StoreError, StoreResult};
use crate::executor::options::{AggregateOptions, CountOptions, FindOptions};
use crate::executor::store::DocumentStore;

pub use filter::DocumentFilter;

use filter::lookup_path;

/// Index metadata tracked per collection
#[derive(Debug, Clone)]
struct IndexSpec {
    name: String,
    keys: Vec<(String, Value)>,
    unique: bool,
}

/// In-memory document store
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Vec<Value>>>,
    indexes: RwLock<BTreeMap<String, Vec<IndexSpec>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document into a collection, creating it if needed
    pub fn insert(&self, collection: &str, document: Value) {
        self.collections
            .write()
            .expect("collections lock poisoned")
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }

    /// Insert several documents into a collection
    pub fn insert_many(&self, collection: &str, documents: Vec<Value>) {
        self.collections
            .write()
            .expect("collections lock poisoned")
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
    }

    fn matching_documents(
        &self,
        collection: &str,
        filter: &Value,
        max_time_ms: u64,
    ) -> StoreResult<Vec<Value>> {
        let collections = self.collections.read().expect("collections lock poisoned");
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let started = Instant::now();
        let mut matched = Vec::new();
        for doc in docs {
            if started.elapsed().as_millis() as u64 > max_time_ms {
                return Err(StoreError::TimeLimitExceeded(max_time_ms));
            }
            if DocumentFilter::matches(doc, filter)? {
                matched.push(doc.clone());
            }
        }
        Ok(matched)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Value,
        projection: Option<&Value>,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>> {
        let mut matched = self.matching_documents(collection, filter, options.max_time_ms)?;
        if let Some(sort) = &options.sort {
            sort_documents(&mut matched, sort)?;
        }
        let skip = options.skip.unwrap_or(0) as usize;
        let mut matched: Vec<Value> = matched.into_iter().skip(skip).collect();
        if let Some(limit) = options.limit {
            matched.truncate(limit as usize);
        }
        match projection {
            Some(p) => matched
                .iter()
                .map(|doc| apply_projection(doc, p))
                .collect(),
            None => Ok(matched),
        }
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Value,
        options: &FindOptions,
    ) -> StoreResult<Option<Value>> {
        let mut matched = self.matching_documents(collection, filter, options.max_time_ms)?;
        if let Some(sort) = &options.sort {
            sort_documents(&mut matched, sort)?;
        }
        Ok(matched.into_iter().next())
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: &Value,
        options: &CountOptions,
    ) -> StoreResult<u64> {
        let matched = self.matching_documents(collection, filter, options.max_time_ms)?;
        let skip = options.skip.unwrap_or(0) as usize;
        Ok(matched.len().saturating_sub(skip) as u64)
    }

    async fn estimated_document_count(
        &self,
        collection: &str,
        _options: &CountOptions,
    ) -> StoreResult<u64> {
        let collections = self.collections.read().expect("collections lock poisoned");
        Ok(collections.get(collection).map(Vec::len).unwrap_or(0) as u64)
    }

    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: &Value,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>> {
        let matched = self.matching_documents(collection, filter, options.max_time_ms)?;
        let mut seen = Vec::new();
        for doc in &matched {
            if let Some(value) = lookup_path(doc, field) {
                if !seen.contains(value) {
                    seen.push(value.clone());
                }
            }
        }
        Ok(seen)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Value],
        _options: &AggregateOptions,
    ) -> StoreResult<Vec<Value>> {
        let collections = self.collections.read().expect("collections lock poisoned");
        let docs = collections.get(collection).cloned().unwrap_or_default();
        pipeline::execute(docs, pipeline, &collections)
    }

    async fn list_collection_names(&self) -> StoreResult<Vec<String>> {
        let collections = self.collections.read().expect("collections lock poisoned");
        Ok(collections.keys().cloned().collect())
    }

    async fn index_information(&self, collection: &str) -> StoreResult<Value> {
        let indexes = self.indexes.read().expect("indexes lock poisoned");
        let mut info = Map::new();
        info.insert("_id_".to_string(), json!({"key": [["_id", 1]]}));
        if let Some(specs) = indexes.get(collection) {
            for spec in specs {
                let keys: Vec<Value> = spec
                    .keys
                    .iter()
                    .map(|(field, dir)| json!([field, dir]))
                    .collect();
                info.insert(
                    spec.name.clone(),
                    json!({"key": keys, "unique": spec.unique}),
                );
            }
        }
        Ok(Value::Object(info))
    }

    async fn command(&self, name: &str, target: Option<&str>) -> StoreResult<Value> {
        let collections = self.collections.read().expect("collections lock poisoned");
        match name {
            "collstats" => {
                let collection =
                    target.ok_or_else(|| StoreError::Backend("collstats needs a target".into()))?;
                let docs = collections
                    .get(collection)
                    .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
                let size: usize = docs
                    .iter()
                    .map(|d| serde_json::to_vec(d).map(|b| b.len()).unwrap_or(0))
                    .sum();
                let nindexes = self
                    .indexes
                    .read()
                    .expect("indexes lock poisoned")
                    .get(collection)
                    .map(Vec::len)
                    .unwrap_or(0)
                    + 1;
                Ok(json!({
                    "ns": collection,
                    "count": docs.len(),
                    "size": size,
                    "nindexes": nindexes
                }))
            }
            "dbstats" => {
                let objects: usize = collections.values().map(Vec::len).sum();
                Ok(json!({
                    "collections": collections.len(),
                    "objects": objects
                }))
            }
            other => Err(StoreError::Backend(format!("unknown command: {}", other))),
        }
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: &Value,
        unique: bool,
    ) -> StoreResult<String> {
        let key_map = keys.as_object().ok_or_else(|| StoreError::Malformed {
            what: "filter",
            detail: format!("index keys must be a mapping, got {}", keys),
        })?;
        let key_list: Vec<(String, Value)> = key_map
            .iter()
            .map(|(field, dir)| (field.clone(), dir.clone()))
            .collect();
        let name = key_list
            .iter()
            .map(|(field, dir)| {
                let dir = match dir {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("{}_{}", field, dir)
            })
            .collect::<Vec<_>>()
            .join("_");

        let mut indexes = self.indexes.write().expect("indexes lock poisoned");
        let specs = indexes.entry(collection.to_string()).or_default();
        if !specs.iter().any(|s| s.name == name) {
            specs.push(IndexSpec {
                name: name.clone(),
                keys: key_list,
                unique,
            });
        }
        Ok(name)
    }
}

/// Apply a projection to a document. `{field: 1}` keeps the listed
/// fields (plus `_id` unless excluded); `{field: 0}` removes them.
pub fn apply_projection(document: &Value, projection: &Value) -> StoreResult<Value> {
    let spec = projection.as_object().ok_or_else(|| StoreError::Malformed {
        what: "projection",
        detail: format!("projection must be a mapping, got {}", projection),
    })?;
    if spec.is_empty() {
        return Ok(document.clone());
    }

    let mut include = None;
    for (field, flag) in spec {
        let on = match flag {
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Value::Bool(b) => *b,
            other => {
                return Err(StoreError::Malformed {
                    what: "projection",
                    detail: format!("bad projection flag for '{}': {}", field, other),
                })
            }
        };
        if field == "_id" {
            continue;
        }
        match include {
            None => include = Some(on),
            Some(mode) if mode != on => {
                return Err(StoreError::Malformed {
                    what: "projection",
                    detail: "cannot mix inclusion and exclusion".to_string(),
                })
            }
            Some(_) => {}
        }
    }
    let id_included = spec
        .get("_id")
        .map(|flag| !matches!(flag, Value::Number(n) if n.as_f64() == Some(0.0)) && flag != &Value::Bool(false))
        .unwrap_or(true);

    // a projection naming only _id follows the _id flag: {_id: 1} keeps
    // just _id, {_id: 0} keeps everything else
    let include = include.unwrap_or(id_included);

    if include {
        let mut out = Map::new();
        if id_included {
            if let Some(id) = document.get("_id") {
                out.insert("_id".to_string(), id.clone());
            }
        }
        for (field, _) in spec.iter().filter(|(f, _)| f.as_str() != "_id") {
            if let Some(value) = lookup_path(document, field) {
                set_path(&mut out, field, value.clone());
            }
        }
        Ok(Value::Object(out))
    } else {
        let mut out = match document {
            Value::Object(m) => m.clone(),
            other => return Ok(other.clone()),
        };
        for (field, _) in spec.iter().filter(|(f, _)| f.as_str() != "_id") {
            remove_path(&mut out, field);
        }
        if !id_included {
            out.remove("_id");
        }
        Ok(Value::Object(out))
    }
}

fn set_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts = path.splitn(2, '.');
    let head = parts.next().expect("split yields at least one part");
    match parts.next() {
        None => {
            target.insert(head.to_string(), value);
        }
        Some(rest) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

fn remove_path(target: &mut Map<String, Value>, path: &str) {
    let mut parts = path.splitn(2, '.');
    let head = parts.next().expect("split yields at least one part");
    match parts.next() {
        None => {
            target.remove(head);
        }
        Some(rest) => {
            if let Some(Value::Object(inner)) = target.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

/// Sort documents in place by a `{field: 1|-1, ...}` specification
pub fn sort_documents(documents: &mut [Value], spec: &Value) -> StoreResult<()> {
    let spec = spec.as_object().ok_or_else(|| StoreError::Malformed {
        what: "filter",
        detail: format!("sort must be a mapping, got {}", spec),
    })?;
    let keys: Vec<(String, bool)> = spec
        .iter()
        .map(|(field, dir)| {
            let descending = matches!(dir, Value::Number(n) if n.as_f64() == Some(-1.0));
            (field.clone(), descending)
        })
        .collect();

    documents.sort_by(|a, b| {
        for (field, descending) in &keys {
            let ord = value_cmp(lookup_path(a, field), lookup_path(b, field));
            if ord != Ordering::Equal {
                return if *descending { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    });
    Ok(())
}

/// Total order over JSON values: null < bool < number < string < array
/// < object, missing sorts as null
fn value_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_many(
            "sources",
            vec![
                json!({"_id": "a", "mag": 17.5, "filter": "zr"}),
                json!({"_id": "b", "mag": 16.2, "filter": "zg"}),
                json!({"_id": "c", "mag": 18.9, "filter": "zr"}),
            ],
        );
        store
    }

    fn find_options() -> FindOptions {
        FindOptions {
            max_time_ms: 1000,
            comment: "tester".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_find_filter_sort_limit() {
        let store = seeded();
        let mut options = find_options();
        options.sort = Some(json!({"mag": -1}));
        options.limit = Some(2);
        let docs = store
            .find("sources", &json!({"filter": "zr"}), None, &options)
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["_id"], "c");
        assert_eq!(docs[1]["_id"], "a");
    }

    #[tokio::test]
    async fn test_find_with_projection() {
        let store = seeded();
        let docs = store
            .find(
                "sources",
                &json!({"_id": "a"}),
                Some(&json!({"mag": 1})),
                &find_options(),
            )
            .await
            .unwrap();
        assert_eq!(docs, vec![json!({"_id": "a", "mag": 17.5})]);
    }

    #[tokio::test]
    async fn test_find_unknown_collection_is_empty() {
        let store = seeded();
        let docs = store
            .find("nope", &json!({}), None, &find_options())
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_count_and_estimate() {
        let store = seeded();
        let options = CountOptions {
            max_time_ms: 1000,
            comment: "tester".to_string(),
            ..Default::default()
        };
        assert_eq!(
            store
                .count_documents("sources", &json!({"filter": "zr"}), &options)
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .estimated_document_count("sources", &options)
                .await
                .unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_distinct() {
        let store = seeded();
        let values = store
            .distinct("sources", "filter", &json!({}), &find_options())
            .await
            .unwrap();
        assert_eq!(values, vec![json!("zr"), json!("zg")]);
    }

    #[tokio::test]
    async fn test_index_roundtrip() {
        let store = seeded();
        let name = store
            .create_index("sources", &json!({"coordinates.radec_geojson": "2dsphere"}), false)
            .await
            .unwrap();
        assert_eq!(name, "coordinates.radec_geojson_2dsphere");
        let info = store.index_information("sources").await.unwrap();
        assert!(info.get("_id_").is_some());
        assert!(info.get(&name).is_some());
    }

    #[tokio::test]
    async fn test_commands() {
        let store = seeded();
        let stats = store.command("collstats", Some("sources")).await.unwrap();
        assert_eq!(stats["count"], 3);
        let db = store.command("dbstats", None).await.unwrap();
        assert_eq!(db["collections"], 1);
        assert!(store.command("collstats", Some("missing")).await.is_err());
        assert!(store.command("shutdown", None).await.is_err());
    }

    #[test]
    fn test_projection_exclusion() {
        let doc = json!({"_id": "a", "mag": 17, "extra": {"x": 1, "y": 2}});
        let out = apply_projection(&doc, &json!({"extra.x": 0})).unwrap();
        assert_eq!(out, json!({"_id": "a", "mag": 17, "extra": {"y": 2}}));
        let out = apply_projection(&doc, &json!({"mag": 1, "_id": 0})).unwrap();
        assert_eq!(out, json!({"mag": 17}));
    }

    #[test]
    fn test_projection_mixing_is_error() {
        let doc = json!({"a": 1, "b": 2});
        assert!(apply_projection(&doc, &json!({"a": 1, "b": 0})).is_err());
    }
}
