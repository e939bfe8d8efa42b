//! # Access Policy
//!
//! Decides, per user and per requested collection or pipeline stage,
//! whether an operation is permitted. Admin users bypass every check in
//! this module (and the sandbox screen; both gates hang off the same
//! admin flag). The decision is binary: on rejection the normalizer
//! fails the whole query, never executing part of it.

pub mod sandbox;

use regex::Regex;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::literal;

pub use sandbox::Sandbox;

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    /// Whether the operation may proceed
    pub allowed: bool,
    /// Internal reason for a denial; logged, never shown to the caller
    pub reason: Option<String>,
}

impl AccessDecision {
    /// Permit the operation
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Deny the operation with an internal reason
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Per-user collection and pipeline screening
pub struct AccessPolicy {
    prohibited: Vec<String>,
    subscript_collection: Regex,
    dotted_collection: Regex,
    embedded_pipeline: Regex,
}

impl AccessPolicy {
    /// Build a policy from engine configuration
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            prohibited: config.prohibited_collections.clone(),
            // db['sources'] / db["sources"]
            subscript_collection: Regex::new(r#"db\[['"]([^'"]+)['"]\]"#)
                .expect("collection pattern is valid"),
            // db.sources.
            dotted_collection: Regex::new(r"db\.([A-Za-z0-9_]+)")
                .expect("collection pattern is valid"),
            // the bracketed pipeline inside .aggregate([...])
            embedded_pipeline: Regex::new(r"(?s)aggregate\((\[.*\])")
                .expect("pipeline pattern is valid"),
        }
    }

    fn is_prohibited(&self, collection: &str) -> bool {
        self.prohibited.iter().any(|c| c == collection)
    }

    /// Check direct access to a named catalog
    pub fn check_catalog(&self, is_admin: bool, catalog: &str) -> AccessDecision {
        if is_admin {
            return AccessDecision::allow();
        }
        if self.is_prohibited(catalog) {
            return AccessDecision::deny(format!("prohibited collection: {}", catalog));
        }
        AccessDecision::allow()
    }

    /// Check every cross-collection join in an aggregation pipeline
    pub fn check_pipeline(&self, is_admin: bool, pipeline: &[Value]) -> AccessDecision {
        if is_admin {
            return AccessDecision::allow();
        }
        for stage in pipeline {
            let Some(join) = stage.get("$lookup") else {
                continue;
            };
            match join.get("from").and_then(Value::as_str) {
                Some(target) if self.is_prohibited(target) => {
                    return AccessDecision::deny(format!("prohibited join target: {}", target));
                }
                Some(_) => {}
                None => {
                    return AccessDecision::deny("join stage without a 'from' collection");
                }
            }
        }
        AccessDecision::allow()
    }

    /// Check a free-form expression: the main collection is pattern-matched
    /// out of the text, and any embedded aggregation pipeline has its join
    /// targets inspected.
    pub fn check_expression(&self, is_admin: bool, text: &str) -> AccessDecision {
        if is_admin {
            return AccessDecision::allow();
        }

        let collection = self
            .subscript_collection
            .captures(text)
            .or_else(|| self.dotted_collection.captures(text))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let Some(collection) = collection else {
            return AccessDecision::deny("no collection found in expression");
        };
        if self.is_prohibited(&collection) {
            return AccessDecision::deny(format!("prohibited collection: {}", collection));
        }

        if text.contains(".aggregate(") {
            let Some(raw) = self
                .embedded_pipeline
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
            else {
                return AccessDecision::deny("aggregate call without an inspectable pipeline");
            };
            let Ok(Value::Array(pipeline)) = literal::parse_literal(raw) else {
                return AccessDecision::deny("aggregate pipeline could not be parsed");
            };
            return self.check_pipeline(false, &pipeline);
        }

        AccessDecision::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy() -> AccessPolicy {
        AccessPolicy::new(&EngineConfig::default())
    }

    #[test]
    fn test_admin_bypasses_catalog_check() {
        assert!(policy().check_catalog(true, "users").allowed);
    }

    #[test]
    fn test_prohibited_catalog_denied() {
        let decision = policy().check_catalog(false, "users");
        assert!(!decision.allowed);
        assert!(decision.reason.is_some());
        assert!(policy().check_catalog(false, "sources").allowed);
    }

    #[test]
    fn test_pipeline_join_targets_inspected() {
        let ok = vec![
            json!({"$match": {"x": 1}}),
            json!({"$lookup": {"from": "sources", "localField": "a", "foreignField": "b", "as": "joined"}}),
        ];
        assert!(policy().check_pipeline(false, &ok).allowed);

        let bad = vec![json!({"$lookup": {"from": "users", "localField": "a", "foreignField": "b", "as": "joined"}})];
        assert!(!policy().check_pipeline(false, &bad).allowed);
        assert!(policy().check_pipeline(true, &bad).allowed);
    }

    #[test]
    fn test_expression_collection_extraction() {
        let p = policy();
        assert!(p.check_expression(false, "db['sources'].find({})").allowed);
        assert!(p.check_expression(false, "db.sources.find({})").allowed);
        assert!(!p.check_expression(false, "db['users'].find({})").allowed);
        assert!(!p.check_expression(false, "db.users.find({})").allowed);
        assert!(!p.check_expression(false, "find({})").allowed);
    }

    #[test]
    fn test_expression_embedded_pipeline() {
        let p = policy();
        let bad = "db['sources'].aggregate([{'$lookup': {'from': 'users', 'localField': 'a', 'foreignField': 'b', 'as': 'j'}}])";
        assert!(!p.check_expression(false, bad).allowed);
        let ok = "db['sources'].aggregate([{'$match': {'x': 1}}])";
        assert!(p.check_expression(false, ok).allowed);
        // admin text passes through unchecked
        assert!(p.check_expression(true, bad).allowed);
    }

    #[test]
    fn test_custom_prohibited_set() {
        let config = EngineConfig {
            prohibited_collections: vec!["secret".to_string()],
            ..Default::default()
        };
        let p = AccessPolicy::new(&config);
        assert!(!p.check_catalog(false, "secret").allowed);
        assert!(p.check_catalog(false, "users").allowed);
    }
}
