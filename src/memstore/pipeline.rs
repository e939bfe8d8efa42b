//! Aggregation pipeline evaluation
//!
//! The subset the portal actually issues: `$match`, `$project`,
//! `$sort`, `$skip`, `$limit`, `$count` and equality-join `$lookup`.
//! Anything else is an unsupported-stage error.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::executor::errors::{StoreError, StoreResult};

use super::filter::{lookup_path, DocumentFilter};
use super::{apply_projection, sort_documents};

/// Run a pipeline over a starting document set. `collections` is
/// consulted for `$lookup` joins.
pub fn execute(
    mut docs: Vec<Value>,
    pipeline: &[Value],
    collections: &BTreeMap<String, Vec<Value>>,
) -> StoreResult<Vec<Value>> {
    for stage in pipeline {
        let stage = stage.as_object().ok_or_else(|| StoreError::Malformed {
            what: "pipeline",
            detail: format!("stage must be a mapping, got {}", stage),
        })?;
        if stage.len() != 1 {
            return Err(StoreError::Malformed {
                what: "pipeline",
                detail: format!("stage must have exactly one operator, got {}", stage.len()),
            });
        }
        let (name, spec) = stage.iter().next().expect("stage has one entry");

        docs = match name.as_str() {
            "$match" => {
                let mut kept = Vec::new();
                for doc in docs {
                    if DocumentFilter::matches(&doc, spec)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$project" => docs
                .into_iter()
                .map(|doc| apply_projection(&doc, spec))
                .collect::<StoreResult<Vec<Value>>>()?,
            "$sort" => {
                let mut sorted = docs;
                sort_documents(&mut sorted, spec)?;
                sorted
            }
            "$skip" => {
                let n = stage_usize(spec, "$skip")?;
                docs.into_iter().skip(n).collect()
            }
            "$limit" => {
                let n = stage_usize(spec, "$limit")?;
                docs.into_iter().take(n).collect()
            }
            "$count" => {
                let field = spec.as_str().ok_or_else(|| StoreError::Malformed {
                    what: "pipeline",
                    detail: "$count expects a field name".to_string(),
                })?;
                let mut out = Map::new();
                out.insert(field.to_string(), json!(docs.len()));
                vec![Value::Object(out)]
            }
            "$lookup" => lookup_join(docs, spec, collections)?,
            other => return Err(StoreError::UnsupportedStage(other.to_string())),
        };
    }
    Ok(docs)
}

fn stage_usize(spec: &Value, stage: &'static str) -> StoreResult<usize> {
    spec.as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| StoreError::Malformed {
            what: "pipeline",
            detail: format!("{} expects a non-negative integer", stage),
        })
}

/// Equality join: for each document, collect foreign documents whose
/// `foreignField` equals the document's `localField` value
fn lookup_join(
    docs: Vec<Value>,
    spec: &Value,
    collections: &BTreeMap<String, Vec<Value>>,
) -> StoreResult<Vec<Value>> {
    let field = |key: &str| -> StoreResult<&str> {
        spec.get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Malformed {
                what: "pipeline",
                detail: format!("$lookup requires a '{}' string", key),
            })
    };
    let from = field("from")?;
    let local_field = field("localField")?;
    let foreign_field = field("foreignField")?;
    let as_field = field("as")?;

    let foreign: &[Value] = collections.get(from).map(Vec::as_slice).unwrap_or(&[]);

    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        let local = lookup_path(&doc, local_field).cloned().unwrap_or(Value::Null);
        let joined: Vec<Value> = foreign
            .iter()
            .filter(|f| lookup_path(f, foreign_field).cloned().unwrap_or(Value::Null) == local)
            .cloned()
            .collect();
        let mut doc = match doc {
            Value::Object(m) => m,
            other => {
                return Err(StoreError::Malformed {
                    what: "pipeline",
                    detail: format!("$lookup source document is not a mapping: {}", other),
                })
            }
        };
        doc.insert(as_field.to_string(), Value::Array(joined));
        out.push(Value::Object(doc));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collections() -> BTreeMap<String, Vec<Value>> {
        let mut map = BTreeMap::new();
        map.insert(
            "sources".to_string(),
            vec![
                json!({"_id": "a", "mag": 17, "program": 1}),
                json!({"_id": "b", "mag": 18, "program": 1}),
                json!({"_id": "c", "mag": 16, "program": 2}),
            ],
        );
        map.insert(
            "programs".to_string(),
            vec![
                json!({"_id": 1, "name": "survey"}),
                json!({"_id": 2, "name": "followup"}),
            ],
        );
        map
    }

    #[test]
    fn test_match_sort_limit() {
        let cols = collections();
        let result = execute(
            cols["sources"].clone(),
            &[
                json!({"$match": {"mag": {"$lt": 18}}}),
                json!({"$sort": {"mag": 1}}),
                json!({"$limit": 1}),
            ],
            &cols,
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["_id"], "c");
    }

    #[test]
    fn test_count() {
        let cols = collections();
        let result = execute(
            cols["sources"].clone(),
            &[json!({"$match": {"program": 1}}), json!({"$count": "n"})],
            &cols,
        )
        .unwrap();
        assert_eq!(result, vec![json!({"n": 2})]);
    }

    #[test]
    fn test_lookup_join() {
        let cols = collections();
        let result = execute(
            cols["sources"].clone(),
            &[json!({"$lookup": {
                "from": "programs",
                "localField": "program",
                "foreignField": "_id",
                "as": "program_doc"
            }})],
            &cols,
        )
        .unwrap();
        assert_eq!(result[0]["program_doc"][0]["name"], "survey");
        assert_eq!(result[2]["program_doc"][0]["name"], "followup");
    }

    #[test]
    fn test_unsupported_stage() {
        let cols = collections();
        assert!(matches!(
            execute(vec![], &[json!({"$facet": {}})], &cols),
            Err(StoreError::UnsupportedStage(_))
        ));
    }

    #[test]
    fn test_skip() {
        let cols = collections();
        let result = execute(
            cols["sources"].clone(),
            &[json!({"$sort": {"mag": 1}}), json!({"$skip": 2})],
            &cols,
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["_id"], "b");
    }
}
