//! Document filter matching
//!
//! Evaluates document-style filters against JSON documents: implicit
//! equality, comparison and membership operators, `$and`/`$or`
//! composition, dotted field paths, and the `$geoWithin`/`$centerSphere`
//! predicate evaluated with the great-circle distance. No type
//! coercion: a string never matches a number.

use std::cmp::Ordering;

use serde_json::Value;

use crate::coord::great_circle_distance;
use crate::executor::errors::{StoreError, StoreResult};

/// Evaluates filters against documents
pub struct DocumentFilter;

impl DocumentFilter {
    /// Check whether a document matches a filter. The empty filter
    /// matches everything.
    pub fn matches(document: &Value, filter: &Value) -> StoreResult<bool> {
        let clauses = filter.as_object().ok_or_else(|| StoreError::Malformed {
            what: "filter",
            detail: format!("filter must be a mapping, got {}", filter),
        })?;

        for (key, condition) in clauses {
            let hit = match key.as_str() {
                "$and" => Self::match_all(document, condition)?,
                "$or" => Self::match_any(document, condition)?,
                _ if key.starts_with('$') => {
                    return Err(StoreError::UnsupportedOperator(key.clone()))
                }
                field => Self::match_field(document, field, condition)?,
            };
            if !hit {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn match_all(document: &Value, filters: &Value) -> StoreResult<bool> {
        let filters = filters.as_array().ok_or_else(|| StoreError::Malformed {
            what: "filter",
            detail: "$and expects a sequence of filters".to_string(),
        })?;
        for f in filters {
            if !Self::matches(document, f)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn match_any(document: &Value, filters: &Value) -> StoreResult<bool> {
        let filters = filters.as_array().ok_or_else(|| StoreError::Malformed {
            what: "filter",
            detail: "$or expects a sequence of filters".to_string(),
        })?;
        for f in filters {
            if Self::matches(document, f)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn match_field(document: &Value, field: &str, condition: &Value) -> StoreResult<bool> {
        let value = lookup_path(document, field);

        // an object whose keys all start with '$' is an operator set;
        // anything else is an implicit equality match
        let operators = condition
            .as_object()
            .filter(|m| !m.is_empty() && m.keys().all(|k| k.starts_with('$')));

        let Some(operators) = operators else {
            return Ok(match value {
                Some(v) => v == condition,
                None => condition.is_null(),
            });
        };

        for (op, operand) in operators {
            let hit = match op.as_str() {
                "$eq" => value.map(|v| v == operand).unwrap_or(operand.is_null()),
                "$ne" => !value.map(|v| v == operand).unwrap_or(operand.is_null()),
                "$gt" => compare(value, operand).map(|o| o == Ordering::Greater).unwrap_or(false),
                "$gte" => compare(value, operand).map(|o| o != Ordering::Less).unwrap_or(false),
                "$lt" => compare(value, operand).map(|o| o == Ordering::Less).unwrap_or(false),
                "$lte" => compare(value, operand).map(|o| o != Ordering::Greater).unwrap_or(false),
                "$in" => membership(value, operand, "$in")?,
                "$nin" => !membership(value, operand, "$nin")?,
                "$exists" => {
                    let wanted = operand.as_bool().unwrap_or(true);
                    value.is_some() == wanted
                }
                "$geoWithin" => geo_within(value, operand)?,
                other => return Err(StoreError::UnsupportedOperator(other.to_string())),
            };
            if !hit {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Resolve a possibly dotted field path inside a document
pub fn lookup_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = document;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Strict comparison: numbers with numbers, strings with strings
fn compare(value: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (value?, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn membership(value: Option<&Value>, operand: &Value, op: &'static str) -> StoreResult<bool> {
    let candidates = operand.as_array().ok_or_else(|| StoreError::Malformed {
        what: "filter",
        detail: format!("{} expects a sequence", op),
    })?;
    Ok(match value {
        Some(v) => candidates.contains(v),
        None => candidates.contains(&Value::Null),
    })
}

/// Evaluate `$geoWithin: {"$centerSphere": [[lon, lat], radius]}`,
/// everything in radians. The document field may hold a bare
/// `[lon, lat]` pair or a GeoJSON-style point object.
fn geo_within(value: Option<&Value>, operand: &Value) -> StoreResult<bool> {
    let sphere = operand
        .get("$centerSphere")
        .ok_or(StoreError::UnsupportedOperator("$geoWithin".to_string()))?;
    let parts = sphere.as_array().filter(|a| a.len() == 2).ok_or_else(|| {
        StoreError::Malformed {
            what: "filter",
            detail: "$centerSphere expects [[lon, lat], radius]".to_string(),
        }
    })?;
    let center = point_coordinates(&parts[0]).ok_or_else(|| StoreError::Malformed {
        what: "filter",
        detail: format!("bad $centerSphere center: {}", parts[0]),
    })?;
    let radius = parts[1].as_f64().ok_or_else(|| StoreError::Malformed {
        what: "filter",
        detail: format!("bad $centerSphere radius: {}", parts[1]),
    })?;

    let Some(value) = value else {
        return Ok(false);
    };
    let Some((lon, lat)) = point_coordinates(value) else {
        return Ok(false);
    };
    Ok(great_circle_distance(lat, lon, center.1, center.0) <= radius)
}

/// Extract a `(lon, lat)` pair from `[lon, lat]` or
/// `{"type": "Point", "coordinates": [lon, lat]}`
fn point_coordinates(value: &Value) -> Option<(f64, f64)> {
    let pair = match value {
        Value::Array(_) => value,
        Value::Object(m) => m.get("coordinates")?,
        _ => return None,
    };
    let items = pair.as_array()?;
    if items.len() != 2 {
        return None;
    }
    Some((items[0].as_f64()?, items[1].as_f64()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_implicit_equality() {
        let doc = json!({"name": "V404 Cyg", "mag": 17});
        assert!(DocumentFilter::matches(&doc, &json!({"name": "V404 Cyg"})).unwrap());
        assert!(!DocumentFilter::matches(&doc, &json!({"name": "other"})).unwrap());
        // no coercion
        assert!(!DocumentFilter::matches(&doc, &json!({"mag": "17"})).unwrap());
    }

    #[test]
    fn test_comparison_operators() {
        let doc = json!({"mag": 17.2});
        assert!(DocumentFilter::matches(&doc, &json!({"mag": {"$lt": 18}})).unwrap());
        assert!(DocumentFilter::matches(&doc, &json!({"mag": {"$gte": 17.2}})).unwrap());
        assert!(!DocumentFilter::matches(&doc, &json!({"mag": {"$gt": 17.2}})).unwrap());
        assert!(
            DocumentFilter::matches(&doc, &json!({"mag": {"$gt": 17, "$lt": 18}})).unwrap()
        );
    }

    #[test]
    fn test_membership() {
        let doc = json!({"filter": "zr"});
        assert!(DocumentFilter::matches(&doc, &json!({"filter": {"$in": ["zg", "zr"]}})).unwrap());
        assert!(
            !DocumentFilter::matches(&doc, &json!({"filter": {"$nin": ["zg", "zr"]}})).unwrap()
        );
    }

    #[test]
    fn test_exists_and_missing_fields() {
        let doc = json!({"a": 1});
        assert!(DocumentFilter::matches(&doc, &json!({"a": {"$exists": true}})).unwrap());
        assert!(DocumentFilter::matches(&doc, &json!({"b": {"$exists": false}})).unwrap());
        assert!(!DocumentFilter::matches(&doc, &json!({"b": {"$gt": 1}})).unwrap());
        assert!(DocumentFilter::matches(&doc, &json!({"b": {"$ne": 1}})).unwrap());
    }

    #[test]
    fn test_dotted_paths() {
        let doc = json!({"coordinates": {"radec_geojson": [0.1, 0.2]}});
        assert!(DocumentFilter::matches(
            &doc,
            &json!({"coordinates.radec_geojson": {"$exists": true}})
        )
        .unwrap());
    }

    #[test]
    fn test_and_or() {
        let doc = json!({"a": 1, "b": 2});
        assert!(DocumentFilter::matches(
            &doc,
            &json!({"$and": [{"a": 1}, {"b": 2}]})
        )
        .unwrap());
        assert!(DocumentFilter::matches(
            &doc,
            &json!({"$or": [{"a": 99}, {"b": 2}]})
        )
        .unwrap());
        assert!(!DocumentFilter::matches(
            &doc,
            &json!({"$or": [{"a": 99}, {"b": 99}]})
        )
        .unwrap());
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let doc = json!({"a": 1});
        assert!(matches!(
            DocumentFilter::matches(&doc, &json!({"a": {"$where": "1"}})),
            Err(StoreError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            DocumentFilter::matches(&doc, &json!({"$nor": []})),
            Err(StoreError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_geo_within() {
        let deg = std::f64::consts::PI / 180.0;
        let doc = json!({"coordinates": {"radec_geojson": {
            "type": "Point",
            "coordinates": [10.5 * deg, 20.3 * deg]
        }}});
        let close = json!({"coordinates.radec_geojson": {
            "$geoWithin": {"$centerSphere": [[10.5 * deg, 20.31 * deg], 0.02 * deg]}
        }});
        let far = json!({"coordinates.radec_geojson": {
            "$geoWithin": {"$centerSphere": [[50.0 * deg, 20.3 * deg], 0.02 * deg]}
        }});
        assert!(DocumentFilter::matches(&doc, &close).unwrap());
        assert!(!DocumentFilter::matches(&doc, &far).unwrap());
    }
}
