//! Per-type execution option allow-lists
//!
//! Only the keys listed here are ever forwarded to a store call; every
//! other kwarg is silently dropped. Each option set also carries the
//! validated deadline and the requesting user's identity as a comment
//! tag for audit correlation.

use serde_json::{Map, Value};

/// Options forwarded to find-shaped calls (`find`, `find_one`,
/// `cone_search`): skip, hint, limit, sort
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Store-side execution deadline in milliseconds
    pub max_time_ms: u64,
    /// Requesting user, attached for audit/log correlation
    pub comment: String,
    /// Documents to skip
    pub skip: Option<u64>,
    /// Index hint
    pub hint: Option<Value>,
    /// Maximum documents to return
    pub limit: Option<u64>,
    /// Sort specification
    pub sort: Option<Value>,
}

impl FindOptions {
    /// Extract the allow-listed subset of kwargs
    pub fn from_kwargs(kwargs: &Map<String, Value>, max_time_ms: u64, user: &str) -> Self {
        Self {
            max_time_ms,
            comment: user.to_string(),
            skip: kwargs.get("skip").and_then(Value::as_u64),
            hint: kwargs.get("hint").cloned(),
            limit: kwargs.get("limit").and_then(Value::as_u64),
            sort: kwargs.get("sort").cloned(),
        }
    }
}

/// Options forwarded to `count_documents`: skip, hint
#[derive(Debug, Clone, Default)]
pub struct CountOptions {
    /// Store-side execution deadline in milliseconds
    pub max_time_ms: u64,
    /// Requesting user, attached for audit/log correlation
    pub comment: String,
    /// Documents to skip before counting
    pub skip: Option<u64>,
    /// Index hint
    pub hint: Option<Value>,
}

impl CountOptions {
    /// Extract the allow-listed subset of kwargs
    pub fn from_kwargs(kwargs: &Map<String, Value>, max_time_ms: u64, user: &str) -> Self {
        Self {
            max_time_ms,
            comment: user.to_string(),
            skip: kwargs.get("skip").and_then(Value::as_u64),
            hint: kwargs.get("hint").cloned(),
        }
    }
}

/// Options forwarded to `aggregate`: allowDiskUse, batchSize
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Store-side execution deadline in milliseconds
    pub max_time_ms: u64,
    /// Requesting user, attached for audit/log correlation
    pub comment: String,
    /// Whether stages may spill to disk; on unless the caller says otherwise
    pub allow_disk_use: bool,
    /// Result batch size
    pub batch_size: Option<u64>,
}

impl AggregateOptions {
    /// Extract the allow-listed subset of kwargs
    pub fn from_kwargs(kwargs: &Map<String, Value>, max_time_ms: u64, user: &str) -> Self {
        Self {
            max_time_ms,
            comment: user.to_string(),
            allow_disk_use: kwargs
                .get("allowDiskUse")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            batch_size: kwargs.get("batchSize").and_then(Value::as_u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kwargs(raw: Value) -> Map<String, Value> {
        raw.as_object().unwrap().clone()
    }

    #[test]
    fn test_find_options_allow_list() {
        let opts = FindOptions::from_kwargs(
            &kwargs(json!({
                "skip": 5,
                "limit": 10,
                "sort": {"mag": -1},
                "bogus": "dropped",
                "allowDiskUse": true
            })),
            2000,
            "alice",
        );
        assert_eq!(opts.skip, Some(5));
        assert_eq!(opts.limit, Some(10));
        assert_eq!(opts.sort, Some(json!({"mag": -1})));
        assert_eq!(opts.max_time_ms, 2000);
        assert_eq!(opts.comment, "alice");
    }

    #[test]
    fn test_count_options_allow_list() {
        let opts = CountOptions::from_kwargs(
            &kwargs(json!({"skip": 3, "limit": 10, "sort": {"x": 1}})),
            1000,
            "bob",
        );
        assert_eq!(opts.skip, Some(3));
        // limit and sort are not in the count allow-list
        assert!(opts.hint.is_none());
    }

    #[test]
    fn test_aggregate_options_defaults() {
        let opts = AggregateOptions::from_kwargs(&Map::new(), 500, "carol");
        assert!(opts.allow_disk_use);
        assert!(opts.batch_size.is_none());

        let opts = AggregateOptions::from_kwargs(
            &kwargs(json!({"allowDiskUse": false, "batchSize": 100})),
            500,
            "carol",
        );
        assert!(!opts.allow_disk_use);
        assert_eq!(opts.batch_size, Some(100));
    }
}
