//! Closed grammar for free-form query expressions
//!
//! Expressions take the shape `db['collection'].operation(args...)` or
//! `db.collection.operation(args...)`, with arguments written as
//! literals. Only the read-only operations below parse; there is no
//! general evaluator behind this surface, so an expression that slips
//! past the textual sandbox still cannot reach anything but these
//! operations.

use serde_json::Value;
use thiserror::Error;

use crate::literal::{self, LiteralError};

/// Errors from parsing a free-form expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// Expression does not start with the store handle
    #[error("expression must start with 'db'")]
    MissingHandle,

    /// Collection selector could not be read
    #[error("malformed collection selector")]
    BadCollection,

    /// Operation is not part of the read-only grammar
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Argument list did not parse as literals
    #[error("malformed arguments: {0}")]
    BadArguments(#[from] LiteralError),

    /// Wrong number or type of arguments for an operation
    #[error("bad arguments for {operation}: {detail}")]
    BadArity {
        /// The operation being called
        operation: &'static str,
        /// What was wrong
        detail: String,
    },

    /// Anything else structurally wrong with the expression
    #[error("malformed expression: {0}")]
    Malformed(String),
}

/// A parsed read-only operation
#[derive(Debug, Clone, PartialEq)]
pub enum GeneralOp {
    /// `find(filter[, projection])`
    Find {
        filter: Value,
        projection: Option<Value>,
    },
    /// `find_one([filter])`
    FindOne { filter: Value },
    /// `count_documents([filter])`
    CountDocuments { filter: Value },
    /// `estimated_document_count()`
    EstimatedDocumentCount,
    /// `distinct(field[, filter])`
    Distinct { field: String, filter: Value },
    /// `aggregate(pipeline)`
    Aggregate { pipeline: Vec<Value> },
    /// `index_information()`
    IndexInformation,
}

/// A fully parsed expression: target collection plus operation
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralCall {
    /// Collection the operation runs against
    pub collection: String,
    /// The operation and its arguments
    pub op: GeneralOp,
}

/// Parse an expression into a call, or fail
pub fn parse_call(text: &str) -> Result<GeneralCall, ExpressionError> {
    let mut rest = text.trim();
    if let Some(stripped) = rest.strip_suffix(';') {
        rest = stripped.trim_end();
    }

    rest = rest
        .strip_prefix("db")
        .ok_or(ExpressionError::MissingHandle)?;

    let (collection, rest) = parse_collection(rest)?;

    let rest = rest
        .strip_prefix('.')
        .ok_or_else(|| ExpressionError::Malformed("expected '.' before operation".to_string()))?;

    let open = rest
        .find('(')
        .ok_or_else(|| ExpressionError::Malformed("expected an operation call".to_string()))?;
    let method = rest[..open].trim();
    let after = &rest[open + 1..];
    let close = after
        .rfind(')')
        .ok_or_else(|| ExpressionError::Malformed("unterminated argument list".to_string()))?;
    if !after[close + 1..].trim().is_empty() {
        return Err(ExpressionError::Malformed(
            "trailing characters after call".to_string(),
        ));
    }
    let args = literal::parse_literal_list(&after[..close])?;

    let op = build_op(method, args)?;
    Ok(GeneralCall { collection, op })
}

fn parse_collection(rest: &str) -> Result<(String, &str), ExpressionError> {
    if let Some(inner) = rest.strip_prefix('[') {
        let close = inner.find(']').ok_or(ExpressionError::BadCollection)?;
        let quoted = inner[..close].trim();
        let name = quoted
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .or_else(|| quoted.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
            .ok_or(ExpressionError::BadCollection)?;
        if name.is_empty() {
            return Err(ExpressionError::BadCollection);
        }
        Ok((name.to_string(), &inner[close + 1..]))
    } else if let Some(inner) = rest.strip_prefix('.') {
        let end = inner
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(inner.len());
        if end == 0 {
            return Err(ExpressionError::BadCollection);
        }
        Ok((inner[..end].to_string(), &inner[end..]))
    } else {
        Err(ExpressionError::BadCollection)
    }
}

fn build_op(method: &str, mut args: Vec<Value>) -> Result<GeneralOp, ExpressionError> {
    fn object_arg(
        args: &mut Vec<Value>,
        operation: &'static str,
    ) -> Result<Value, ExpressionError> {
        if args.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        let value = args.remove(0);
        if value.is_object() {
            Ok(value)
        } else {
            Err(ExpressionError::BadArity {
                operation,
                detail: "expected a mapping".to_string(),
            })
        }
    }

    match method {
        "find" => {
            if args.len() > 2 {
                return Err(ExpressionError::BadArity {
                    operation: "find",
                    detail: format!("expected at most 2 arguments, got {}", args.len()),
                });
            }
            let filter = object_arg(&mut args, "find")?;
            let projection = if args.is_empty() {
                None
            } else {
                Some(object_arg(&mut args, "find")?)
            };
            Ok(GeneralOp::Find { filter, projection })
        }
        "find_one" => {
            if args.len() > 1 {
                return Err(ExpressionError::BadArity {
                    operation: "find_one",
                    detail: format!("expected at most 1 argument, got {}", args.len()),
                });
            }
            Ok(GeneralOp::FindOne {
                filter: object_arg(&mut args, "find_one")?,
            })
        }
        "count_documents" => {
            if args.len() > 1 {
                return Err(ExpressionError::BadArity {
                    operation: "count_documents",
                    detail: format!("expected at most 1 argument, got {}", args.len()),
                });
            }
            Ok(GeneralOp::CountDocuments {
                filter: object_arg(&mut args, "count_documents")?,
            })
        }
        "estimated_document_count" => {
            if !args.is_empty() {
                return Err(ExpressionError::BadArity {
                    operation: "estimated_document_count",
                    detail: "expected no arguments".to_string(),
                });
            }
            Ok(GeneralOp::EstimatedDocumentCount)
        }
        "distinct" => {
            if args.is_empty() || args.len() > 2 {
                return Err(ExpressionError::BadArity {
                    operation: "distinct",
                    detail: format!("expected 1 or 2 arguments, got {}", args.len()),
                });
            }
            let field = match args.remove(0) {
                Value::String(s) => s,
                other => {
                    return Err(ExpressionError::BadArity {
                        operation: "distinct",
                        detail: format!("field name must be a string, got {}", other),
                    })
                }
            };
            Ok(GeneralOp::Distinct {
                field,
                filter: object_arg(&mut args, "distinct")?,
            })
        }
        "aggregate" => {
            if args.len() != 1 {
                return Err(ExpressionError::BadArity {
                    operation: "aggregate",
                    detail: format!("expected exactly 1 argument, got {}", args.len()),
                });
            }
            match args.remove(0) {
                Value::Array(pipeline) => Ok(GeneralOp::Aggregate { pipeline }),
                other => Err(ExpressionError::BadArity {
                    operation: "aggregate",
                    detail: format!("pipeline must be a sequence, got {}", other),
                }),
            }
        }
        "index_information" => {
            if !args.is_empty() {
                return Err(ExpressionError::BadArity {
                    operation: "index_information",
                    detail: "expected no arguments".to_string(),
                });
            }
            Ok(GeneralOp::IndexInformation)
        }
        other => Err(ExpressionError::UnsupportedOperation(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscript_find() {
        let call = parse_call("db['sources'].find({'mag': {'$lt': 17.5}})").unwrap();
        assert_eq!(call.collection, "sources");
        assert_eq!(
            call.op,
            GeneralOp::Find {
                filter: json!({"mag": {"$lt": 17.5}}),
                projection: None
            }
        );
    }

    #[test]
    fn test_dotted_find_with_projection() {
        let call = parse_call("db.sources.find({}, {'_id': 1})").unwrap();
        assert_eq!(call.collection, "sources");
        assert_eq!(
            call.op,
            GeneralOp::Find {
                filter: json!({}),
                projection: Some(json!({"_id": 1}))
            }
        );
    }

    #[test]
    fn test_count_and_estimated() {
        let call = parse_call("db['sources'].count_documents({'p': True})").unwrap();
        assert_eq!(
            call.op,
            GeneralOp::CountDocuments {
                filter: json!({"p": true})
            }
        );
        let call = parse_call("db['sources'].estimated_document_count()").unwrap();
        assert_eq!(call.op, GeneralOp::EstimatedDocumentCount);
    }

    #[test]
    fn test_distinct() {
        let call = parse_call("db['sources'].distinct('filter', {'mag': 1})").unwrap();
        assert_eq!(
            call.op,
            GeneralOp::Distinct {
                field: "filter".to_string(),
                filter: json!({"mag": 1})
            }
        );
    }

    #[test]
    fn test_aggregate_pipeline() {
        let call = parse_call("db['sources'].aggregate([{'$match': {'x': 1}}, {'$limit': 5}])")
            .unwrap();
        assert_eq!(
            call.op,
            GeneralOp::Aggregate {
                pipeline: vec![json!({"$match": {"x": 1}}), json!({"$limit": 5})]
            }
        );
    }

    #[test]
    fn test_mutating_operations_never_parse() {
        for text in [
            "db['sources'].insert_one({})",
            "db['sources'].update_many({}, {})",
            "db['sources'].drop()",
            "db['sources'].create_index('x')",
        ] {
            assert!(matches!(
                parse_call(text),
                Err(ExpressionError::UnsupportedOperation(_))
            ));
        }
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(matches!(
            parse_call("sources.find({})"),
            Err(ExpressionError::MissingHandle)
        ));
        assert!(matches!(
            parse_call("db[sources].find({})"),
            Err(ExpressionError::BadCollection)
        ));
        // chained cursor calls are outside the grammar
        assert!(parse_call("db['sources'].find({}).limit(5)").is_err());
        assert!(matches!(
            parse_call("db['sources'].find"),
            Err(ExpressionError::Malformed(_))
        ));
    }

    #[test]
    fn test_arity_checks() {
        assert!(matches!(
            parse_call("db['sources'].aggregate({'$match': {}})"),
            Err(ExpressionError::BadArity { .. })
        ));
        assert!(matches!(
            parse_call("db['sources'].distinct()"),
            Err(ExpressionError::BadArity { .. })
        ));
        assert!(matches!(
            parse_call("db['sources'].find(1)"),
            Err(ExpressionError::BadArity { .. })
        ));
    }

    #[test]
    fn test_trailing_semicolon_tolerated() {
        assert!(parse_call("db['sources'].find({});").is_ok());
    }
}
