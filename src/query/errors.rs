//! Query engine errors
//!
//! The three-way taxonomy every caller sees: validation errors
//! (malformed or unsupported input, always surfaced), permission errors
//! (rendered without detail on which rule fired), and execution errors
//! (store faults, timeouts, durable-storage I/O).

use thiserror::Error;

use crate::coord::CoordError;
use crate::executor::errors::StoreError;
use crate::literal::LiteralError;
use crate::tasks::errors::TaskError;

/// Result type for engine operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors surfaced by the query engine
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed or unsupported query shape, bad unit, bad coordinate,
    /// bad deadline
    #[error("validation error: {0}")]
    Validation(String),

    /// Prohibited collection or join, or sandbox rejection. Deliberately
    /// carries no detail on which rule fired.
    #[error("query not permitted")]
    Permission,

    /// Store timeout, store-reported fault, or durable-storage I/O fault
    #[error("execution error: {0}")]
    Execution(String),

    /// No bookkeeping record with the given task id
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// Bookkeeping requested but the engine has no task store
    #[error("bookkeeping is not configured")]
    BookkeepingUnavailable,
}

impl QueryError {
    /// Build a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        QueryError::Validation(msg.into())
    }

    /// Build an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        QueryError::Execution(msg.into())
    }

    /// Stable code for API responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Validation(_) => "VALIDATION_ERROR",
            QueryError::Permission => "NOT_PERMITTED",
            QueryError::Execution(_) => "EXECUTION_ERROR",
            QueryError::TaskNotFound(_) => "TASK_NOT_FOUND",
            QueryError::BookkeepingUnavailable => "BOOKKEEPING_UNAVAILABLE",
        }
    }
}

impl From<CoordError> for QueryError {
    fn from(err: CoordError) -> Self {
        QueryError::Validation(err.to_string())
    }
}

impl From<LiteralError> for QueryError {
    fn from(err: LiteralError) -> Self {
        QueryError::Validation(format!("malformed literal: {}", err))
    }
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        QueryError::Execution(err.to_string())
    }
}

impl From<TaskError> for QueryError {
    fn from(err: TaskError) -> Self {
        QueryError::Execution(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_message_is_generic() {
        let err = QueryError::Permission;
        assert_eq!(err.to_string(), "query not permitted");
    }

    #[test]
    fn test_coord_error_maps_to_validation() {
        let err: QueryError = CoordError::UnknownUnit("parsec".to_string()).into();
        assert!(matches!(err, QueryError::Validation(_)));
    }
}
