//! Bookkeeping store errors

use thiserror::Error;

/// Result type for bookkeeping operations
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors from the bookkeeping store
#[derive(Debug, Error)]
pub enum TaskError {
    /// Durable-storage I/O fault
    #[error("bookkeeping I/O fault: {0}")]
    Io(#[from] std::io::Error),

    /// Record or blob payload could not be (de)serialized
    #[error("bookkeeping serialization fault: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No record with the given task id
    #[error("no task record: {0}")]
    RecordNotFound(String),
}
