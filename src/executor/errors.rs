//! Store-facing error types

use thiserror::Error;

/// Result type for document store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a document store implementation
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The named collection does not exist
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// Filter used an operator the store does not implement
    #[error("unsupported filter operator: {0}")]
    UnsupportedOperator(String),

    /// Pipeline used a stage the store does not implement
    #[error("unsupported pipeline stage: {0}")]
    UnsupportedStage(String),

    /// A filter, projection or pipeline was structurally invalid
    #[error("malformed {what}: {detail}")]
    Malformed {
        /// What was malformed (filter, projection, pipeline, ...)
        what: &'static str,
        /// Detail message
        detail: String,
    },

    /// The operation ran past its execution deadline
    #[error("operation exceeded time limit of {0} ms")]
    TimeLimitExceeded(u64),

    /// Any other store-reported fault
    #[error("store fault: {0}")]
    Backend(String),
}
