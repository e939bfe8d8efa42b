//! # Bookkeeping
//!
//! Durable task records for deferred query execution. Each submitted
//! query gets a content-addressed record: the task id is a deterministic
//! hash of the normalized payload, so byte-identical queries from the
//! same user produce the same id (records are not deduplicated; the id
//! is reproducible for idempotence testing). Lifecycle: created
//! `enqueued`, transitioned to `done` or `failed` exactly once, never
//! revived.

pub mod errors;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::query::NormalizedQuery;

pub use errors::{TaskError, TaskResult};
pub use store::{FsTaskStore, TaskStore};

/// Task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, not yet executed
    Enqueued,
    /// Executed successfully; result blob available
    Done,
    /// Execution failed; error payload persisted in place of a result
    Failed,
}

impl TaskStatus {
    /// String form used in logs and API payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Enqueued => "enqueued",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Persisted bookkeeping entry for one submitted query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Content hash of the normalized query payload
    pub task_id: String,
    /// Submitting user
    pub user: String,
    /// Location of the persisted task payload
    pub task: String,
    /// Location of the persisted result payload, set when done
    pub result: Option<String>,
    /// Lifecycle state
    pub status: TaskStatus,
    /// Submission time
    pub created: DateTime<Utc>,
    /// Expiry time, after which the record may be reaped
    pub expires: DateTime<Utc>,
    /// Last state transition time
    pub last_modified: DateTime<Utc>,
}

/// Compute the content-addressed task id for a normalized query.
///
/// Deterministic for byte-identical normalized payloads; 32 hex chars.
pub fn compute_task_id(query: &NormalizedQuery) -> TaskResult<String> {
    let hashable = serde_json::to_string(query)?;
    let digest = Sha256::digest(hashable.as_bytes());
    let mut hex = String::with_capacity(32);
    for byte in digest.iter().take(16) {
        hex.push_str(&format!("{:02x}", byte));
    }
    Ok(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{NormalizedPayload, QueryType};
    use serde_json::json;

    fn normalized(filter: serde_json::Value) -> NormalizedQuery {
        NormalizedQuery {
            query_type: QueryType::Find,
            query: NormalizedPayload::Find {
                catalog: "sources".to_string(),
                filter,
                projection: json!({}),
            },
            kwargs: serde_json::Map::new(),
            user: "alice".to_string(),
        }
    }

    #[test]
    fn test_task_id_reproducible() {
        let a = compute_task_id(&normalized(json!({"mag": 17}))).unwrap();
        let b = compute_task_id(&normalized(json!({"mag": 17}))).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_task_id_differs_for_different_payloads() {
        let a = compute_task_id(&normalized(json!({"mag": 17}))).unwrap();
        let b = compute_task_id(&normalized(json!({"mag": 18}))).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_value(TaskStatus::Enqueued).unwrap(), "enqueued");
        assert_eq!(TaskStatus::Failed.as_str(), "failed");
    }
}
