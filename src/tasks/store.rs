//! Bookkeeping store interface and filesystem implementation
//!
//! Records are keyed by task id; task and result payloads are written as
//! blobs keyed by (user, task id). Result payloads can be large, which
//! is why they live next to the records instead of inside them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::fs;

use super::errors::{TaskError, TaskResult};
use super::{TaskRecord, TaskStatus};

/// Bookkeeping store primitives consumed by the engine
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a fresh record (status `enqueued`)
    async fn insert_record(&self, record: &TaskRecord) -> TaskResult<()>;

    /// Transition a record's status, result pointer and modification time
    async fn update_record(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<String>,
        last_modified: DateTime<Utc>,
    ) -> TaskResult<()>;

    /// Fetch a record by task id
    async fn get_record(&self, task_id: &str) -> TaskResult<Option<TaskRecord>>;

    /// Remove a record; returns whether it existed
    async fn delete_record(&self, task_id: &str) -> TaskResult<bool>;

    /// Persist the raw task payload; returns its location
    async fn write_task_blob(&self, user: &str, task_id: &str, payload: &Value)
        -> TaskResult<String>;

    /// Persist the result (or error) payload; returns its location
    async fn write_result_blob(
        &self,
        user: &str,
        task_id: &str,
        payload: &Value,
    ) -> TaskResult<String>;

    /// Read the persisted task payload, if present
    async fn read_task_payload(&self, user: &str, task_id: &str) -> TaskResult<Option<Value>>;

    /// Read the persisted result (or error) payload, if present
    async fn read_result_payload(&self, user: &str, task_id: &str) -> TaskResult<Option<Value>>;

    /// Remove both blobs belonging to a record
    async fn delete_blobs(&self, record: &TaskRecord) -> TaskResult<()>;
}

/// Filesystem-backed bookkeeping store.
///
/// Layout under the root: `records/<task_id>.json` for records,
/// `<user>/<task_id>.task.json` and `<user>/<task_id>.result.json` for
/// payloads.
pub struct FsTaskStore {
    root: PathBuf,
}

impl FsTaskStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, task_id: &str) -> PathBuf {
        self.root.join("records").join(format!("{}.json", task_id))
    }

    fn blob_path(&self, user: &str, task_id: &str, kind: &str) -> PathBuf {
        self.root
            .join(user)
            .join(format!("{}.{}.json", task_id, kind))
    }

    async fn write_json(path: &Path, payload: &Value) -> TaskResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, serde_json::to_vec(payload)?).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for FsTaskStore {
    async fn insert_record(&self, record: &TaskRecord) -> TaskResult<()> {
        let path = self.record_path(&record.task_id);
        Self::write_json(&path, &serde_json::to_value(record)?).await
    }

    async fn update_record(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<String>,
        last_modified: DateTime<Utc>,
    ) -> TaskResult<()> {
        let mut record = self
            .get_record(task_id)
            .await?
            .ok_or_else(|| TaskError::RecordNotFound(task_id.to_string()))?;
        record.status = status;
        record.result = result;
        record.last_modified = last_modified;
        self.insert_record(&record).await
    }

    async fn get_record(&self, task_id: &str) -> TaskResult<Option<TaskRecord>> {
        let path = self.record_path(task_id);
        match fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_record(&self, task_id: &str) -> TaskResult<bool> {
        let path = self.record_path(task_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_task_blob(
        &self,
        user: &str,
        task_id: &str,
        payload: &Value,
    ) -> TaskResult<String> {
        let path = self.blob_path(user, task_id, "task");
        Self::write_json(&path, payload).await?;
        Ok(path.to_string_lossy().into_owned())
    }

    async fn write_result_blob(
        &self,
        user: &str,
        task_id: &str,
        payload: &Value,
    ) -> TaskResult<String> {
        let path = self.blob_path(user, task_id, "result");
        Self::write_json(&path, payload).await?;
        Ok(path.to_string_lossy().into_owned())
    }

    async fn read_task_payload(&self, user: &str, task_id: &str) -> TaskResult<Option<Value>> {
        read_optional(&self.blob_path(user, task_id, "task")).await
    }

    async fn read_result_payload(&self, user: &str, task_id: &str) -> TaskResult<Option<Value>> {
        read_optional(&self.blob_path(user, task_id, "result")).await
    }

    async fn delete_blobs(&self, record: &TaskRecord) -> TaskResult<()> {
        for kind in ["task", "result"] {
            let path = self.blob_path(&record.user, &record.task_id, kind);
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

async fn read_optional(path: &Path) -> TaskResult<Option<Value>> {
    match fs::read(path).await {
        Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
