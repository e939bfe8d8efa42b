//! # Query Engine
//!
//! The entry point the serving layer talks to. Mirrors the two-step
//! shape of query handling: `prepare` normalizes a descriptor and, when
//! bookkeeping is requested, writes the task payload and an `enqueued`
//! record; `execute` runs the prepared query and settles the record to
//! `done` or `failed`. The engine takes no locks and spawns nothing;
//! callers decide whether to await `execute` or run it in the
//! background and hand out the task id.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::executor::{DocumentStore, QueryExecutor};
use crate::observability::logger::{excerpt, Logger};
use crate::query::errors::{QueryError, QueryResult};
use crate::query::{Normalizer, NormalizedQuery, QueryDescriptor};
use crate::tasks::{compute_task_id, TaskRecord, TaskStatus, TaskStore};

/// Final state of one query execution
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// Execution succeeded
    Done {
        /// Shaped result payload
        result: Value,
    },
    /// Execution failed
    Failed {
        /// Error message
        message: String,
    },
}

/// Bookkeeping handle created at submission
#[derive(Debug, Clone)]
pub struct TaskTicket {
    /// Content-addressed task id
    pub task_id: String,
    /// Submitting user
    pub user: String,
}

/// A normalized query ready to execute, with its bookkeeping ticket
/// when persistence was requested
#[derive(Debug)]
pub struct PreparedQuery {
    /// The validated query
    pub normalized: NormalizedQuery,
    /// Present when bookkeeping was requested
    pub ticket: Option<TaskTicket>,
}

impl PreparedQuery {
    /// Task id, when bookkeeping was requested
    pub fn task_id(&self) -> Option<&str> {
        self.ticket.as_ref().map(|t| t.task_id.as_str())
    }
}

/// Which piece of a bookkept task a fetch returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPart {
    /// The record only
    Record,
    /// The record plus the result (or error) payload
    Result,
    /// The record plus the originally submitted task payload
    Task,
}

impl FetchPart {
    /// Parse a part name from the fetch API
    pub fn parse(name: &str) -> QueryResult<Self> {
        match name {
            "record" => Ok(FetchPart::Record),
            "result" => Ok(FetchPart::Result),
            "task" => Ok(FetchPart::Task),
            other => Err(QueryError::validation(format!(
                "unknown fetch part: {}",
                other
            ))),
        }
    }
}

/// A fetched task: its record and, depending on the requested part, the
/// persisted payload
#[derive(Debug, Serialize)]
pub struct TaskView {
    /// The bookkeeping record
    pub record: TaskRecord,
    /// Persisted payload, when requested and present
    pub data: Option<Value>,
}

/// The query translation & execution engine
pub struct Engine {
    config: EngineConfig,
    normalizer: Normalizer,
    store: Arc<dyn DocumentStore>,
    tasks: Option<Arc<dyn TaskStore>>,
}

impl Engine {
    /// Build an engine without bookkeeping; submissions requesting
    /// persistence will be rejected
    pub fn new(config: EngineConfig, store: Arc<dyn DocumentStore>) -> Self {
        let normalizer = Normalizer::new(config.clone());
        Self {
            config,
            normalizer,
            store,
            tasks: None,
        }
    }

    /// Build an engine with a bookkeeping store
    pub fn with_bookkeeping(
        config: EngineConfig,
        store: Arc<dyn DocumentStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> Self {
        let normalizer = Normalizer::new(config.clone());
        Self {
            config,
            normalizer,
            store,
            tasks: Some(tasks),
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize a descriptor and, when `persist` is set, enqueue a
    /// bookkeeping record for it
    pub async fn prepare(
        &self,
        descriptor: &QueryDescriptor,
        persist: bool,
    ) -> QueryResult<PreparedQuery> {
        Logger::info(
            "query_received",
            &[
                ("user", descriptor.user.as_str()),
                ("query_type", descriptor.query_type.as_str()),
            ],
        );

        let normalized = self.normalizer.normalize(descriptor).map_err(|e| {
            if matches!(e, QueryError::Validation(_)) {
                Logger::warn(
                    "query_invalid",
                    &[
                        ("user", descriptor.user.as_str()),
                        ("query_type", descriptor.query_type.as_str()),
                        ("error", &e.to_string()),
                        ("payload", &excerpt(&descriptor.query.to_string())),
                    ],
                );
            }
            e
        })?;

        if !persist {
            return Ok(PreparedQuery {
                normalized,
                ticket: None,
            });
        }

        let tasks = self
            .tasks
            .as_ref()
            .ok_or(QueryError::BookkeepingUnavailable)?;

        let task_id = compute_task_id(&normalized)?;
        let expiration_days = match descriptor.kwargs.get("query_expiration_interval") {
            None => self.config.default_expiration_days,
            Some(value) => lenient_i64(value).ok_or_else(|| {
                QueryError::validation(format!("bad query_expiration_interval: {}", value))
            })?,
        };

        // too big for the record itself; persisted as a blob
        let task_payload = json!({
            "query_type": descriptor.query_type,
            "query": descriptor.query,
            "kwargs": descriptor.kwargs,
            "user": descriptor.user,
        });
        let task_location = tasks
            .write_task_blob(&descriptor.user, &task_id, &task_payload)
            .await?;

        let now = Utc::now();
        let record = TaskRecord {
            task_id: task_id.clone(),
            user: descriptor.user.clone(),
            task: task_location,
            result: None,
            status: TaskStatus::Enqueued,
            created: now,
            expires: now + Duration::days(expiration_days),
            last_modified: now,
        };
        tasks.insert_record(&record).await?;

        Logger::info(
            "task_enqueued",
            &[
                ("user", descriptor.user.as_str()),
                ("task_id", task_id.as_str()),
            ],
        );

        Ok(PreparedQuery {
            normalized,
            ticket: Some(TaskTicket {
                task_id,
                user: descriptor.user.clone(),
            }),
        })
    }

    /// Execute a prepared query. With a ticket, the result (or error)
    /// payload is persisted and the record settles to exactly one of
    /// `done`/`failed`; no path leaves it `enqueued`.
    pub async fn execute(&self, prepared: &PreparedQuery) -> QueryOutcome {
        let executor = QueryExecutor::new(&self.config, self.store.as_ref());
        let result = executor.execute(&prepared.normalized).await;

        let Some(ticket) = &prepared.ticket else {
            return match result {
                Ok(data) => {
                    self.log_settled("query_done", &prepared.normalized, None);
                    QueryOutcome::Done { result: data }
                }
                Err(e) => {
                    self.log_failure(&prepared.normalized, &e);
                    QueryOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            };
        };

        match result {
            Ok(data) => match self.settle_done(ticket, &data).await {
                Ok(()) => {
                    self.log_settled("task_done", &prepared.normalized, Some(ticket));
                    QueryOutcome::Done { result: data }
                }
                Err(e) => {
                    self.log_failure(&prepared.normalized, &e);
                    self.settle_failed(ticket, &e).await;
                    QueryOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            },
            Err(e) => {
                self.log_failure(&prepared.normalized, &e);
                self.settle_failed(ticket, &e).await;
                QueryOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Convenience for the synchronous path: prepare without
    /// bookkeeping, then execute
    pub async fn run(&self, descriptor: &QueryDescriptor) -> QueryResult<QueryOutcome> {
        let prepared = self.prepare(descriptor, false).await?;
        Ok(self.execute(&prepared).await)
    }

    /// Fetch a bookkept task by id
    pub async fn fetch(&self, task_id: &str, part: FetchPart) -> QueryResult<TaskView> {
        let tasks = self
            .tasks
            .as_ref()
            .ok_or(QueryError::BookkeepingUnavailable)?;
        let record = tasks
            .get_record(task_id)
            .await?
            .ok_or_else(|| QueryError::TaskNotFound(task_id.to_string()))?;

        let data = match part {
            FetchPart::Record => None,
            FetchPart::Result => tasks.read_result_payload(&record.user, task_id).await?,
            FetchPart::Task => tasks.read_task_payload(&record.user, task_id).await?,
        };

        Ok(TaskView { record, data })
    }

    /// Delete a bookkept task: its record and both payloads. Returns
    /// whether the record existed.
    pub async fn delete_task(&self, task_id: &str) -> QueryResult<bool> {
        let tasks = self
            .tasks
            .as_ref()
            .ok_or(QueryError::BookkeepingUnavailable)?;
        let Some(record) = tasks.get_record(task_id).await? else {
            return Ok(false);
        };
        tasks.delete_blobs(&record).await?;
        tasks.delete_record(task_id).await?;
        Logger::info(
            "task_deleted",
            &[("user", record.user.as_str()), ("task_id", task_id)],
        );
        Ok(true)
    }

    /// Ensure a geospatial index exists on every queryable collection
    pub async fn ensure_indexes(&self) -> QueryResult<()> {
        let names = self.store.list_collection_names().await?;
        for name in names {
            if self.config.is_system(&name) {
                continue;
            }
            let mut keys = serde_json::Map::new();
            keys.insert(self.config.geojson_field.clone(), json!("2dsphere"));
            self.store
                .create_index(&name, &Value::Object(keys), false)
                .await?;
        }
        Ok(())
    }

    async fn settle_done(&self, ticket: &TaskTicket, data: &Value) -> QueryResult<()> {
        let tasks = self
            .tasks
            .as_ref()
            .ok_or(QueryError::BookkeepingUnavailable)?;
        let location = tasks
            .write_result_blob(&ticket.user, &ticket.task_id, data)
            .await?;
        tasks
            .update_record(&ticket.task_id, TaskStatus::Done, Some(location), Utc::now())
            .await?;
        Ok(())
    }

    /// Best effort: persist the error payload and settle the record to
    /// `failed` with the result pointer cleared. A bookkeeping store
    /// that is itself down can only be logged.
    async fn settle_failed(&self, ticket: &TaskTicket, error: &QueryError) {
        let Some(tasks) = self.tasks.as_ref() else {
            return;
        };
        let payload = json!({ "msg": error.to_string() });
        if let Err(e) = tasks
            .write_result_blob(&ticket.user, &ticket.task_id, &payload)
            .await
        {
            Logger::error(
                "task_error_payload_write_failed",
                &[
                    ("task_id", ticket.task_id.as_str()),
                    ("error", &e.to_string()),
                ],
            );
        }
        if let Err(e) = tasks
            .update_record(&ticket.task_id, TaskStatus::Failed, None, Utc::now())
            .await
        {
            Logger::error(
                "task_record_update_failed",
                &[
                    ("task_id", ticket.task_id.as_str()),
                    ("error", &e.to_string()),
                ],
            );
        }
    }

    fn log_settled(&self, event: &str, normalized: &NormalizedQuery, ticket: Option<&TaskTicket>) {
        let mut fields = vec![
            ("user", normalized.user.clone()),
            ("query_type", normalized.query_type.as_str().to_string()),
        ];
        if let Some(ticket) = ticket {
            fields.push(("task_id", ticket.task_id.clone()));
        }
        let borrowed: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        Logger::info(event, &borrowed);
    }

    fn log_failure(&self, normalized: &NormalizedQuery, error: &QueryError) {
        let payload = serde_json::to_string(&normalized.query).unwrap_or_default();
        Logger::error(
            "query_failed",
            &[
                ("user", normalized.user.as_str()),
                ("query_type", normalized.query_type.as_str()),
                ("error", &error.to_string()),
                ("payload", &excerpt(&payload)),
            ],
        );
    }
}

/// Accept an expiration interval as a native integer or numeric string
fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
