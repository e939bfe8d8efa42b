//! # Query Routes
//!
//! The thin HTTP surface over the engine: submit a query, fetch a
//! bookkept task by id, delete it. Identity arrives pre-authenticated
//! from the fronting layer as an `X-User` header; this module only maps
//! it onto the descriptor.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::engine::{Engine, FetchPart, QueryOutcome};
use crate::observability::Logger;
use crate::query::{QueryDescriptor, QueryError};

use super::errors::ApiError;

/// Shared state for the query routes
pub struct ApiState {
    /// The query engine
    pub engine: Arc<Engine>,
    /// User granted admin rights by the demo identity layer
    pub admin_username: String,
}

/// Build the query router
pub fn query_routes(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/queries", put(submit_query))
        .route(
            "/queries/:task_id",
            get(fetch_query).delete(delete_query),
        )
        .with_state(state)
}

/// Health check route
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

fn identity(state: &ApiState, headers: &HeaderMap) -> (String, bool) {
    let user = headers
        .get("x-user")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string();
    let is_admin = user == state.admin_username;
    (user, is_admin)
}

async fn submit_query(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let (user, is_admin) = identity(&state, &headers);

    let mut descriptor: QueryDescriptor = serde_json::from_value(body)
        .map_err(|e| ApiError(QueryError::validation(format!("bad query descriptor: {}", e))))?;
    descriptor.user = user;
    descriptor.is_admin = is_admin;

    Logger::info(
        "api_query",
        &[
            ("request_id", request_id.as_str()),
            ("user", descriptor.user.as_str()),
            ("query_type", descriptor.query_type.as_str()),
        ],
    );

    let persist = descriptor
        .kwargs
        .get("save")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let prepared = state.engine.prepare(&descriptor, persist).await?;

    if let Some(task_id) = prepared.task_id() {
        let task_id = task_id.to_string();
        let engine = state.engine.clone();
        // result delivery is deferred to fetch-by-id; execution continues
        // in the background
        tokio::spawn(async move {
            engine.execute(&prepared).await;
        });
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({"status": "enqueued", "task_id": task_id})),
        )
            .into_response());
    }

    let outcome = state.engine.execute(&prepared).await;
    let status = match &outcome {
        QueryOutcome::Done { .. } => StatusCode::OK,
        QueryOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Ok((status, Json(outcome)).into_response())
}

async fn fetch_query(
    State(state): State<Arc<ApiState>>,
    Path(task_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let part = match params.get("part") {
        None => FetchPart::Result,
        Some(name) => FetchPart::parse(name)?,
    };
    let view = state.engine.fetch(&task_id, part).await?;
    Ok(Json(view).into_response())
}

async fn delete_query(
    State(state): State<Arc<ApiState>>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    if state.engine.delete_task(&task_id).await? {
        Ok(Json(json!({"message": "success"})).into_response())
    } else {
        Err(ApiError(QueryError::TaskNotFound(task_id)))
    }
}
