//! # API Errors
//!
//! Maps engine errors onto HTTP responses. Permission errors keep their
//! generic message; the denial reason only ever reaches the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::query::QueryError;

/// An engine error crossing the HTTP boundary
#[derive(Debug)]
pub struct ApiError(pub QueryError);

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    /// HTTP status for the wrapped error
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            QueryError::Validation(_) => StatusCode::BAD_REQUEST,
            QueryError::Permission => StatusCode::FORBIDDEN,
            QueryError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            QueryError::BookkeepingUnavailable => StatusCode::NOT_IMPLEMENTED,
            QueryError::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError(QueryError::validation("bad")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(QueryError::Permission).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError(QueryError::TaskNotFound("x".to_string())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(QueryError::execution("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
