//! Mapping from domain errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::types::ErrorBody;
use crate::reorder::ReorderError;
use crate::store::StoreError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(status = %self.status, kind = self.kind, "{}", self.message);
        }
        let body = ErrorBody {
            error: self.kind.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let (status, kind) = match &e {
            StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            StoreError::Invalid(_) => (StatusCode::BAD_REQUEST, "invalid_task"),
            StoreError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            StoreError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        };
        Self::new(status, kind, e.to_string())
    }
}

impl From<ReorderError> for ApiError {
    fn from(e: ReorderError) -> Self {
        let status = match &e {
            ReorderError::RankingUnavailable(_) => StatusCode::BAD_GATEWAY,
            e if e.is_validation_failure() => StatusCode::BAD_GATEWAY,
            ReorderError::ConcurrentModification(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.kind(), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorder_errors_map_to_statuses() {
        let cases = [
            (ReorderError::RankingUnavailable("down".into()), StatusCode::BAD_GATEWAY),
            (ReorderError::CountMismatch { expected: 3, actual: 2 }, StatusCode::BAD_GATEWAY),
            (ReorderError::MissingIdentity { count: 1 }, StatusCode::BAD_GATEWAY),
            (ReorderError::ConcurrentModification("stale".into()), StatusCode::CONFLICT),
            (ReorderError::Store("io".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let kind = err.kind();
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
            assert_eq!(api.kind, kind);
        }
    }

    #[test]
    fn invalid_task_is_bad_request() {
        let api: ApiError = StoreError::Invalid(crate::task::TaskError::EmptyTitle).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
    }
}
