//! `POST /api/prioritize`: one reorder run for the caller.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::{header, HeaderMap},
    Json,
};
use chrono::Utc;

use super::auth::AuthUser;
use super::error::ApiError;
use super::routes::AppState;
use super::types::PrioritizeRequest;
use crate::reorder::ReorderOutcome;
use crate::store::TaskScope;

/// An empty body prioritizes every folder. A non-empty body must be a JSON
/// `PrioritizeRequest`; anything else is rejected before the store is touched.
pub async fn prioritize(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ReorderOutcome>, ApiError> {
    let req = parse_request(&headers, &body)?;
    let scope = TaskScope::from_folder(req.folder_id);

    let outcome = state.reorder.reorder(&user.id, &scope, Utc::now()).await?;
    Ok(Json(outcome))
}

fn parse_request(headers: &HeaderMap, body: &[u8]) -> Result<PrioritizeRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PrioritizeRequest::default());
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"));
    if !is_json {
        return Err(ApiError::bad_request(
            "Expected request with `Content-Type: application/json`",
        ));
    }

    let Json(req) = Json::<PrioritizeRequest>::from_bytes(body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    Ok(req)
}
