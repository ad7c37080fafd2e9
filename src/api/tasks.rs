//! Task CRUD handlers. Every query is scoped to the authenticated user.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::auth::AuthUser;
use super::error::ApiError;
use super::routes::AppState;
use super::types::{ImportTasksRequest, ImportTasksResponse, ListTasksQuery};
use crate::store::TaskScope;
use crate::task::{NewTask, Task, TaskId, TaskUpdate};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/import", post(import_tasks))
        .route("/:id", get(get_task).patch(update_task).delete(delete_task))
        .route("/:id/toggle", post(toggle_task))
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let scope = TaskScope::from_folder(query.folder_id);
    let tasks = state
        .store
        .list_tasks(&user.id, &scope, query.include_completed)
        .await?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state.store.create_task(&user.id, input).await?;
    tracing::debug!(user_id = %user.id, task_id = %task.id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn import_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ImportTasksRequest>,
) -> Result<(StatusCode, Json<ImportTasksResponse>), ApiError> {
    let created = state
        .store
        .create_tasks(&user.id, &req.folder_id, &req.titles)
        .await?;
    tracing::info!(
        user_id = %user.id,
        folder_id = %req.folder_id,
        submitted = req.titles.len(),
        created = created.len(),
        "tasks imported"
    );
    Ok((StatusCode::CREATED, Json(ImportTasksResponse { created })))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let id = TaskId::from(id);
    state
        .store
        .get_task(&user.id, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("task {} not found", id)))
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .store
        .update_task(&user.id, &TaskId::from(id), update)
        .await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = TaskId::from(id);
    if state.store.delete_task(&user.id, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("task {} not found", id)))
    }
}

async fn toggle_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .store
        .toggle_completion(&user.id, &TaskId::from(id))
        .await?;
    Ok(Json(task))
}
