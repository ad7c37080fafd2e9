//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub dev_mode: bool,
    pub auth_required: bool,
    /// Whether tasks survive a restart
    pub persistent_store: bool,
    /// Ranking backend in use
    pub ranker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub password: String,
    /// User the session is issued for; defaults to `owner`
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    /// Expiration unix seconds
    pub exp: i64,
    pub user_id: String,
}

/// Query for `GET /api/tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTasksQuery {
    /// Folder to list; all folders when absent
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub include_completed: bool,
}

/// Bulk import of plain titles into one folder.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportTasksRequest {
    pub folder_id: String,
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportTasksResponse {
    pub created: Vec<Task>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrioritizeRequest {
    /// Folder to prioritize; all folders when absent
    #[serde(default)]
    pub folder_id: Option<String>,
}

/// Body of every non-2xx JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code
    pub error: String,
    pub message: String,
}
