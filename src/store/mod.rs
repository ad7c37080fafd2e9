//! Task storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database
//!
//! Every write bumps a per-user revision counter. A prioritization run reads
//! a snapshot (tasks + revision) once and writes the new order once, as a
//! single all-or-nothing batch.

mod memory;
mod sqlite;

pub use memory::InMemoryTaskStore;
pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::task::{NewTask, Task, TaskError, TaskId, TaskUpdate};

/// Which of a user's tasks an operation covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "folder_id", rename_all = "snake_case")]
pub enum TaskScope {
    Folder(String),
    AllFolders,
}

impl TaskScope {
    pub fn from_folder(folder_id: Option<String>) -> Self {
        match folder_id.filter(|f| !f.trim().is_empty()) {
            Some(folder_id) => Self::Folder(folder_id),
            None => Self::AllFolders,
        }
    }

    pub fn contains(&self, task: &Task) -> bool {
        match self {
            Self::Folder(folder_id) => task.folder_id == *folder_id,
            Self::AllFolders => true,
        }
    }
}

impl std::fmt::Display for TaskScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Folder(folder_id) => write!(f, "folder {}", folder_id),
            Self::AllFolders => f.write_str("all folders"),
        }
    }
}

/// Incomplete tasks as read at the start of a run, sorted by current order.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub tasks: Vec<Task>,
    /// User revision at read time
    pub revision: u64,
}

/// New sort key for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAssignment {
    pub id: TaskId,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("tasks changed since snapshot (expected revision {expected}, found {actual})")]
    Conflict { expected: u64, actual: u64 },

    #[error("invalid task: {0}")]
    Invalid(#[from] TaskError),

    #[error("storage failure: {0}")]
    Backend(String),
}

/// Task store trait - implemented by all storage backends.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    async fn create_task(&self, user_id: &str, input: NewTask) -> Result<Task, StoreError>;

    /// Create one task per non-blank title in a single write.
    async fn create_tasks(
        &self,
        user_id: &str,
        folder_id: &str,
        titles: &[String],
    ) -> Result<Vec<Task>, StoreError>;

    async fn get_task(&self, user_id: &str, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// Tasks in scope, sorted by `(order, created_at)`.
    async fn list_tasks(
        &self,
        user_id: &str,
        scope: &TaskScope,
        include_completed: bool,
    ) -> Result<Vec<Task>, StoreError>;

    async fn update_task(
        &self,
        user_id: &str,
        id: &TaskId,
        update: TaskUpdate,
    ) -> Result<Task, StoreError>;

    async fn toggle_completion(&self, user_id: &str, id: &TaskId) -> Result<Task, StoreError>;

    async fn delete_task(&self, user_id: &str, id: &TaskId) -> Result<bool, StoreError>;

    /// Current revision of the user's task collection.
    async fn revision(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Incomplete tasks in scope plus the revision they were read at.
    async fn snapshot_incomplete(
        &self,
        user_id: &str,
        scope: &TaskScope,
    ) -> Result<TaskSnapshot, StoreError>;

    /// Apply all assignments or none of them. Returns the new revision.
    ///
    /// Fails with `NotFound` if any assignment names a missing task and with
    /// `Conflict` if `expected_revision` is given and no longer current.
    async fn commit_order(
        &self,
        user_id: &str,
        assignments: &[OrderAssignment],
        expected_revision: Option<u64>,
    ) -> Result<u64, StoreError>;
}

pub type SharedTaskStore = Arc<dyn TaskStore>;

/// Sort in display order: `order`, then creation time, then id.
pub(crate) fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

/// Validated inputs for a bulk import; blank titles are dropped.
pub(crate) fn import_inputs(folder_id: &str, titles: &[String]) -> Result<Vec<NewTask>, StoreError> {
    titles
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| {
            NewTask::titled(t.as_str(), folder_id)
                .validate()
                .map_err(StoreError::from)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_from_blank_folder_is_all_folders() {
        assert_eq!(TaskScope::from_folder(Some("  ".into())), TaskScope::AllFolders);
        assert_eq!(TaskScope::from_folder(None), TaskScope::AllFolders);
        assert_eq!(
            TaskScope::from_folder(Some("work".into())),
            TaskScope::Folder("work".into())
        );
    }

    #[test]
    fn import_skips_blank_titles() {
        let titles = vec!["Buy milk".to_string(), "   ".to_string(), " Call Bob ".to_string()];
        let inputs = import_inputs("home", &titles).unwrap();
        let titles: Vec<&str> = inputs.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Buy milk", "Call Bob"]);
        assert!(matches!(
            import_inputs("", &["x".to_string()]),
            Err(StoreError::Invalid(TaskError::MissingFolder))
        ));
    }
}
