//! Core task record and identity types.
//!
//! # Invariants
//! - `id` is unique within a user's task collection
//! - `title` is non-empty after trimming
//! - `order` is only a sort key; it carries no meaning beyond relative position

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of a task.
///
/// # Properties
/// - Unique within the owning user's collection
/// - Immutable once created
///
/// Identities echoed back by an external ranker may be blank, so an empty
/// `TaskId` is representable; the reorder validator rejects it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Mint a fresh identity.
    ///
    /// # Postcondition
    /// Returns a non-empty id never handed out before in this process.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identity is blank (whitespace counts as blank).
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Explicit priority label attached by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLabel {
    High,
    Medium,
    Low,
}

impl PriorityLabel {
    /// Case-insensitive parse; returns `None` for anything outside the set.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Ranking weight: higher sorts earlier.
    pub fn weight(&self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for PriorityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored to-do item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub user_id: String,
    pub folder_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<PriorityLabel>,
    pub completed: bool,
    /// Sort key within the folder; ties fall back to `created_at`.
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Build a fresh, incomplete task from validated input.
    ///
    /// # Postconditions
    /// - `task.id` is freshly minted
    /// - `task.order` is `created_at` in unix millis, so new tasks sort after
    ///   any prioritized (index-ordered) siblings
    pub fn create(user_id: &str, input: NewTask, now: DateTime<Utc>) -> Result<Self, TaskError> {
        let input = input.validate()?;
        Ok(Self {
            id: TaskId::new(),
            user_id: user_id.to_string(),
            folder_id: input.folder_id,
            title: input.title,
            description: input.description,
            deadline: input.deadline,
            priority: input.priority,
            completed: false,
            order: now.timestamp_millis(),
            created_at: now,
        })
    }

    /// Apply a partial update. Never touches `order`, `completed` or identity.
    pub fn apply(&mut self, update: TaskUpdate) -> Result<(), TaskError> {
        if let Some(title) = update.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(TaskError::EmptyTitle);
            }
            self.title = title;
        }
        if let Some(folder_id) = update.folder_id {
            if folder_id.trim().is_empty() {
                return Err(TaskError::MissingFolder);
            }
            self.folder_id = folder_id;
        }
        if let Some(description) = update.description {
            self.description = description.filter(|d| !d.trim().is_empty());
        }
        if let Some(deadline) = update.deadline {
            self.deadline = deadline;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        Ok(())
    }

    /// Projection handed to the ranking capability.
    pub fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            id: self.id.clone(),
            title: self.title.clone(),
            deadline: self.deadline,
            priority: self.priority,
            description: self.description.clone(),
        }
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub folder_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<PriorityLabel>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>, folder_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            folder_id: folder_id.into(),
            ..Default::default()
        }
    }

    /// Trim and check the input.
    ///
    /// # Errors
    /// `EmptyTitle` or `MissingFolder`.
    pub fn validate(mut self) -> Result<Self, TaskError> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(TaskError::EmptyTitle);
        }
        if self.folder_id.trim().is_empty() {
            return Err(TaskError::MissingFolder);
        }
        self.description = self.description.filter(|d| !d.trim().is_empty());
        Ok(self)
    }
}

/// Partial update. Outer `None` leaves a field alone; for optional fields an
/// inner `None` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub deadline: Option<Option<DateTime<Utc>>>,
    #[serde(default, with = "double_option")]
    pub priority: Option<Option<PriorityLabel>>,
}

/// Distinguishes a missing JSON field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer).map(Some)
    }
}

/// The fields of a task the ranking capability sees and must echo back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<PriorityLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TaskDescriptor {
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            deadline: None,
            priority: None,
            description: None,
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_priority(mut self, priority: PriorityLabel) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Errors that can occur while building or editing tasks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("Task title is required")]
    EmptyTitle,

    #[error("Folder is required")]
    MissingFolder,
}
