//! SQLite-based task store.

use super::{
    import_inputs, OrderAssignment, StoreError, TaskScope, TaskSnapshot, TaskStore,
};
use crate::task::{NewTask, PriorityLabel, Task, TaskId, TaskUpdate};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    folder_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    deadline TEXT,
    priority TEXT,
    completed INTEGER NOT NULL DEFAULT 0,
    sort_order INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_user_folder ON tasks(user_id, folder_id, sort_order);
CREATE INDEX IF NOT EXISTS idx_tasks_user_completed ON tasks(user_id, completed);

CREATE TABLE IF NOT EXISTS task_revisions (
    user_id TEXT PRIMARY KEY NOT NULL,
    revision INTEGER NOT NULL
);
"#;

const TASK_COLUMNS: &str =
    "id, user_id, folder_id, title, description, deadline, priority, completed, sort_order, created_at";

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    /// Open (or create) `tasks.db` under `base_dir`.
    pub async fn new(base_dir: PathBuf) -> Result<Self, StoreError> {
        let db_path = base_dir.join("tasks.db");

        tokio::fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to create data dir: {}", e)))?;

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            Ok::<_, StoreError>(conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("Task join error: {}", e)))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("Task join error: {}", e)))?
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    // Fixed width so text comparison matches time order.
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let id: String = row.get(0)?;
    let deadline: Option<String> = row.get(5)?;
    let priority: Option<String> = row.get(6)?;
    let created_at: String = row.get(9)?;

    Ok(Task {
        id: TaskId::from(id),
        user_id: row.get(1)?,
        folder_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        deadline: deadline
            .map(|d| parse_timestamp(5, &d))
            .transpose()?,
        priority: priority.as_deref().and_then(PriorityLabel::parse),
        completed: row.get(7)?,
        order: row.get(8)?,
        created_at: parse_timestamp(9, &created_at)?,
    })
}

fn insert_task(conn: &Connection, task: &Task) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO tasks (id, user_id, folder_id, title, description, deadline, priority,
                            completed, sort_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            task.id.as_str(),
            task.user_id,
            task.folder_id,
            task.title,
            task.description,
            task.deadline.as_ref().map(timestamp),
            task.priority.map(|p| p.as_str()),
            task.completed,
            task.order,
            timestamp(&task.created_at),
        ],
    )?;
    Ok(())
}

fn select_task(conn: &Connection, user_id: &str, id: &str) -> Result<Option<Task>, StoreError> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND id = ?2");
    Ok(conn
        .query_row(&sql, params![user_id, id], row_to_task)
        .optional()?)
}

fn select_tasks(
    conn: &Connection,
    user_id: &str,
    scope: &TaskScope,
    include_completed: bool,
) -> Result<Vec<Task>, StoreError> {
    let completed_filter = if include_completed { "" } else { " AND completed = 0" };
    let order_by = " ORDER BY sort_order ASC, created_at ASC, id ASC";

    let tasks = match scope {
        TaskScope::Folder(folder_id) => {
            let sql = format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND folder_id = ?2{completed_filter}{order_by}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id, folder_id], row_to_task)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        TaskScope::AllFolders => {
            let sql = format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1{completed_filter}{order_by}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id], row_to_task)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(tasks)
}

fn read_revision(conn: &Connection, user_id: &str) -> Result<u64, StoreError> {
    let revision: Option<i64> = conn
        .query_row(
            "SELECT revision FROM task_revisions WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(revision.unwrap_or(0) as u64)
}

fn bump_revision(conn: &Connection, user_id: &str) -> Result<u64, StoreError> {
    conn.execute(
        "INSERT INTO task_revisions (user_id, revision) VALUES (?1, 1)
         ON CONFLICT(user_id) DO UPDATE SET revision = revision + 1",
        params![user_id],
    )?;
    read_revision(conn, user_id)
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn create_task(&self, user_id: &str, input: NewTask) -> Result<Task, StoreError> {
        let task = Task::create(user_id, input, Utc::now())?;
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            insert_task(&tx, &task)?;
            bump_revision(&tx, &user_id)?;
            tx.commit()?;
            Ok(task)
        })
        .await
    }

    async fn create_tasks(
        &self,
        user_id: &str,
        folder_id: &str,
        titles: &[String],
    ) -> Result<Vec<Task>, StoreError> {
        let inputs = import_inputs(folder_id, titles)?;
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let mut created = Vec::with_capacity(inputs.len());
        for (offset, input) in inputs.into_iter().enumerate() {
            let mut task = Task::create(user_id, input, now)?;
            task.order += offset as i64;
            created.push(task);
        }

        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for task in &created {
                insert_task(&tx, task)?;
            }
            bump_revision(&tx, &user_id)?;
            tx.commit()?;
            Ok(created)
        })
        .await
    }

    async fn get_task(&self, user_id: &str, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let user_id = user_id.to_string();
        let id = id.clone();
        self.with_conn(move |conn| select_task(conn, &user_id, id.as_str()))
            .await
    }

    async fn list_tasks(
        &self,
        user_id: &str,
        scope: &TaskScope,
        include_completed: bool,
    ) -> Result<Vec<Task>, StoreError> {
        let user_id = user_id.to_string();
        let scope = scope.clone();
        self.with_conn(move |conn| select_tasks(conn, &user_id, &scope, include_completed))
            .await
    }

    async fn update_task(
        &self,
        user_id: &str,
        id: &TaskId,
        update: TaskUpdate,
    ) -> Result<Task, StoreError> {
        let user_id = user_id.to_string();
        let id = id.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut task = select_task(&tx, &user_id, id.as_str())?
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            task.apply(update)?;
            tx.execute(
                "UPDATE tasks SET title = ?1, folder_id = ?2, description = ?3, deadline = ?4,
                                  priority = ?5
                 WHERE user_id = ?6 AND id = ?7",
                params![
                    task.title,
                    task.folder_id,
                    task.description,
                    task.deadline.as_ref().map(timestamp),
                    task.priority.map(|p| p.as_str()),
                    user_id,
                    id.as_str(),
                ],
            )?;
            bump_revision(&tx, &user_id)?;
            tx.commit()?;
            Ok(task)
        })
        .await
    }

    async fn toggle_completion(&self, user_id: &str, id: &TaskId) -> Result<Task, StoreError> {
        let user_id = user_id.to_string();
        let id = id.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut task = select_task(&tx, &user_id, id.as_str())?
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            task.completed = !task.completed;
            tx.execute(
                "UPDATE tasks SET completed = ?1 WHERE user_id = ?2 AND id = ?3",
                params![task.completed, user_id, id.as_str()],
            )?;
            bump_revision(&tx, &user_id)?;
            tx.commit()?;
            Ok(task)
        })
        .await
    }

    async fn delete_task(&self, user_id: &str, id: &TaskId) -> Result<bool, StoreError> {
        let user_id = user_id.to_string();
        let id = id.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM tasks WHERE user_id = ?1 AND id = ?2",
                params![user_id, id.as_str()],
            )? > 0;
            if removed {
                bump_revision(&tx, &user_id)?;
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn revision(&self, user_id: &str) -> Result<u64, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| read_revision(conn, &user_id))
            .await
    }

    async fn snapshot_incomplete(
        &self,
        user_id: &str,
        scope: &TaskScope,
    ) -> Result<TaskSnapshot, StoreError> {
        let user_id = user_id.to_string();
        let scope = scope.clone();
        self.with_conn(move |conn| {
            // Read tasks and revision under one transaction so they agree.
            let tx = conn.transaction()?;
            let tasks = select_tasks(&tx, &user_id, &scope, false)?;
            let revision = read_revision(&tx, &user_id)?;
            tx.commit()?;
            Ok(TaskSnapshot { tasks, revision })
        })
        .await
    }

    async fn commit_order(
        &self,
        user_id: &str,
        assignments: &[OrderAssignment],
        expected_revision: Option<u64>,
    ) -> Result<u64, StoreError> {
        let user_id = user_id.to_string();
        let assignments = assignments.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            if let Some(expected) = expected_revision {
                let actual = read_revision(&tx, &user_id)?;
                if actual != expected {
                    return Err(StoreError::Conflict { expected, actual });
                }
            }

            {
                let mut stmt = tx.prepare(
                    "UPDATE tasks SET sort_order = ?1 WHERE user_id = ?2 AND id = ?3",
                )?;
                for assignment in &assignments {
                    let updated =
                        stmt.execute(params![assignment.order, user_id, assignment.id.as_str()])?;
                    if updated == 0 {
                        // Dropping the transaction rolls back earlier updates.
                        return Err(StoreError::NotFound(assignment.id.clone()));
                    }
                }
            }

            let revision = bump_revision(&tx, &user_id)?;
            tx.commit()?;
            Ok(revision)
        })
        .await
    }
}
