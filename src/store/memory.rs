//! In-memory task store (non-persistent).

use super::{
    import_inputs, sort_tasks, OrderAssignment, StoreError, TaskScope, TaskSnapshot, TaskStore,
};
use crate::task::{NewTask, Task, TaskId, TaskUpdate};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    /// user id -> task id -> task
    tasks: HashMap<String, HashMap<TaskId, Task>>,
    revisions: HashMap<String, u64>,
}

impl State {
    fn bump(&mut self, user_id: &str) -> u64 {
        let revision = self.revisions.entry(user_id.to_string()).or_insert(0);
        *revision += 1;
        *revision
    }

    fn revision(&self, user_id: &str) -> u64 {
        self.revisions.get(user_id).copied().unwrap_or(0)
    }

    fn task_mut(&mut self, user_id: &str, id: &TaskId) -> Result<&mut Task, StoreError> {
        self.tasks
            .get_mut(user_id)
            .and_then(|tasks| tasks.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

/// One lock guards tasks and revisions so a batch is applied as a unit.
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn create_task(&self, user_id: &str, input: NewTask) -> Result<Task, StoreError> {
        let task = Task::create(user_id, input, Utc::now())?;
        let mut state = self.state.write().await;
        state
            .tasks
            .entry(user_id.to_string())
            .or_default()
            .insert(task.id.clone(), task.clone());
        state.bump(user_id);
        Ok(task)
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

        let mut state = self.state.write().await;
        let tasks = state.tasks.entry(user_id.to_string()).or_default();
        for task in &created {
            tasks.insert(task.id.clone(), task.clone());
        }
        state.bump(user_id);
        Ok(created)
    }

    async fn get_task(&self, user_id: &str, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .get(user_id)
            .and_then(|tasks| tasks.get(id))
            .cloned())
    }

    async fn list_tasks(
        &self,
        user_id: &str,
        scope: &TaskScope,
        include_completed: bool,
    ) -> Result<Vec<Task>, StoreError> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .get(user_id)
            .map(|tasks| {
                tasks
                    .values()
                    .filter(|t| scope.contains(t) && (include_completed || !t.completed))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn update_task(
        &self,
        user_id: &str,
        id: &TaskId,
        update: TaskUpdate,
    ) -> Result<Task, StoreError> {
        let mut state = self.state.write().await;
        let task = state.task_mut(user_id, id)?;
        let mut updated = task.clone();
        updated.apply(update)?;
        *task = updated.clone();
        state.bump(user_id);
        Ok(updated)
    }

    async fn toggle_completion(&self, user_id: &str, id: &TaskId) -> Result<Task, StoreError> {
        let mut state = self.state.write().await;
        let task = state.task_mut(user_id, id)?;
        task.completed = !task.completed;
        let task = task.clone();
        state.bump(user_id);
        Ok(task)
    }

    async fn delete_task(&self, user_id: &str, id: &TaskId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let removed = state
            .tasks
            .get_mut(user_id)
            .and_then(|tasks| tasks.remove(id))
            .is_some();
        if removed {
            state.bump(user_id);
        }
        Ok(removed)
    }

    async fn revision(&self, user_id: &str) -> Result<u64, StoreError> {
        Ok(self.state.read().await.revision(user_id))
    }

    async fn snapshot_incomplete(
        &self,
        user_id: &str,
        scope: &TaskScope,
    ) -> Result<TaskSnapshot, StoreError> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .get(user_id)
            .map(|tasks| {
                tasks
                    .values()
                    .filter(|t| !t.completed && scope.contains(t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sort_tasks(&mut tasks);
        Ok(TaskSnapshot {
            tasks,
            revision: state.revision(user_id),
        })
    }

    async fn commit_order(
        &self,
        user_id: &str,
        assignments: &[OrderAssignment],
        expected_revision: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;

        if let Some(expected) = expected_revision {
            let actual = state.revision(user_id);
            if actual != expected {
                return Err(StoreError::Conflict { expected, actual });
            }
        }

        // Check the whole batch before touching anything.
        let user_tasks = state.tasks.get(user_id);
        if let Some(missing) = assignments
            .iter()
            .find(|a| !user_tasks.is_some_and(|tasks| tasks.contains_key(&a.id)))
        {
            return Err(StoreError::NotFound(missing.id.clone()));
        }

        for assignment in assignments {
            state.task_mut(user_id, &assignment.id)?.order = assignment.order;
        }
        Ok(state.bump(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(store: &InMemoryTaskStore) -> Vec<Task> {
        let mut out = Vec::new();
        for title in ["Reply to email", "Write report", "Call dentist"] {
            out.push(
                store
                    .create_task("u1", NewTask::titled(title, "work"))
                    .await
                    .unwrap(),
            );
        }
        out
    }

    #[tokio::test]
    async fn snapshot_excludes_completed_and_other_users() {
        let store = InMemoryTaskStore::new();
        let tasks = seeded(&store).await;
        store
            .create_task("u2", NewTask::titled("Not mine", "work"))
            .await
            .unwrap();
        store.toggle_completion("u1", &tasks[1].id).await.unwrap();

        let snapshot = store
            .snapshot_incomplete("u1", &TaskScope::Folder("work".into()))
            .await
            .unwrap();
        let ids: Vec<&TaskId> = snapshot.tasks.iter().map(|t| &t.id).collect();
        assert_eq!(ids, vec![&tasks[0].id, &tasks[2].id]);
        assert_eq!(snapshot.revision, 4);
    }

    #[tokio::test]
    async fn commit_applies_all_assignments() {
        let store = InMemoryTaskStore::new();
        let tasks = seeded(&store).await;
        let assignments: Vec<OrderAssignment> = tasks
            .iter()
            .rev()
            .enumerate()
            .map(|(i, t)| OrderAssignment {
                id: t.id.clone(),
                order: i as i64,
            })
            .collect();
        store.commit_order("u1", &assignments, None).await.unwrap();

        let listed = store
            .list_tasks("u1", &TaskScope::AllFolders, false)
            .await
            .unwrap();
        let titles: Vec<&str> = listed.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Call dentist", "Write report", "Reply to email"]);
    }

    #[tokio::test]
    async fn commit_fault_mid_batch_changes_nothing() {
        let store = InMemoryTaskStore::new();
        let tasks = seeded(&store).await;
        let before = store
            .list_tasks("u1", &TaskScope::AllFolders, true)
            .await
            .unwrap();

        let assignments = vec![
            OrderAssignment { id: tasks[2].id.clone(), order: 0 },
            OrderAssignment { id: TaskId::from("vanished"), order: 1 },
            OrderAssignment { id: tasks[0].id.clone(), order: 2 },
        ];
        let err = store.commit_order("u1", &assignments, None).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound(TaskId::from("vanished")));

        let after = store
            .list_tasks("u1", &TaskScope::AllFolders, true)
            .await
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn stale_revision_conflicts() {
        let store = InMemoryTaskStore::new();
        let tasks = seeded(&store).await;
        let snapshot = store
            .snapshot_incomplete("u1", &TaskScope::AllFolders)
            .await
            .unwrap();
        store
            .create_task("u1", NewTask::titled("Late arrival", "work"))
            .await
            .unwrap();

        let assignments = vec![OrderAssignment { id: tasks[0].id.clone(), order: 0 }];
        let err = store
            .commit_order("u1", &assignments, Some(snapshot.revision))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                expected: snapshot.revision,
                actual: snapshot.revision + 1
            }
        );
    }

    #[tokio::test]
    async fn import_preserves_title_order() {
        let store = InMemoryTaskStore::new();
        let titles = vec!["First".to_string(), "".to_string(), "Second".to_string()];
        let created = store.create_tasks("u1", "inbox", &titles).await.unwrap();
        assert_eq!(created.len(), 2);
        let listed = store
            .list_tasks("u1", &TaskScope::Folder("inbox".into()), false)
            .await
            .unwrap();
        assert_eq!(listed[0].title, "First");
        assert_eq!(listed[1].title, "Second");
        assert_eq!(store.revision("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_rejects_blank_title_without_writing() {
        let store = InMemoryTaskStore::new();
        let tasks = seeded(&store).await;
        let revision = store.revision("u1").await.unwrap();
        let update = TaskUpdate {
            title: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_task("u1", &tasks[0].id, update).await,
            Err(StoreError::Invalid(_))
        ));
        assert_eq!(store.revision("u1").await.unwrap(), revision);
        assert_eq!(
            store.get_task("u1", &tasks[0].id).await.unwrap().unwrap().title,
            "Reply to email"
        );
    }
}
