//! One prioritization run per request.
//!
//! # Flow
//! 1. snapshot the user's incomplete tasks in scope (one read)
//! 2. ask the prioritizer for a candidate, bounded by `timeout`
//! 3. validate the candidate against the snapshot
//! 4. commit `order = index` for every task as one batch (one write)
//!
//! Any failure before step 4 leaves storage untouched. Step 4 is all or
//! nothing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{ReorderError, ReorderValidator};
use crate::prioritizer::Prioritizer;
use crate::store::{SharedTaskStore, TaskScope};
use crate::task::{Task, TaskDescriptor};

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ReorderOutcome {
    /// Tasks in their new order, `order` already reassigned
    pub tasks: Vec<Task>,
    /// Name of the ranking backend that produced the order
    pub ranker: String,
    /// Store revision after the commit; `None` when nothing was written
    pub revision: Option<u64>,
    pub elapsed_ms: u64,
}

pub struct ReorderService {
    store: SharedTaskStore,
    prioritizer: Prioritizer,
    timeout: Duration,
    /// Reject the commit if anything changed since the snapshot.
    strict: bool,
}

impl ReorderService {
    pub fn new(store: SharedTaskStore, prioritizer: Prioritizer, timeout: Duration) -> Self {
        Self {
            store,
            prioritizer,
            timeout,
            strict: false,
        }
    }

    /// Condition the commit on the snapshot revision.
    pub fn with_strict_commit(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn ranker_name(&self) -> &str {
        self.prioritizer.ranker_name()
    }

    /// Reprioritize `user_id`'s incomplete tasks in `scope` as of `now`.
    ///
    /// # Errors
    /// - `RankingUnavailable` on backend failure or timeout
    /// - `CountMismatch` / `MissingIdentity` / `IdentitySetMismatch` when the
    ///   candidate is rejected
    /// - `ConcurrentModification` when the commit no longer fits the store
    /// - `Store` on storage failure
    ///
    /// Storage is unchanged in every error case.
    pub async fn reorder(
        &self,
        user_id: &str,
        scope: &TaskScope,
        now: DateTime<Utc>,
    ) -> Result<ReorderOutcome, ReorderError> {
        let started = Instant::now();
        let snapshot = self.store.snapshot_incomplete(user_id, scope).await?;

        if snapshot.tasks.is_empty() {
            debug!(user_id, %scope, "nothing to prioritize");
            return Ok(ReorderOutcome {
                tasks: Vec::new(),
                ranker: self.ranker_name().to_string(),
                revision: None,
                elapsed_ms: elapsed_ms(started),
            });
        }

        let descriptors: Vec<TaskDescriptor> =
            snapshot.tasks.iter().map(Task::descriptor).collect();

        let candidate = tokio::time::timeout(
            self.timeout,
            self.prioritizer.prioritize(&descriptors, now),
        )
        .await
        .map_err(|_| {
            warn!(user_id, timeout_secs = self.timeout.as_secs_f64(), "ranking timed out");
            ReorderError::RankingUnavailable(format!(
                "ranking did not finish within {:?}",
                self.timeout
            ))
        })??;

        let validated = ReorderValidator::for_tasks(&snapshot.tasks)
            .validate(&candidate)
            .map_err(|e| {
                warn!(user_id, %scope, error = %e, "rejected ranked order");
                e
            })?;

        let expected_revision = self.strict.then_some(snapshot.revision);
        let revision = self
            .store
            .commit_order(user_id, &validated.assignments(), expected_revision)
            .await
            .map_err(|e| {
                warn!(user_id, %scope, error = %e, "order commit failed");
                ReorderError::from(e)
            })?;

        let tasks = validated.arrange(&snapshot.tasks);
        info!(
            user_id,
            %scope,
            ranker = self.ranker_name(),
            tasks = tasks.len(),
            revision,
            "tasks reprioritized"
        );

        Ok(ReorderOutcome {
            tasks,
            ranker: self.ranker_name().to_string(),
            revision: Some(revision),
            elapsed_ms: elapsed_ms(started),
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::testing::{ReversingRanker, ScriptedRanker};
    use crate::ranking::{RankingCapability, RankingError, RankingRequest};
    use crate::store::{InMemoryTaskStore, TaskStore};
    use crate::task::{NewTask, TaskId};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Echoes the input plus one task nobody asked for.
    struct PhantomRanker;

    #[async_trait]
    impl RankingCapability for PhantomRanker {
        fn name(&self) -> &str {
            "phantom"
        }

        async fn rank(&self, request: RankingRequest) -> Result<Vec<TaskDescriptor>, RankingError> {
            let mut tasks = request.tasks;
            tasks.push(TaskDescriptor::new("z", "Invented task"));
            Ok(tasks)
        }
    }

    async fn seeded() -> (Arc<InMemoryTaskStore>, Vec<Task>) {
        let store = Arc::new(InMemoryTaskStore::new());
        let mut tasks = Vec::new();
        for title in ["Reply to email", "Write report", "Call dentist"] {
            tasks.push(
                store
                    .create_task("u1", NewTask::titled(title, "work"))
                    .await
                    .unwrap(),
            );
        }
        (store, tasks)
    }

    fn service(store: Arc<InMemoryTaskStore>, ranker: Arc<dyn RankingCapability>) -> ReorderService {
        ReorderService::new(store, Prioritizer::new(ranker), Duration::from_secs(5))
    }

    async fn orders(store: &InMemoryTaskStore) -> Vec<(TaskId, i64)> {
        store
            .list_tasks("u1", &TaskScope::AllFolders, true)
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.id, t.order))
            .collect()
    }

    #[tokio::test]
    async fn commits_ranked_order_as_indices() {
        let (store, tasks) = seeded().await;
        let outcome = service(store.clone(), Arc::new(ReversingRanker))
            .reorder("u1", &TaskScope::Folder("work".into()), Utc::now())
            .await
            .unwrap();

        let titles: Vec<&str> = outcome.tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Call dentist", "Write report", "Reply to email"]);
        assert_eq!(outcome.ranker, "reversing");
        assert_eq!(
            orders(&store).await,
            vec![
                (tasks[2].id.clone(), 0),
                (tasks[1].id.clone(), 1),
                (tasks[0].id.clone(), 2)
            ]
        );
    }

    #[tokio::test]
    async fn phantom_task_is_rejected_and_nothing_written() {
        let (store, _) = seeded().await;
        let before = orders(&store).await;
        let revision = store.revision("u1").await.unwrap();

        let err = service(store.clone(), Arc::new(PhantomRanker))
            .reorder("u1", &TaskScope::AllFolders, Utc::now())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ReorderError::IdentitySetMismatch {
                missing: vec![],
                unexpected: vec!["z".into()],
            }
        );
        assert_eq!(orders(&store).await, before);
        assert_eq!(store.revision("u1").await.unwrap(), revision);
    }

    #[tokio::test]
    async fn ranker_failure_leaves_store_untouched() {
        let (store, _) = seeded().await;
        let before = orders(&store).await;
        let ranker = Arc::new(ScriptedRanker::failing(RankingError::Unavailable(
            "503".into(),
        )));
        let err = service(store.clone(), ranker)
            .reorder("u1", &TaskScope::AllFolders, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ranking_unavailable");
        assert_eq!(orders(&store).await, before);
    }

    #[tokio::test]
    async fn slow_ranker_times_out() {
        let (store, tasks) = seeded().await;
        let ranker = Arc::new(
            ScriptedRanker::returning(tasks.iter().map(Task::descriptor).collect())
                .delayed(Duration::from_secs(10)),
        );
        let service = ReorderService::new(
            store.clone(),
            Prioritizer::new(ranker),
            Duration::from_millis(50),
        );
        let err = service
            .reorder("u1", &TaskScope::AllFolders, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ReorderError::RankingUnavailable(_)));
    }

    #[tokio::test]
    async fn empty_scope_is_a_no_op() {
        let (store, _) = seeded().await;
        let ranker = Arc::new(ScriptedRanker::returning(Vec::new()));
        let revision = store.revision("u1").await.unwrap();
        let outcome = service(store.clone(), ranker.clone())
            .reorder("u1", &TaskScope::Folder("empty".into()), Utc::now())
            .await
            .unwrap();
        assert!(outcome.tasks.is_empty());
        assert_eq!(outcome.revision, None);
        assert_eq!(ranker.calls(), 0);
        assert_eq!(store.revision("u1").await.unwrap(), revision);
    }

    #[tokio::test]
    async fn ranker_field_edits_do_not_reach_storage() {
        let (store, tasks) = seeded().await;
        let mut edited: Vec<TaskDescriptor> = tasks.iter().map(Task::descriptor).collect();
        edited[0].title = "Reply to ALL emails".into();
        let outcome = service(store.clone(), Arc::new(ScriptedRanker::returning(edited)))
            .reorder("u1", &TaskScope::AllFolders, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.tasks[0].title, "Reply to email");
        let stored = store.get_task("u1", &tasks[0].id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Reply to email");
        assert_eq!(stored.order, 0);
    }

    /// Adds a task while the ranker is thinking.
    struct InterleavingRanker {
        store: Arc<InMemoryTaskStore>,
    }

    #[async_trait]
    impl RankingCapability for InterleavingRanker {
        fn name(&self) -> &str {
            "interleaving"
        }

        async fn rank(&self, request: RankingRequest) -> Result<Vec<TaskDescriptor>, RankingError> {
            self.store
                .create_task("u1", NewTask::titled("Added meanwhile", "work"))
                .await
                .map_err(|e| RankingError::Unavailable(e.to_string()))?;
            Ok(request.tasks)
        }
    }

    #[tokio::test]
    async fn strict_commit_rejects_concurrent_edit() {
        let (store, _) = seeded().await;
        let ranker = Arc::new(InterleavingRanker {
            store: store.clone(),
        });
        let err = service(store.clone(), ranker.clone())
            .with_strict_commit(true)
            .reorder("u1", &TaskScope::AllFolders, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "concurrent_modification");

        // Default mode: last writer wins; the new task keeps its own order.
        let outcome = service(store.clone(), ranker)
            .reorder("u1", &TaskScope::AllFolders, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.tasks.len(), 4);
    }
}
