//! Prioritizer - turns a task set into a candidate priority order.
//!
//! # Contract
//! - Empty input returns an empty candidate without consulting the backend
//! - Otherwise exactly one `rank` call is made; there is no retry loop here
//! - Backend failures surface as `ReorderError::RankingUnavailable`
//! - The candidate is returned as the backend produced it; structural checks
//!   belong to `crate::reorder::ReorderValidator`

pub mod policy;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::ranking::{RankingRequest, SharedRanker};
use crate::reorder::ReorderError;
use crate::task::{TaskDescriptor, TaskId};

pub struct Prioritizer {
    ranker: SharedRanker,
    policy: String,
}

impl Prioritizer {
    /// Prioritizer using the standard policy text.
    pub fn new(ranker: SharedRanker) -> Self {
        Self::with_policy(ranker, policy::RANKING_POLICY)
    }

    pub fn with_policy(ranker: SharedRanker, policy: impl Into<String>) -> Self {
        Self {
            ranker,
            policy: policy.into(),
        }
    }

    pub fn ranker_name(&self) -> &str {
        self.ranker.name()
    }

    /// Propose a new order for `tasks`, judged against `now`.
    ///
    /// # Errors
    /// `RankingUnavailable` if the backend fails or answers with nothing for a
    /// non-empty input.
    pub async fn prioritize(
        &self,
        tasks: &[TaskDescriptor],
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskDescriptor>, ReorderError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let request = RankingRequest {
            tasks: tasks.to_vec(),
            policy: self.policy.clone(),
            now,
        };
        let candidate = self.ranker.rank(request).await.map_err(|e| {
            warn!(ranker = self.ranker.name(), error = %e, "ranking failed");
            ReorderError::RankingUnavailable(e.to_string())
        })?;

        if candidate.is_empty() {
            return Err(ReorderError::RankingUnavailable(format!(
                "{} ranker returned no tasks",
                self.ranker.name()
            )));
        }

        let altered = count_altered(tasks, &candidate);
        if altered > 0 {
            warn!(
                ranker = self.ranker.name(),
                altered, "ranker changed task fields; stored values will be kept"
            );
        }
        info!(
            ranker = self.ranker.name(),
            input = tasks.len(),
            candidate = candidate.len(),
            "candidate order produced"
        );

        Ok(candidate)
    }
}

/// Candidates whose id matches an input task but whose other fields differ.
fn count_altered(original: &[TaskDescriptor], candidate: &[TaskDescriptor]) -> usize {
    let by_id: HashMap<&TaskId, &TaskDescriptor> = original.iter().map(|t| (&t.id, t)).collect();
    candidate
        .iter()
        .filter(|c| by_id.get(&c.id).is_some_and(|o| *o != *c))
        .count()
}
