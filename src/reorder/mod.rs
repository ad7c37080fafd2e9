//! Reorder pipeline: snapshot, rank, validate, commit.
//!
//! A ranked candidate is never written as-is. `ReorderValidator` checks it
//! against the snapshot's identity set, and only a `ValidatedOrder` can be
//! turned into store assignments.

mod service;
mod validator;

pub use service::{ReorderOutcome, ReorderService};
pub use validator::{ReorderValidator, ValidatedOrder};

use thiserror::Error;

use crate::store::StoreError;
use crate::task::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError {
    /// Backend failed, timed out, or produced nothing usable.
    #[error("ranking unavailable: {0}")]
    RankingUnavailable(String),

    #[error("ranked list has {actual} tasks, expected {expected}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("{count} ranked task(s) have no id")]
    MissingIdentity { count: usize },

    #[error(
        "ranked ids differ from the originals (missing: {}, unexpected: {})",
        join_ids(.missing),
        join_ids(.unexpected)
    )]
    IdentitySetMismatch {
        missing: Vec<TaskId>,
        unexpected: Vec<TaskId>,
    },

    /// The task set changed between snapshot and commit.
    #[error("tasks changed during prioritization: {0}")]
    ConcurrentModification(String),

    #[error("task store error: {0}")]
    Store(String),
}

impl ReorderError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RankingUnavailable(_) => "ranking_unavailable",
            Self::CountMismatch { .. } => "count_mismatch",
            Self::MissingIdentity { .. } => "missing_identity",
            Self::IdentitySetMismatch { .. } => "identity_set_mismatch",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::Store(_) => "store_error",
        }
    }

    /// True for failures where the ranked list itself was rejected.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Self::CountMismatch { .. } | Self::MissingIdentity { .. } | Self::IdentitySetMismatch { .. }
        )
    }
}

impl From<StoreError> for ReorderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict { .. } | StoreError::NotFound(_) => {
                Self::ConcurrentModification(e.to_string())
            }
            other => Self::Store(other.to_string()),
        }
    }
}

fn join_ids(ids: &[TaskId]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mismatch_message_names_ids() {
        let err = ReorderError::IdentitySetMismatch {
            missing: vec![],
            unexpected: vec!["z".into()],
        };
        assert_eq!(
            err.to_string(),
            "ranked ids differ from the originals (missing: none, unexpected: z)"
        );
        assert_eq!(err.kind(), "identity_set_mismatch");
        assert!(err.is_validation_failure());
    }

    #[test]
    fn store_conflicts_become_concurrent_modification() {
        let err: ReorderError = StoreError::Conflict { expected: 3, actual: 5 }.into();
        assert_eq!(err.kind(), "concurrent_modification");
        let err: ReorderError = StoreError::Backend("disk full".into()).into();
        assert_eq!(err, ReorderError::Store("storage failure: disk full".into()));
    }
}
