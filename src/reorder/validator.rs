//! Structural gate between a candidate order and storage.
//!
//! # Checks (in order)
//! 1. cardinality: `candidate.len() == original.len()`
//! 2. identity presence: no candidate carries a blank id
//! 3. set equality: candidate ids == original ids
//!
//! 1 and 3 together imply the candidate has no duplicates. A candidate that
//! introduces ids never seen in the original is reported as an identity
//! mismatch even when the count is also off, so tampering is named rather
//! than hidden behind a count.
//!
//! Validation is pure: running it twice on the same input yields the same
//! outcome.

use std::collections::{BTreeSet, HashMap};

use super::ReorderError;
use crate::store::OrderAssignment;
use crate::task::{Task, TaskDescriptor, TaskId};

/// Validates candidates against a fixed original identity set.
#[derive(Debug, Clone)]
pub struct ReorderValidator {
    original: Vec<TaskId>,
    original_set: BTreeSet<TaskId>,
}

impl ReorderValidator {
    pub fn new(original: impl IntoIterator<Item = TaskId>) -> Self {
        let original: Vec<TaskId> = original.into_iter().collect();
        let original_set = original.iter().cloned().collect();
        Self {
            original,
            original_set,
        }
    }

    pub fn for_tasks(tasks: &[Task]) -> Self {
        Self::new(tasks.iter().map(|t| t.id.clone()))
    }

    /// Check `candidate` and, on success, return it as the authoritative order.
    pub fn validate(&self, candidate: &[TaskDescriptor]) -> Result<ValidatedOrder, ReorderError> {
        let unexpected = self.unexpected_ids(candidate);

        if candidate.len() != self.original.len() {
            if !unexpected.is_empty() {
                return Err(self.identity_mismatch(candidate, unexpected));
            }
            return Err(ReorderError::CountMismatch {
                expected: self.original.len(),
                actual: candidate.len(),
            });
        }

        let blank = candidate.iter().filter(|t| t.id.is_empty()).count();
        if blank > 0 {
            return Err(ReorderError::MissingIdentity { count: blank });
        }

        let candidate_set: BTreeSet<&TaskId> = candidate.iter().map(|t| &t.id).collect();
        if !unexpected.is_empty() || candidate_set.len() != self.original_set.len() {
            return Err(self.identity_mismatch(candidate, unexpected));
        }

        Ok(ValidatedOrder {
            ids: candidate.iter().map(|t| t.id.clone()).collect(),
        })
    }

    /// Non-blank candidate ids absent from the original, deduplicated.
    fn unexpected_ids(&self, candidate: &[TaskDescriptor]) -> Vec<TaskId> {
        candidate
            .iter()
            .filter(|t| !t.id.is_empty() && !self.original_set.contains(&t.id))
            .map(|t| t.id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn identity_mismatch(&self, candidate: &[TaskDescriptor], unexpected: Vec<TaskId>) -> ReorderError {
        let present: BTreeSet<&TaskId> = candidate.iter().map(|t| &t.id).collect();
        let missing = self
            .original
            .iter()
            .filter(|id| !present.contains(id))
            .cloned()
            .collect();
        ReorderError::IdentitySetMismatch {
            missing,
            unexpected,
        }
    }
}

/// A candidate order that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrder {
    ids: Vec<TaskId>,
}

impl ValidatedOrder {
    pub fn ids(&self) -> &[TaskId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `order = zero-based position` for every task.
    pub fn assignments(&self) -> Vec<OrderAssignment> {
        self.ids
            .iter()
            .enumerate()
            .map(|(index, id)| OrderAssignment {
                id: id.clone(),
                order: index as i64,
            })
            .collect()
    }

    /// Rebuild the stored records in validated order with their new `order`.
    ///
    /// Fields come from `originals`, never from the ranker's echo. Ids not in
    /// `originals` are skipped; a validated order built from the same
    /// snapshot never has any.
    pub fn arrange(&self, originals: &[Task]) -> Vec<Task> {
        let by_id: HashMap<&TaskId, &Task> = originals.iter().map(|t| (&t.id, t)).collect();
        self.ids
            .iter()
            .enumerate()
            .filter_map(|(index, id)| {
                by_id.get(id).map(|task| Task {
                    order: index as i64,
                    ..(*task).clone()
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors(ids: &[&str]) -> Vec<TaskDescriptor> {
        ids.iter().map(|id| TaskDescriptor::new(*id, format!("task {id}"))).collect()
    }

    fn validator() -> ReorderValidator {
        ReorderValidator::new(["a", "b", "c"].map(TaskId::from))
    }

    #[test]
    fn accepts_permutation() {
        let order = validator().validate(&descriptors(&["b", "c", "a"])).unwrap();
        assert_eq!(
            order.assignments(),
            vec![
                OrderAssignment { id: "b".into(), order: 0 },
                OrderAssignment { id: "c".into(), order: 1 },
                OrderAssignment { id: "a".into(), order: 2 },
            ]
        );
    }

    #[test]
    fn validation_is_idempotent() {
        let candidate = descriptors(&["c", "a", "b"]);
        let v = validator();
        assert_eq!(v.validate(&candidate).unwrap(), v.validate(&candidate).unwrap());
    }

    #[test]
    fn one_fewer_is_count_mismatch() {
        let err = validator().validate(&descriptors(&["a", "b"])).unwrap_err();
        assert_eq!(err, ReorderError::CountMismatch { expected: 3, actual: 2 });
    }

    #[test]
    fn duplicate_with_extra_length_is_count_mismatch() {
        let err = validator()
            .validate(&descriptors(&["a", "b", "c", "a"]))
            .unwrap_err();
        assert_eq!(err, ReorderError::CountMismatch { expected: 3, actual: 4 });
    }

    #[test]
    fn blank_identity_is_missing_identity() {
        let mut candidate = descriptors(&["a", "b", "c"]);
        candidate[1].id = TaskId::from("");
        let err = validator().validate(&candidate).unwrap_err();
        assert_eq!(err, ReorderError::MissingIdentity { count: 1 });
    }

    #[test]
    fn foreign_identity_with_right_count_is_set_mismatch() {
        let err = validator()
            .validate(&descriptors(&["a", "b", "x"]))
            .unwrap_err();
        assert_eq!(
            err,
            ReorderError::IdentitySetMismatch {
                missing: vec!["c".into()],
                unexpected: vec!["x".into()],
            }
        );
    }

    #[test]
    fn duplicate_with_right_count_is_set_mismatch() {
        let err = validator()
            .validate(&descriptors(&["a", "a", "c"]))
            .unwrap_err();
        assert_eq!(
            err,
            ReorderError::IdentitySetMismatch {
                missing: vec!["b".into()],
                unexpected: vec![],
            }
        );
    }

    #[test]
    fn phantom_extra_task_is_named() {
        let err = validator()
            .validate(&descriptors(&["b", "a", "c", "z"]))
            .unwrap_err();
        match err {
            ReorderError::IdentitySetMismatch { missing, unexpected } => {
                assert!(missing.is_empty());
                assert_eq!(unexpected, vec![TaskId::from("z")]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_original_accepts_only_empty_candidate() {
        let v = ReorderValidator::new(Vec::<TaskId>::new());
        assert!(v.validate(&[]).unwrap().is_empty());
        assert!(v.validate(&descriptors(&["a"])).is_err());
    }
}
