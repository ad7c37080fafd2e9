//! Ranking capabilities: backends that propose an order for a task set.
//!
//! A capability is treated as unreliable. It may be unreachable, slow, or
//! return a list that does not match its input; the reorder validator
//! exists to catch the last case. Nothing here touches storage.

mod heuristic;
mod llm;

pub use heuristic::{estimate_minutes, HeuristicRanker};
pub use llm::{LlmRanker, LlmRankerConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::task::TaskDescriptor;

/// What a capability is asked to rank.
#[derive(Debug, Clone)]
pub struct RankingRequest {
    pub tasks: Vec<TaskDescriptor>,
    /// Natural-language ordering policy
    pub policy: String,
    /// Reference time for deadline urgency
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
pub enum RankingError {
    /// Backend could not be reached or failed outright.
    #[error("ranking backend unavailable: {0}")]
    Unavailable(String),

    /// Backend answered, but nothing in the answer was a task list.
    #[error("ranking backend returned no usable result: {0}")]
    Unusable(String),
}

/// A backend that proposes an order for a set of tasks.
///
/// Implementations should return every input descriptor exactly once, with
/// its fields unchanged. Callers must not rely on that.
#[async_trait]
pub trait RankingCapability: Send + Sync {
    /// Short name for logs and API responses.
    fn name(&self) -> &str;

    async fn rank(&self, request: RankingRequest) -> Result<Vec<TaskDescriptor>, RankingError>;
}

pub type SharedRanker = Arc<dyn RankingCapability>;

#[cfg(test)]
pub mod testing {
    //! Deterministic stand-ins for tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a fixed answer and records what it was asked.
    pub struct ScriptedRanker {
        answer: Result<Vec<TaskDescriptor>, RankingError>,
        delay: Option<std::time::Duration>,
        calls: AtomicUsize,
        last_request: Mutex<Option<RankingRequest>>,
    }

    impl ScriptedRanker {
        pub fn returning(tasks: Vec<TaskDescriptor>) -> Self {
            Self::with_answer(Ok(tasks))
        }

        pub fn failing(error: RankingError) -> Self {
            Self::with_answer(Err(error))
        }

        fn with_answer(answer: Result<Vec<TaskDescriptor>, RankingError>) -> Self {
            Self {
                answer,
                delay: None,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        /// Sleep before answering, to exercise caller timeouts.
        pub fn delayed(mut self, delay: std::time::Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_request(&self) -> Option<RankingRequest> {
            self.last_request.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RankingCapability for ScriptedRanker {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn rank(&self, request: RankingRequest) -> Result<Vec<TaskDescriptor>, RankingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answer.clone()
        }
    }

    /// Echoes the input in reverse order.
    pub struct ReversingRanker;

    #[async_trait]
    impl RankingCapability for ReversingRanker {
        fn name(&self) -> &str {
            "reversing"
        }

        async fn rank(&self, request: RankingRequest) -> Result<Vec<TaskDescriptor>, RankingError> {
            Ok(request.tasks.into_iter().rev().collect())
        }
    }
}
