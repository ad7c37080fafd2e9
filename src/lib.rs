//! # NextUp
//!
//! Task list service that reorders a user's incomplete tasks by asking a
//! ranking backend for a priority order and committing it only after the
//! order is proven to be a permutation of what was asked for.
//!
//! ## Architecture
//!
//! ```text
//!   POST /api/prioritize
//!          │
//!          ▼
//!   ┌────────────────┐  snapshot   ┌─────────────┐
//!   │ ReorderService │────────────▶│  TaskStore  │
//!   └───────┬────────┘◀────────────└─────────────┘
//!           │ descriptors     commit_order ▲
//!           ▼                              │
//!   ┌────────────────┐   rank   ┌──────────┴───────┐
//!   │  Prioritizer   │─────────▶│ RankingCapability│  (LLM or heuristic)
//!   └───────┬────────┘          └──────────────────┘
//!           │ candidate
//!           ▼
//!   ┌────────────────┐
//!   │ReorderValidator│  count, identity presence, identity set
//!   └────────────────┘
//! ```
//!
//! ## Reorder Flow
//! 1. Read the user's incomplete tasks in scope (one snapshot)
//! 2. Ask the ranking backend for a candidate order (bounded by a timeout)
//! 3. Validate the candidate against the snapshot
//! 4. Write `order = index` for every task in one atomic batch
//!
//! ## Modules
//! - `task`: Task record, identity and priority label
//! - `ranking`: Ranking backends (`LlmRanker`, `HeuristicRanker`)
//! - `llm`: OpenAI-compatible chat-completion client
//! - `prioritizer`: Policy text and the single-call `Prioritizer`
//! - `reorder`: Validator, index assignment and the reorder workflow
//! - `store`: Task storage (memory, SQLite)
//! - `api`: HTTP surface

pub mod api;
pub mod config;
pub mod llm;
pub mod prioritizer;
pub mod ranking;
pub mod reorder;
pub mod store;
pub mod task;

pub use config::Config;
pub use prioritizer::Prioritizer;
pub use reorder::{ReorderError, ReorderService, ReorderValidator};
pub use store::{TaskScope, TaskStore};
