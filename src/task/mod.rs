//! Task module - task records, identities and the descriptor view used for ranking.
//!
//! - Input invariants are enforced in constructors (`NewTask::validate`)
//! - Pure data; persistence lives in `crate::store`

pub mod task;

pub use task::{NewTask, PriorityLabel, Task, TaskDescriptor, TaskError, TaskId, TaskUpdate};
