//! HTTP API for NextUp.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/auth/login` - Exchange the password for a session token
//! - `GET /api/tasks` - List tasks (`folder_id`, `include_completed`)
//! - `POST /api/tasks` - Create a task
//! - `POST /api/tasks/import` - Create tasks from a list of titles
//! - `GET /api/tasks/{id}` - Get a task
//! - `PATCH /api/tasks/{id}` - Update a task
//! - `DELETE /api/tasks/{id}` - Delete a task
//! - `POST /api/tasks/{id}/toggle` - Flip completion
//! - `POST /api/prioritize` - Reprioritize incomplete tasks (one folder or all)

mod auth;
mod error;
mod prioritize;
mod routes;
mod tasks;
pub mod types;

pub use error::ApiError;
pub use routes::{build_ranker, build_store, router, serve, AppState};
pub use types::*;
