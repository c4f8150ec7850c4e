//! `SQLite` storage for the taskvault engine.
//!
//! Provides persistence for users, todos, and scheduled-job registrations,
//! plus push-based subscriptions to a user's todo list.

mod db;
mod models;
mod queries;
mod queries_jobs;
mod watch;

pub use db::{DatabaseError, Store, TodoChanged};
pub use models::*;
pub use watch::{TodoView, TodoWatcher};
