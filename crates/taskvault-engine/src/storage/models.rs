//! Database models for the taskvault engine.

use serde::{Deserialize, Serialize};

/// User record from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Todo record from the database.
///
/// All timestamps are Unix seconds; `due_date` is absent for undated tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Todo {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub due_date: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields accepted by the todo creation API.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub due_date: Option<i64>,
}

impl NewTodo {
    /// New todo with an empty description and no due date.
    pub fn new(user_id: i64, title: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            description: String::new(),
            due_date: None,
        }
    }
}

/// Persisted registration of a named periodic job.
///
/// `anchor_ms` is the point the firing boundaries are computed from; an
/// update-policy reschedule keeps it, a replace-policy reschedule resets it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRecord {
    pub name: String,
    pub interval_ms: i64,
    pub flex_ms: i64,
    pub battery_not_low: bool,
    pub device_idle: bool,
    pub network_required: bool,
    pub policy: String,
    pub anchor_ms: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_run_at: Option<i64>,
    pub last_outcome: Option<String>,
}
