//! taskvault engine
//!
//! The data and background-scheduling core of the taskvault task tracker:
//! - `SQLite`-backed store for users and todos with push-based query streams
//! - durable settings store with change subscriptions
//! - pure filter/sort pipeline for presented task lists
//! - named periodic job scheduler with constraint gating
//! - reminder and backup jobs driven by the scheduler

pub mod auth;
pub mod filter;
pub mod jobs;
pub mod notify;
pub mod scheduler;
pub mod settings;
pub mod storage;
