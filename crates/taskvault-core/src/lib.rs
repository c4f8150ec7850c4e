//! taskvault core library
//!
//! Shared plumbing for the taskvault engine:
//! - `SQLite` pool helpers and the common `DatabaseError`
//! - tracing/logging initialization

pub mod db;
pub mod tracing_init;
