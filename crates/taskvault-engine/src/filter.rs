//! Filtering, search, and ordering for presented task lists.
//!
//! Pure and total: no I/O, no clock, never fails on empty input. Safe to
//! re-run on every state change.

use crate::storage::Todo;

/// Status slice of a task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

/// Orderings a task list can be presented in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    DateDesc,
    DateAsc,
    TitleAsc,
    TitleDesc,
}

/// Search, filter, and sort specification for one presented list.
#[derive(Debug, Clone, Default)]
pub struct ListSpec {
    /// Case-insensitive substring matched against titles; blank matches all.
    pub query: String,
    pub status: StatusFilter,
    pub sort: SortOrder,
}

/// Derive the presented list: search, then status filter, then a stable sort.
///
/// Undated tasks order as if due infinitely late: last under `DateAsc`,
/// first under `DateDesc`.
pub fn apply(todos: &[Todo], spec: &ListSpec) -> Vec<Todo> {
    let needle = spec.query.trim().to_lowercase();

    let mut out: Vec<Todo> = todos
        .iter()
        .filter(|todo| needle.is_empty() || todo.title.to_lowercase().contains(&needle))
        .filter(|todo| match spec.status {
            StatusFilter::All => true,
            StatusFilter::Active => !todo.is_completed,
            StatusFilter::Completed => todo.is_completed,
        })
        .cloned()
        .collect();

    match spec.sort {
        SortOrder::DateAsc => out.sort_by_key(due_or_max),
        SortOrder::DateDesc => out.sort_by(|a, b| due_or_max(b).cmp(&due_or_max(a))),
        SortOrder::TitleAsc => out.sort_by(|a, b| a.title.cmp(&b.title)),
        SortOrder::TitleDesc => out.sort_by(|a, b| b.title.cmp(&a.title)),
    }

    out
}

fn due_or_max(todo: &Todo) -> i64 {
    todo.due_date.unwrap_or(i64::MAX)
}
