//! Push-based todo subscriptions.
//!
//! A watcher yields the current snapshot on its first `recv()` and a fresh
//! re-query every time a mutation touches the watched user's rows. The store
//! publishes coarse change events; watchers own the re-read, so consumers
//! always see full, correctly ordered lists rather than deltas.

use tokio::sync::broadcast;
use tracing::debug;

use super::db::{DatabaseError, Store, TodoChanged};
use super::models::Todo;

/// Which slice of a user's todos a watcher re-reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoView {
    All,
    Pending,
    Completed,
}

/// Subscription to one user's todo list.
///
/// Dropping the watcher detaches it from the store; nothing keeps dropped
/// consumers alive.
pub struct TodoWatcher {
    store: Store,
    user_id: i64,
    view: TodoView,
    changes: broadcast::Receiver<TodoChanged>,
    primed: bool,
}

impl TodoWatcher {
    fn new(store: Store, user_id: i64, view: TodoView) -> Self {
        let changes = store.changes();
        Self {
            store,
            user_id,
            view,
            changes,
            primed: false,
        }
    }

    async fn query(&self) -> Result<Vec<Todo>, DatabaseError> {
        match self.view {
            TodoView::All => self.store.list_todos(self.user_id).await,
            TodoView::Pending => self.store.list_pending_todos(self.user_id).await,
            TodoView::Completed => self.store.list_completed_todos(self.user_id).await,
        }
    }

    /// Next value of the stream.
    ///
    /// First call: the current snapshot. Later calls: block until a mutation
    /// affects this user, then the re-queried list. An overrun receiver
    /// coalesces to the latest snapshot instead of replaying history.
    pub async fn recv(&mut self) -> Result<Vec<Todo>, DatabaseError> {
        if !self.primed {
            self.primed = true;
            return self.query().await;
        }

        loop {
            match self.changes.recv().await {
                Ok(event) if event.user_id == self.user_id => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, user_id = self.user_id, "Todo watcher lagged; resnapshotting");
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        self.query().await
    }
}

impl Store {
    /// Watch all of a user's todos (newest creation first).
    pub fn watch_todos(&self, user_id: i64) -> TodoWatcher {
        TodoWatcher::new(self.clone(), user_id, TodoView::All)
    }

    /// Watch a user's incomplete todos (soonest due first, undated last).
    pub fn watch_pending_todos(&self, user_id: i64) -> TodoWatcher {
        TodoWatcher::new(self.clone(), user_id, TodoView::Pending)
    }

    /// Watch a user's completed todos.
    pub fn watch_completed_todos(&self, user_id: i64) -> TodoWatcher {
        TodoWatcher::new(self.clone(), user_id, TodoView::Completed)
    }
}
