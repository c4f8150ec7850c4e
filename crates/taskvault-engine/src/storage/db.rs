//! Store handle: connection lifecycle and change fan-out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sqlx::{Pool, Sqlite};
use tokio::sync::{RwLock, broadcast};
use tracing::{error, info};

pub use taskvault_core::db::DatabaseError;
use taskvault_core::db::{open_pool, open_pool_in_memory};

/// Change event published after every committed todo mutation.
///
/// Watchers use the `user_id` to decide whether their list needs re-reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TodoChanged {
    pub user_id: i64,
}

const CHANGE_CHANNEL_CAPACITY: usize = 64;

struct StoreInner {
    /// Backing file; `None` for in-memory stores.
    path: Option<PathBuf>,
    pool: RwLock<Pool<Sqlite>>,
    changes: broadcast::Sender<TodoChanged>,
}

/// Handle to the task database.
///
/// Cheap to clone; all clones share one pool. The pool sits behind a lock so
/// the backup job can take the store through an explicit
/// open -> closed-for-copy -> reopened transition while queries wait.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open or create the database at the given path and run migrations.
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        let pool = open_pool(path).await?;
        let store = Self::from_pool(Some(path.to_path_buf()), pool);
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let pool = open_pool_in_memory().await?;
        let store = Self::from_pool(None, pool);
        store.run_migrations().await?;
        Ok(store)
    }

    fn from_pool(path: Option<PathBuf>, pool: Pool<Sqlite>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                path,
                pool: RwLock::new(pool),
                changes,
            }),
        }
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let pool = self.pool().await;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("Store migrations complete");
        Ok(())
    }

    /// Current pool. Queries run on the returned clone so the lock is held
    /// only for the handoff, not for the query's duration.
    pub(crate) async fn pool(&self) -> Pool<Sqlite> {
        self.inner.pool.read().await.clone()
    }

    pub(crate) fn publish(&self, event: TodoChanged) {
        // No receivers is fine; nobody is watching.
        let _ = self.inner.changes.send(event);
    }

    pub(crate) fn changes(&self) -> broadcast::Receiver<TodoChanged> {
        self.inner.changes.subscribe()
    }

    /// Path of the backing database file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Close the pool, run `f` against the backing file, then reopen.
    ///
    /// While `f` runs no connection holds the database open (WAL is
    /// checkpointed on close), so `f` sees a consistent on-disk snapshot.
    /// Queries issued in the meantime wait on the pool lock.
    pub async fn with_closed<T, F>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Path) -> Result<T, DatabaseError>,
    {
        let Some(path) = self.inner.path.clone() else {
            return Err(DatabaseError::Invalid(
                "store is not file-backed; nothing to snapshot".into(),
            ));
        };

        let mut guard = self.inner.pool.write().await;
        guard.close().await;
        info!(path = %path.display(), "Store closed for exclusive file access");

        let result = f(&path);

        // Reopen regardless of the closure's outcome so the engine keeps
        // serving queries.
        match open_pool(&path).await {
            Ok(pool) => {
                *guard = pool;
                info!(path = %path.display(), "Store reopened");
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to reopen store");
                return Err(e);
            }
        }

        result
    }
}
