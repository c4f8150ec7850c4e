//! User and todo queries.

use taskvault_core::db::unix_timestamp;

use super::db::{DatabaseError, Store, TodoChanged};
use super::models::{NewTodo, Todo, User};

impl Store {
    // =========================================================================
    // User queries
    // =========================================================================

    /// Create a new user. The password arrives pre-hashed from the auth layer.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "INSERT INTO users (name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool().await)
        .await?;

        let id = result.last_insert_rowid();
        self.get_user(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id} after insert")))
    }

    /// Get a user by ID. `None` means no such record, not a failure.
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool().await)
            .await?;

        Ok(user)
    }

    /// Get a user by email address.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool().await)
            .await?;

        Ok(user)
    }

    /// Update a user's profile fields and refresh `updated_at`.
    pub async fn update_user(&self, user: &User) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "UPDATE users SET name = ?, email = ?, password_hash = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(now)
        .bind(user.id)
        .execute(&self.pool().await)
        .await?;

        Ok(())
    }

    /// Delete a user. Their todos go with them (FK cascade).
    pub async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool().await)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.publish(TodoChanged { user_id: id });
        }
        Ok(deleted)
    }

    // =========================================================================
    // Todo queries
    // =========================================================================

    /// Create a new todo and return the stored record.
    ///
    /// An empty title is rejected; an unknown `user_id` fails the FK check.
    pub async fn create_todo(&self, todo: &NewTodo) -> Result<Todo, DatabaseError> {
        if todo.title.trim().is_empty() {
            return Err(DatabaseError::Invalid("todo title cannot be empty".into()));
        }

        let now = unix_timestamp();

        let result = sqlx::query(
            "INSERT INTO todos (user_id, title, description, is_completed, due_date, created_at, updated_at) VALUES (?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(todo.user_id)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.due_date)
        .bind(now)
        .bind(now)
        .execute(&self.pool().await)
        .await?;

        let id = result.last_insert_rowid();
        self.publish(TodoChanged {
            user_id: todo.user_id,
        });

        self.get_todo(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Todo {id} after insert")))
    }

    /// Get a todo by ID.
    pub async fn get_todo(&self, id: i64) -> Result<Option<Todo>, DatabaseError> {
        let todo = sqlx::query_as::<_, Todo>("SELECT * FROM todos WHERE id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool().await)
            .await?;

        Ok(todo)
    }

    /// All of a user's todos, newest creation first.
    pub async fn list_todos(&self, user_id: i64) -> Result<Vec<Todo>, DatabaseError> {
        let todos = sqlx::query_as::<_, Todo>(
            "SELECT * FROM todos WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool().await)
        .await?;

        Ok(todos)
    }

    /// Incomplete todos, soonest due first; undated todos sort last.
    pub async fn list_pending_todos(&self, user_id: i64) -> Result<Vec<Todo>, DatabaseError> {
        let todos = sqlx::query_as::<_, Todo>(
            r"
            SELECT * FROM todos
            WHERE user_id = ? AND is_completed = 0
            ORDER BY
                CASE WHEN due_date IS NULL THEN 1 ELSE 0 END,
                due_date ASC,
                id ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool().await)
        .await?;

        Ok(todos)
    }

    /// Completed todos, most recently touched first.
    pub async fn list_completed_todos(&self, user_id: i64) -> Result<Vec<Todo>, DatabaseError> {
        let todos = sqlx::query_as::<_, Todo>(
            "SELECT * FROM todos WHERE user_id = ? AND is_completed = 1 ORDER BY updated_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool().await)
        .await?;

        Ok(todos)
    }

    /// Incomplete todos due after `now` and no later than `horizon`,
    /// soonest first. One-shot query used by the reminder job.
    pub async fn list_upcoming_todos(
        &self,
        now: i64,
        horizon: i64,
    ) -> Result<Vec<Todo>, DatabaseError> {
        let todos = sqlx::query_as::<_, Todo>(
            "SELECT * FROM todos WHERE is_completed = 0 AND due_date IS NOT NULL AND due_date > ? AND due_date <= ? ORDER BY due_date ASC",
        )
        .bind(now)
        .bind(horizon)
        .fetch_all(&self.pool().await)
        .await?;

        Ok(todos)
    }

    /// Write back a todo's mutable fields, refreshing `updated_at`.
    pub async fn update_todo(&self, todo: &Todo) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "UPDATE todos SET title = ?, description = ?, is_completed = ?, due_date = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.is_completed)
        .bind(todo.due_date)
        .bind(now)
        .bind(todo.id)
        .execute(&self.pool().await)
        .await?;

        self.publish(TodoChanged {
            user_id: todo.user_id,
        });
        Ok(())
    }

    /// Delete a todo.
    pub async fn delete_todo(&self, todo: &Todo) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(todo.id)
            .execute(&self.pool().await)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.publish(TodoChanged {
                user_id: todo.user_id,
            });
        }
        Ok(deleted)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn test_store() -> Store {
        Store::open_in_memory().await.unwrap()
    }

    async fn seed_user(store: &Store) -> User {
        store.create_user("Ada", "ada@example.com", "hash").await.unwrap()
    }

    /// Backdate a todo's timestamps so refresh behavior is observable
    /// despite second-resolution clocks.
    async fn backdate_todo(store: &Store, id: i64, by_secs: i64) {
        let then = unix_timestamp() - by_secs;
        sqlx::query("UPDATE todos SET created_at = ?, updated_at = ? WHERE id = ?")
            .bind(then)
            .bind(then)
            .bind(id)
            .execute(&store.pool().await)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_and_get_todo() {
        let store = test_store().await;
        let user = seed_user(&store).await;

        let todo = store
            .create_todo(&NewTodo {
                description: "milk, eggs".into(),
                due_date: Some(unix_timestamp() + 3600),
                ..NewTodo::new(user.id, "Buy groceries")
            })
            .await
            .unwrap();

        assert_eq!(todo.user_id, user.id);
        assert_eq!(todo.title, "Buy groceries");
        assert_eq!(todo.description, "milk, eggs");
        assert!(!todo.is_completed);
        assert_eq!(store.get_todo(todo.id).await.unwrap().unwrap().id, todo.id);
    }

    #[tokio::test]
    async fn create_todo_rejects_empty_title() {
        let store = test_store().await;
        let user = seed_user(&store).await;

        let result = store.create_todo(&NewTodo::new(user.id, "   ")).await;
        assert!(matches!(result, Err(DatabaseError::Invalid(_))));
    }

    #[tokio::test]
    async fn create_todo_rejects_unknown_user() {
        let store = test_store().await;

        let result = store.create_todo(&NewTodo::new(999, "Orphan")).await;
        assert!(matches!(result, Err(DatabaseError::Query(_))));
    }

    #[tokio::test]
    async fn list_todos_newest_first() {
        let store = test_store().await;
        let user = seed_user(&store).await;

        let first = store.create_todo(&NewTodo::new(user.id, "first")).await.unwrap();
        let second = store.create_todo(&NewTodo::new(user.id, "second")).await.unwrap();
        let third = store.create_todo(&NewTodo::new(user.id, "third")).await.unwrap();

        let ids: Vec<i64> = store
            .list_todos(user.id)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn pending_orders_undated_last() {
        let store = test_store().await;
        let user = seed_user(&store).await;
        let now = unix_timestamp();

        let undated = store.create_todo(&NewTodo::new(user.id, "someday")).await.unwrap();
        let late = store
            .create_todo(&NewTodo {
                due_date: Some(now + 7200),
                ..NewTodo::new(user.id, "later")
            })
            .await
            .unwrap();
        let soon = store
            .create_todo(&NewTodo {
                due_date: Some(now + 600),
                ..NewTodo::new(user.id, "soon")
            })
            .await
            .unwrap();

        let mut done = store.create_todo(&NewTodo::new(user.id, "done")).await.unwrap();
        done.is_completed = true;
        store.update_todo(&done).await.unwrap();

        let ids: Vec<i64> = store
            .list_pending_todos(user.id)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![soon.id, late.id, undated.id]);
    }

    #[tokio::test]
    async fn completed_filter_and_order() {
        let store = test_store().await;
        let user = seed_user(&store).await;

        let open = store.create_todo(&NewTodo::new(user.id, "open")).await.unwrap();
        let mut a = store.create_todo(&NewTodo::new(user.id, "a")).await.unwrap();
        let mut b = store.create_todo(&NewTodo::new(user.id, "b")).await.unwrap();

        a.is_completed = true;
        store.update_todo(&a).await.unwrap();
        b.is_completed = true;
        store.update_todo(&b).await.unwrap();

        let completed = store.list_completed_todos(user.id).await.unwrap();
        let ids: Vec<i64> = completed.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
        assert!(!ids.contains(&open.id));
    }

    #[tokio::test]
    async fn upcoming_respects_horizon() {
        let store = test_store().await;
        let user = seed_user(&store).await;
        let now = unix_timestamp();

        let in_two_hours = store
            .create_todo(&NewTodo {
                due_date: Some(now + 2 * 3600),
                ..NewTodo::new(user.id, "due soon")
            })
            .await
            .unwrap();
        // Outside the 24h horizon.
        store
            .create_todo(&NewTodo {
                due_date: Some(now + 48 * 3600),
                ..NewTodo::new(user.id, "due later")
            })
            .await
            .unwrap();
        // Already past due.
        store
            .create_todo(&NewTodo {
                due_date: Some(now - 3600),
                ..NewTodo::new(user.id, "overdue")
            })
            .await
            .unwrap();
        // Due soon but already completed.
        let mut done = store
            .create_todo(&NewTodo {
                due_date: Some(now + 3600),
                ..NewTodo::new(user.id, "done early")
            })
            .await
            .unwrap();
        done.is_completed = true;
        store.update_todo(&done).await.unwrap();

        let upcoming = store.list_upcoming_todos(now, now + 24 * 3600).await.unwrap();
        let ids: Vec<i64> = upcoming.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![in_two_hours.id]);
    }

    #[tokio::test]
    async fn update_refreshes_updated_at() {
        let store = test_store().await;
        let user = seed_user(&store).await;

        let mut todo = store.create_todo(&NewTodo::new(user.id, "stale")).await.unwrap();
        backdate_todo(&store, todo.id, 3600).await;

        todo.is_completed = true;
        store.update_todo(&todo).await.unwrap();

        let stored = store.get_todo(todo.id).await.unwrap().unwrap();
        assert!(stored.is_completed);
        assert!(stored.updated_at > stored.created_at);
    }

    #[tokio::test]
    async fn update_is_idempotent() {
        let store = test_store().await;
        let user = seed_user(&store).await;

        let todo = store
            .create_todo(&NewTodo {
                description: "desc".into(),
                due_date: Some(unix_timestamp() + 60),
                ..NewTodo::new(user.id, "same")
            })
            .await
            .unwrap();

        store.update_todo(&todo).await.unwrap();
        store.update_todo(&todo).await.unwrap();

        let stored = store.get_todo(todo.id).await.unwrap().unwrap();
        assert_eq!(stored.title, todo.title);
        assert_eq!(stored.description, todo.description);
        assert_eq!(stored.due_date, todo.due_date);
        assert_eq!(stored.is_completed, todo.is_completed);
    }

    #[tokio::test]
    async fn delete_todo_removes_row() {
        let store = test_store().await;
        let user = seed_user(&store).await;

        let todo = store.create_todo(&NewTodo::new(user.id, "gone")).await.unwrap();
        assert!(store.delete_todo(&todo).await.unwrap());
        assert!(store.get_todo(todo.id).await.unwrap().is_none());
        // Second delete is a no-op.
        assert!(!store.delete_todo(&todo).await.unwrap());
    }

    #[tokio::test]
    async fn delete_user_cascades_todos() {
        let store = test_store().await;
        let user = seed_user(&store).await;

        store.create_todo(&NewTodo::new(user.id, "one")).await.unwrap();
        store.create_todo(&NewTodo::new(user.id, "two")).await.unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        assert!(store.get_user(user.id).await.unwrap().is_none());
        assert_eq!(store.list_todos(user.id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn update_user_refreshes_profile() {
        let store = test_store().await;
        let mut user = seed_user(&store).await;

        user.name = "Ada Lovelace".into();
        store.update_user(&user).await.unwrap();

        let stored = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Ada Lovelace");
        assert_eq!(stored.email, "ada@example.com");
    }

    #[tokio::test]
    async fn get_user_by_email_misses_are_absent() {
        let store = test_store().await;
        assert!(store.get_user_by_email("nobody@example.com").await.unwrap().is_none());
    }
}
