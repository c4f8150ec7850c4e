//! Account registration and login over the store.
//!
//! Lookup misses are absences, not errors: `login` yields `Ok(None)` for an
//! unknown email or a wrong password, reserving `Err` for real failures.

mod password;

pub use password::{hash_password, verify_password};

use thiserror::Error;
use tracing::info;

use crate::storage::{DatabaseError, Store, User};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("{0}")]
    Validation(String),

    #[error("An account with email {0} already exists")]
    EmailTaken(String),
}

/// Registration and credential checks for the engine.
pub struct Accounts {
    store: Store,
}

impl Accounts {
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create an account. The password is stored as an argon2id hash, never
    /// in the clear.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        validate_profile(name, email, password)?;

        if self.store.get_user_by_email(email).await?.is_some() {
            return Err(AuthError::EmailTaken(email.to_string()));
        }

        let hash = password::hash_password(password).map_err(|e| AuthError::Hash(e.to_string()))?;
        let user = self.store.create_user(name, email, &hash).await?;

        info!(user_id = user.id, "Account registered");
        Ok(user)
    }

    /// Check credentials. `Ok(None)` means "no such account or wrong
    /// password" without distinguishing the two.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<User>, AuthError> {
        let Some(user) = self.store.get_user_by_email(email).await? else {
            return Ok(None);
        };

        let matches = password::verify_password(password, &user.password_hash)
            .map_err(|e| AuthError::Hash(e.to_string()))?;

        Ok(matches.then_some(user))
    }
}

fn validate_profile(name: &str, email: &str, password: &str) -> Result<(), AuthError> {
    if name.trim().is_empty() {
        return Err(AuthError::Validation("name cannot be empty".into()));
    }
    if email.trim().is_empty() || !email.contains('@') {
        return Err(AuthError::Validation(format!("invalid email address: {email}")));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
