//! Durable user preferences.
//!
//! Settings live in a single JSON file in the data directory. Writes are
//! atomic (temp file + rename) and durable before the setter returns; every
//! write pushes the full snapshot to subscribers. Reads are resilient: a
//! missing or unreadable file degrades to defaults instead of failing,
//! unlike the task store where I/O failures always surface.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use taskvault_core::db::unix_timestamp;

const SETTINGS_FILE: &str = "settings.json";

const NOTIFICATION_TIME_RANGE: (i64, i64) = (1, 48);
const BACKUP_FREQUENCY_RANGE: (i64, i64) = (1, 30);

/// Errors from settings writes. Reads never fail; they degrade to defaults.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// How the presentation layer resolves its theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl From<ThemeMode> for i64 {
    fn from(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::System => 0,
            ThemeMode::Light => 1,
            ThemeMode::Dark => 2,
        }
    }
}

impl From<i64> for ThemeMode {
    fn from(value: i64) -> Self {
        match value {
            1 => Self::Light,
            2 => Self::Dark,
            _ => Self::System,
        }
    }
}

/// Full settings snapshot, serialized as `settings.json`.
///
/// `user_id` present means an authenticated session; its removal is the
/// logout signal the rest of the engine keys off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub notifications_enabled: bool,
    pub dark_mode_enabled: bool,
    /// Hours before a due date that a task counts as "upcoming".
    pub notification_time: i64,
    pub last_sync: i64,
    pub auto_backup_enabled: bool,
    /// Days between automatic backups.
    pub backup_frequency: i64,
    pub last_backup: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub theme_mode: ThemeMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications_enabled: false,
            dark_mode_enabled: false,
            notification_time: 24,
            last_sync: 0,
            auto_backup_enabled: false,
            backup_frequency: 7,
            last_backup: 0,
            user_id: None,
            theme_mode: ThemeMode::System,
        }
    }
}

/// Durable key-value store for user preferences.
pub struct SettingsStore {
    path: PathBuf,
    state: Mutex<Settings>,
    tx: watch::Sender<Settings>,
}

impl SettingsStore {
    /// Open the settings store inside `data_dir`, creating the directory if
    /// needed. A corrupt or missing settings file yields defaults.
    pub fn open(data_dir: &Path) -> Result<Self, SettingsError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(SETTINGS_FILE);
        let settings = load_or_default(&path);
        let (tx, _) = watch::channel(settings.clone());

        Ok(Self {
            path,
            state: Mutex::new(settings),
            tx,
        })
    }

    /// Current snapshot.
    pub async fn snapshot(&self) -> Settings {
        self.state.lock().await.clone()
    }

    /// Subscription holding the current snapshot; changes on every write.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    pub async fn notifications_enabled(&self) -> bool {
        self.state.lock().await.notifications_enabled
    }

    pub async fn notification_time(&self) -> i64 {
        self.state.lock().await.notification_time
    }

    pub async fn auto_backup_enabled(&self) -> bool {
        self.state.lock().await.auto_backup_enabled
    }

    pub async fn backup_frequency(&self) -> i64 {
        self.state.lock().await.backup_frequency
    }

    pub async fn user_id(&self) -> Option<i64> {
        self.state.lock().await.user_id
    }

    pub async fn set_notifications_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        self.update(|s| s.notifications_enabled = enabled).await
    }

    pub async fn set_dark_mode_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        self.update(|s| s.dark_mode_enabled = enabled).await
    }

    pub async fn set_notification_time(&self, hours: i64) -> Result<(), SettingsError> {
        check_range("notification_time", hours, NOTIFICATION_TIME_RANGE)?;
        self.update(|s| s.notification_time = hours).await
    }

    pub async fn set_auto_backup_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        self.update(|s| s.auto_backup_enabled = enabled).await
    }

    pub async fn set_backup_frequency(&self, days: i64) -> Result<(), SettingsError> {
        check_range("backup_frequency", days, BACKUP_FREQUENCY_RANGE)?;
        self.update(|s| s.backup_frequency = days).await
    }

    pub async fn set_theme_mode(&self, mode: ThemeMode) -> Result<(), SettingsError> {
        self.update(|s| s.theme_mode = mode).await
    }

    /// Record that a backup just completed.
    pub async fn mark_backup_completed(&self) -> Result<(), SettingsError> {
        self.update(|s| s.last_backup = unix_timestamp()).await
    }

    /// Record that a sync just completed.
    pub async fn mark_synced(&self) -> Result<(), SettingsError> {
        self.update(|s| s.last_sync = unix_timestamp()).await
    }

    /// Bind the active session to a user.
    pub async fn set_user_id(&self, user_id: i64) -> Result<(), SettingsError> {
        self.update(|s| s.user_id = Some(user_id)).await
    }

    /// Clear the active session (logout).
    pub async fn clear_user_id(&self) -> Result<(), SettingsError> {
        self.update(|s| s.user_id = None).await
    }

    async fn update<F>(&self, apply: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        apply(&mut next);
        persist(&self.path, &next)?;
        *state = next.clone();
        let _ = self.tx.send(next);
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: i64,
    (min, max): (i64, i64),
) -> Result<(), SettingsError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn load_or_default(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Settings file unreadable; using defaults");
                Settings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No settings file; using defaults");
            Settings::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Settings file unreadable; using defaults");
            Settings::default()
        }
    }
}

/// Write the snapshot durably: temp file in the same directory, then rename.
fn persist(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let json = serde_json::to_string_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path()).unwrap();

        let settings = store.snapshot().await;
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.notification_time, 24);
        assert_eq!(settings.backup_frequency, 7);
        assert!(settings.user_id.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_degrades_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{not json").unwrap();

        let store = SettingsStore::open(dir.path()).unwrap();
        assert_eq!(store.snapshot().await, Settings::default());
    }

    #[tokio::test]
    async fn writes_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = SettingsStore::open(dir.path()).unwrap();
        store.set_notifications_enabled(true).await.unwrap();
        store.set_notification_time(12).await.unwrap();
        store.set_user_id(7).await.unwrap();
        store.set_theme_mode(ThemeMode::Dark).await.unwrap();

        let reopened = SettingsStore::open(dir.path()).unwrap();
        let settings = reopened.snapshot().await;
        assert!(settings.notifications_enabled);
        assert_eq!(settings.notification_time, 12);
        assert_eq!(settings.user_id, Some(7));
        assert_eq!(settings.theme_mode, ThemeMode::Dark);
    }

    #[tokio::test]
    async fn out_of_range_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.set_notification_time(0).await,
            Err(SettingsError::OutOfRange { .. })
        ));
        assert!(matches!(
            store.set_notification_time(49).await,
            Err(SettingsError::OutOfRange { .. })
        ));
        assert!(matches!(
            store.set_backup_frequency(31).await,
            Err(SettingsError::OutOfRange { .. })
        ));
        // The stored values are untouched.
        assert_eq!(store.notification_time().await, 24);
        assert_eq!(store.backup_frequency().await, 7);
    }

    #[tokio::test]
    async fn subscribers_see_every_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path()).unwrap();

        let mut rx = store.subscribe();
        assert!(!rx.borrow().auto_backup_enabled);

        store.set_auto_backup_enabled(true).await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().auto_backup_enabled);
    }

    #[tokio::test]
    async fn clear_user_id_signals_logout() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path()).unwrap();

        store.set_user_id(3).await.unwrap();
        assert_eq!(store.user_id().await, Some(3));

        store.clear_user_id().await.unwrap();
        assert!(store.user_id().await.is_none());

        // Absence survives a reload.
        let reopened = SettingsStore::open(dir.path()).unwrap();
        assert!(reopened.snapshot().await.user_id.is_none());
    }

    #[tokio::test]
    async fn mark_backup_completed_stamps_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path()).unwrap();

        assert_eq!(store.snapshot().await.last_backup, 0);
        store.mark_backup_completed().await.unwrap();
        assert!(store.snapshot().await.last_backup > 0);
    }
}
