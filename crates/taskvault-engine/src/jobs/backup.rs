//! Backup job: snapshot the database file and rotate old artifacts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::{info, warn};

use crate::scheduler::JobError;
use crate::settings::SettingsStore;
use crate::storage::{DatabaseError, Store};

/// Number of backup artifacts kept after a successful run.
const RETAINED_BACKUPS: usize = 5;

const BACKUP_PREFIX: &str = "todo_backup_";
const BACKUP_SUFFIX: &str = ".db";

/// Copies the store's backing file to a timestamped artifact and prunes the
/// backup directory down to the newest five.
pub struct BackupJob {
    store: Store,
    settings: Arc<SettingsStore>,
    backup_dir: PathBuf,
}

impl BackupJob {
    pub fn new(store: Store, settings: Arc<SettingsStore>, backup_dir: PathBuf) -> Self {
        Self {
            store,
            settings,
            backup_dir,
        }
    }

    /// One backup run: snapshot, stamp, prune.
    ///
    /// The store is closed for the duration of the copy so the on-disk file
    /// is consistent; a failure before the copy finishes leaves no new
    /// artifact behind.
    pub async fn run(&self) -> Result<(), JobError> {
        fs::create_dir_all(&self.backup_dir)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let target = self
            .backup_dir
            .join(format!("{BACKUP_PREFIX}{stamp}{BACKUP_SUFFIX}"));

        self.store
            .with_closed(|db_path| copy_snapshot(db_path, &target))
            .await?;

        self.settings.mark_backup_completed().await?;
        prune_old_backups(&self.backup_dir);

        info!(path = %target.display(), "Backup complete");
        Ok(())
    }
}

/// Copy through a temp file in the same directory so a failed copy never
/// leaves a half-written artifact.
fn copy_snapshot(src: &Path, target: &Path) -> Result<(), DatabaseError> {
    let tmp = target.with_extension("db.tmp");
    let copied = fs::copy(src, &tmp).and_then(|_| fs::rename(&tmp, target));
    if let Err(e) = copied {
        let _ = fs::remove_file(&tmp);
        return Err(DatabaseError::Io(e.to_string()));
    }
    Ok(())
}

/// Delete everything beyond the newest `RETAINED_BACKUPS` artifacts,
/// newest-first by modification time.
fn prune_old_backups(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    let mut backups: Vec<(std::time::SystemTime, PathBuf)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_SUFFIX)) {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.path()))
        })
        .collect();

    backups.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, path) in backups.into_iter().skip(RETAINED_BACKUPS) {
        match fs::remove_file(&path) {
            Ok(()) => info!(path = %path.display(), "Old backup deleted"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete old backup"),
        }
    }
}
