//! Background jobs and the settings-driven glue that keeps them scheduled.

mod backup;
mod reminder;

pub use backup::BackupJob;
pub use reminder::ReminderJob;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::notify::Notifier;
use crate::scheduler::{
    Constraints, ExistingJobPolicy, JobFn, JobFuture, JobSpec, Scheduler, SchedulerError,
};
use crate::settings::{Settings, SettingsStore};
use crate::storage::Store;

/// Unique name of the reminder job.
pub const NOTIFICATION_JOB: &str = "todo_notification_work";
/// Unique name of the backup job.
pub const BACKUP_JOB: &str = "todo_backup_work";

const REMINDER_INTERVAL: Duration = Duration::from_secs(60 * 60);
const REMINDER_FLEX: Duration = Duration::from_secs(15 * 60);

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn reminder_spec() -> JobSpec {
    JobSpec {
        name: NOTIFICATION_JOB.to_string(),
        interval: REMINDER_INTERVAL,
        flex: REMINDER_FLEX,
        constraints: Constraints {
            battery_not_low: true,
            device_idle: false,
            network_required: false,
        },
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn backup_spec(frequency_days: i64) -> JobSpec {
    JobSpec {
        name: BACKUP_JOB.to_string(),
        interval: DAY * frequency_days.max(1) as u32,
        flex: Duration::ZERO,
        constraints: Constraints {
            battery_not_low: true,
            device_idle: true,
            network_required: false,
        },
    }
}

/// Wires the reminder and backup jobs to the scheduler and keeps their
/// registrations in sync with the settings store.
#[derive(Clone)]
pub struct JobCoordinator {
    scheduler: Arc<Scheduler>,
    store: Store,
    settings: Arc<SettingsStore>,
    notifier: Arc<dyn Notifier>,
    backup_dir: PathBuf,
}

impl JobCoordinator {
    pub fn new(
        scheduler: Arc<Scheduler>,
        store: Store,
        settings: Arc<SettingsStore>,
        notifier: Arc<dyn Notifier>,
        backup_dir: PathBuf,
    ) -> Self {
        Self {
            scheduler,
            store,
            settings,
            notifier,
            backup_dir,
        }
    }

    fn reminder_fn(&self) -> JobFn {
        let job = Arc::new(ReminderJob::new(
            self.store.clone(),
            Arc::clone(&self.settings),
            Arc::clone(&self.notifier),
        ));
        Arc::new(move || {
            let job = Arc::clone(&job);
            let fut: JobFuture = Box::pin(async move { job.run().await });
            fut
        })
    }

    fn backup_fn(&self) -> JobFn {
        let job = Arc::new(BackupJob::new(
            self.store.clone(),
            Arc::clone(&self.settings),
            self.backup_dir.clone(),
        ));
        Arc::new(move || {
            let job = Arc::clone(&job);
            let fut: JobFuture = Box::pin(async move { job.run().await });
            fut
        })
    }

    /// Register the recurring jobs at engine startup, honoring the current
    /// preferences. Uses the update policy so a restart never resets a live
    /// schedule anchor.
    pub async fn register_startup_jobs(&self) -> Result<(), SchedulerError> {
        let settings = self.settings.snapshot().await;

        if settings.notifications_enabled {
            self.scheduler
                .schedule_periodic(reminder_spec(), ExistingJobPolicy::Update, self.reminder_fn())
                .await?;
        }

        if settings.auto_backup_enabled {
            self.scheduler
                .schedule_periodic(
                    backup_spec(settings.backup_frequency),
                    ExistingJobPolicy::Update,
                    self.backup_fn(),
                )
                .await?;
        }

        Ok(())
    }

    /// Re-apply job registrations after a settings change.
    ///
    /// Toggling a feature off cancels its job; toggling it on (or changing
    /// its cadence) reschedules under the same unique name with the replace
    /// policy, so the new cadence starts a fresh schedule.
    pub async fn apply_settings_change(
        &self,
        previous: &Settings,
        current: &Settings,
    ) -> Result<(), SchedulerError> {
        let reminder_toggled = current.notifications_enabled != previous.notifications_enabled;
        let reminder_retimed = current.notifications_enabled
            && current.notification_time != previous.notification_time;

        if reminder_toggled || reminder_retimed {
            if current.notifications_enabled {
                self.scheduler
                    .schedule_periodic(
                        reminder_spec(),
                        ExistingJobPolicy::Replace,
                        self.reminder_fn(),
                    )
                    .await?;
            } else {
                self.scheduler.cancel(NOTIFICATION_JOB).await?;
            }
        }

        let backup_toggled = current.auto_backup_enabled != previous.auto_backup_enabled;
        let backup_retimed =
            current.auto_backup_enabled && current.backup_frequency != previous.backup_frequency;

        if backup_toggled || backup_retimed {
            if current.auto_backup_enabled {
                self.scheduler
                    .schedule_periodic(
                        backup_spec(current.backup_frequency),
                        ExistingJobPolicy::Replace,
                        self.backup_fn(),
                    )
                    .await?;
            } else {
                self.scheduler.cancel(BACKUP_JOB).await?;
            }
        }

        Ok(())
    }

    /// Follow the settings stream and re-apply registrations on every change
    /// until `shutdown` flips.
    ///
    /// The subscription is taken before the future is returned, so changes
    /// written between this call and the task actually running are not lost.
    pub fn watch_settings(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let coordinator = self.clone();
        let mut rx = self.settings.subscribe();

        async move {
            let mut previous = rx.borrow().clone();

            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let current = rx.borrow().clone();
                        if let Err(e) = coordinator.apply_settings_change(&previous, &current).await {
                            error!(error = %e, "Failed to re-apply job registrations");
                        }
                        previous = current;
                    }
                    _ = shutdown.changed() => {
                        info!("Settings watcher stopping");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::ChannelNotifier;
    use crate::scheduler::StaticHostStatus;

    async fn fixture() -> (JobCoordinator, Arc<Scheduler>, Arc<SettingsStore>, Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("todo.db")).await.unwrap();
        let settings = Arc::new(SettingsStore::open(dir.path()).unwrap());
        let host = Arc::new(StaticHostStatus::permissive());
        let scheduler = Arc::new(Scheduler::new(store.clone(), host));
        let (notifier, _rx) = ChannelNotifier::new();

        let coordinator = JobCoordinator::new(
            Arc::clone(&scheduler),
            store.clone(),
            Arc::clone(&settings),
            Arc::new(notifier),
            dir.path().join("backups"),
        );
        (coordinator, scheduler, settings, store, dir)
    }

    #[tokio::test]
    async fn startup_respects_preferences() {
        let (coordinator, scheduler, settings, _store, _dir) = fixture().await;

        // Everything disabled: nothing scheduled.
        coordinator.register_startup_jobs().await.unwrap();
        assert!(scheduler.active_jobs().await.is_empty());

        settings.set_notifications_enabled(true).await.unwrap();
        settings.set_auto_backup_enabled(true).await.unwrap();

        coordinator.register_startup_jobs().await.unwrap();
        let mut active = scheduler.active_jobs().await;
        active.sort();
        assert_eq!(active, vec![BACKUP_JOB.to_string(), NOTIFICATION_JOB.to_string()]);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn frequency_change_reschedules_same_name() {
        let (coordinator, scheduler, settings, store, _dir) = fixture().await;

        settings.set_auto_backup_enabled(true).await.unwrap();
        coordinator.register_startup_jobs().await.unwrap();

        let before = store.get_job(BACKUP_JOB).await.unwrap().unwrap();
        assert_eq!(before.interval_ms, 7 * 24 * 3600 * 1000);

        let previous = settings.snapshot().await;
        settings.set_backup_frequency(1).await.unwrap();
        let current = settings.snapshot().await;
        coordinator.apply_settings_change(&previous, &current).await.unwrap();

        // Same unique name, new cadence, still exactly one registration.
        assert_eq!(scheduler.active_jobs().await, vec![BACKUP_JOB.to_string()]);
        let after = store.get_job(BACKUP_JOB).await.unwrap().unwrap();
        assert_eq!(after.interval_ms, 24 * 3600 * 1000);
        assert_eq!(store.list_jobs().await.unwrap().len(), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn toggling_off_cancels_jobs() {
        let (coordinator, scheduler, settings, store, _dir) = fixture().await;

        settings.set_notifications_enabled(true).await.unwrap();
        coordinator.register_startup_jobs().await.unwrap();
        assert_eq!(scheduler.active_jobs().await, vec![NOTIFICATION_JOB.to_string()]);

        let previous = settings.snapshot().await;
        settings.set_notifications_enabled(false).await.unwrap();
        let current = settings.snapshot().await;
        coordinator.apply_settings_change(&previous, &current).await.unwrap();

        assert!(scheduler.active_jobs().await.is_empty());
        assert!(store.get_job(NOTIFICATION_JOB).await.unwrap().is_none());

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn watch_settings_applies_changes() {
        let (coordinator, scheduler, settings, _store, _dir) = fixture().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let watcher = tokio::spawn(coordinator.watch_settings(shutdown_rx));

        settings.set_notifications_enabled(true).await.unwrap();

        // Give the watcher a beat to react.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.active_jobs().await, vec![NOTIFICATION_JOB.to_string()]);

        let _ = shutdown_tx.send(true);
        watcher.await.unwrap();
        scheduler.shutdown().await;
    }
}
