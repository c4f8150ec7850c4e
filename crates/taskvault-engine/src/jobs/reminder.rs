//! Reminder job: notify about soon-due tasks.

use std::sync::Arc;

use tracing::{debug, info};

use taskvault_core::db::unix_timestamp;

use crate::notify::Notifier;
use crate::scheduler::JobError;
use crate::settings::SettingsStore;
use crate::storage::Store;

/// Queries for incomplete tasks coming due within the configured horizon and
/// dispatches at most one summary notification per run. An empty result set
/// dispatches nothing.
pub struct ReminderJob {
    store: Store,
    settings: Arc<SettingsStore>,
    notifier: Arc<dyn Notifier>,
}

impl ReminderJob {
    pub fn new(store: Store, settings: Arc<SettingsStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            settings,
            notifier,
        }
    }

    pub async fn run(&self) -> Result<(), JobError> {
        let now = unix_timestamp();
        let horizon_hours = self.settings.notification_time().await;
        let horizon = now + horizon_hours * 3600;

        let upcoming = self.store.list_upcoming_todos(now, horizon).await?;
        if upcoming.is_empty() {
            debug!("No upcoming tasks; reminder suppressed");
            return Ok(());
        }

        info!(count = upcoming.len(), "Dispatching upcoming-task reminder");
        self.notifier.notify(
            "Upcoming Todo Tasks",
            &format!("You have {} upcoming tasks", upcoming.len()),
        );
        Ok(())
    }
}
