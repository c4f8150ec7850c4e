//! Named periodic background jobs.
//!
//! The scheduler guarantees at most one active registration per job name
//! and that two firings of the same name never overlap. Registrations are
//! persisted to the `scheduled_jobs` table so schedule anchors survive a
//! restart; the loops themselves are in-process spawned tasks.

mod constraints;

pub use constraints::{Constraints, HostStatus, SharedHostStatus, StaticHostStatus};

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use taskvault_core::db::{unix_timestamp, unix_timestamp_millis};

use crate::settings::SettingsError;
use crate::storage::{DatabaseError, JobRecord, Store};

/// Error produced by a job body. Caught at the job boundary; the periodic
/// cadence is the retry mechanism, no backoff is layered on top.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from scheduling operations themselves.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid job spec: {0}")]
    InvalidSpec(String),
}

/// What to do when a name already has an active registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingJobPolicy {
    /// Merge the new cadence/constraints into the registration, keeping its
    /// schedule anchor.
    Update,
    /// Drop the old registration and start a fresh schedule.
    Replace,
}

impl ExistingJobPolicy {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Replace => "replace",
        }
    }
}

/// Cadence and gating for one named periodic job.
///
/// The job may fire anywhere in the trailing `flex` window of each
/// `interval`; the loop wakes at the start of that window, and exact firing
/// time is a hint rather than a guarantee.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub interval: Duration,
    pub flex: Duration,
    pub constraints: Constraints,
}

impl JobSpec {
    /// Spec with no flex window and no constraints.
    pub fn every(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            flex: Duration::ZERO,
            constraints: Constraints::default(),
        }
    }
}

pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>>;
pub type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

struct ActiveJob {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Process-wide registry of named periodic jobs.
pub struct Scheduler {
    store: Store,
    host: Arc<dyn HostStatus>,
    jobs: Mutex<HashMap<String, ActiveJob>>,
}

impl Scheduler {
    pub fn new(store: Store, host: Arc<dyn HostStatus>) -> Self {
        Self {
            store,
            host,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Register (or re-register) a periodic job under its unique name.
    ///
    /// With [`ExistingJobPolicy::Update`] a previous registration's schedule
    /// anchor is preserved, in memory or from the persisted table of an
    /// earlier process. [`ExistingJobPolicy::Replace`] anchors the schedule
    /// at now. Either way the outgoing loop is wound down (its in-flight
    /// firing included) before the new loop starts, so two firings of one
    /// name never run concurrently.
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub async fn schedule_periodic(
        &self,
        spec: JobSpec,
        policy: ExistingJobPolicy,
        job: JobFn,
    ) -> Result<(), SchedulerError> {
        if spec.interval.is_zero() {
            return Err(SchedulerError::InvalidSpec(
                "interval must be non-zero".into(),
            ));
        }
        if spec.flex >= spec.interval {
            return Err(SchedulerError::InvalidSpec(
                "flex window must be shorter than the interval".into(),
            ));
        }

        let now = unix_timestamp();
        let now_ms = unix_timestamp_millis();

        let previous = self.store.get_job(&spec.name).await?;
        let anchor_ms = match (policy, &previous) {
            (ExistingJobPolicy::Update, Some(record)) => record.anchor_ms,
            _ => now_ms,
        };

        let record = JobRecord {
            name: spec.name.clone(),
            interval_ms: spec.interval.as_millis() as i64,
            flex_ms: spec.flex.as_millis() as i64,
            battery_not_low: spec.constraints.battery_not_low,
            device_idle: spec.constraints.device_idle,
            network_required: spec.constraints.network_required,
            policy: policy.as_str().to_string(),
            anchor_ms,
            created_at: previous.as_ref().map_or(now, |r| r.created_at),
            updated_at: now,
            last_run_at: previous.as_ref().and_then(|r| r.last_run_at),
            last_outcome: previous.as_ref().and_then(|r| r.last_outcome.clone()),
        };
        self.store.save_job(&record).await?;

        // Wind down any old loop first; uniqueness by name is the contract.
        let replaced = self.jobs.lock().await.remove(&spec.name);
        if let Some(old) = replaced {
            let _ = old.stop.send(true);
            let _ = old.task.await;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = spawn_job_loop(
            self.store.clone(),
            Arc::clone(&self.host),
            spec.clone(),
            anchor_ms,
            job,
            stop_rx,
        );

        self.jobs
            .lock()
            .await
            .insert(spec.name.clone(), ActiveJob { stop: stop_tx, task });

        info!(
            name = %spec.name,
            interval_ms = spec.interval.as_millis() as i64,
            flex_ms = spec.flex.as_millis() as i64,
            policy = policy.as_str(),
            "Periodic job scheduled"
        );
        Ok(())
    }

    /// Deregister `name`. No-op when not registered; an in-flight firing is
    /// allowed to complete, but no new firing happens.
    pub async fn cancel(&self, name: &str) -> Result<(), SchedulerError> {
        if let Some(job) = self.jobs.lock().await.remove(name) {
            let _ = job.stop.send(true);
            info!(name, "Periodic job cancelled");
        }
        self.store.delete_job(name).await?;
        Ok(())
    }

    /// Names with an active in-process loop.
    pub async fn active_jobs(&self) -> Vec<String> {
        self.jobs.lock().await.keys().cloned().collect()
    }

    /// Stop every loop, waiting for in-flight firings. Registrations stay
    /// persisted for the next process.
    pub async fn shutdown(&self) {
        let jobs: Vec<(String, ActiveJob)> = self.jobs.lock().await.drain().collect();
        for (name, job) in jobs {
            let _ = job.stop.send(true);
            let _ = job.task.await;
            debug!(name, "Job loop stopped");
        }
    }
}

fn spawn_job_loop(
    store: Store,
    host: Arc<dyn HostStatus>,
    spec: JobSpec,
    anchor_ms: i64,
    job: JobFn,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let delay = next_firing_delay(anchor_ms, spec.interval, spec.flex, unix_timestamp_millis());
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = stop.changed() => {
                    debug!(name = %spec.name, "Job loop stopping");
                    return;
                }
            }

            if !spec.constraints.satisfied_by(host.as_ref()) {
                debug!(name = %spec.name, "Constraints unmet; firing deferred to next boundary");
                continue;
            }

            let started = unix_timestamp();
            let outcome = match job().await {
                Ok(()) => "success",
                Err(e) => {
                    warn!(name = %spec.name, error = %e, "Job run failed");
                    "failure"
                }
            };

            if let Err(e) = store.record_job_outcome(&spec.name, started, outcome).await {
                warn!(name = %spec.name, error = %e, "Failed to record job outcome");
            }
        }
    })
}

/// Delay until the next firing point: the start of the trailing flex window
/// of the first boundary whose firing point is still in the future.
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn next_firing_delay(anchor_ms: i64, interval: Duration, flex: Duration, now_ms: i64) -> Duration {
    let interval_ms = interval.as_millis() as i64;
    let flex_ms = flex.as_millis() as i64;

    let elapsed = now_ms - anchor_ms;
    let mut k = if elapsed < 0 { 1 } else { elapsed / interval_ms + 1 };
    loop {
        let fire_at = anchor_ms + k * interval_ms - flex_ms;
        if fire_at > now_ms {
            return Duration::from_millis((fire_at - now_ms) as u64);
        }
        k += 1;
    }
}
