//! taskvault engine daemon
//!
//! Opens the task store and settings, registers the recurring reminder and
//! backup jobs, and keeps their registrations in sync with preference
//! changes until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use taskvault_engine::jobs::JobCoordinator;
use taskvault_engine::notify::{LogNotifier, Notifier};
use taskvault_engine::scheduler::{HostStatus, Scheduler, StaticHostStatus};
use taskvault_engine::settings::SettingsStore;
use taskvault_engine::storage::Store;

#[derive(Parser, Debug)]
#[command(name = "taskvault-engine")]
#[command(version, about = "taskvault engine - task store and background jobs")]
struct Args {
    /// Data directory for the database, settings, and backups
    #[arg(long, env = "TASKVAULT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Database file path (defaults to <data-dir>/todo.db)
    #[arg(long, env = "TASKVAULT_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Log level filter for the engine (e.g. "info", "debug", "warn")
    #[arg(long, default_value = "info", env = "TASKVAULT_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation)
    #[arg(long, env = "TASKVAULT_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    taskvault_core::tracing_init::init_tracing(
        &format!("taskvault_engine={}", args.log_level),
        args.log_json,
    );

    let data_dir = args
        .data_dir
        .or_else(|| dirs::data_dir().map(|d| d.join("taskvault")))
        .ok_or_else(|| anyhow::anyhow!("cannot determine a data directory; pass --data-dir"))?;
    let db_path = args.db_path.unwrap_or_else(|| data_dir.join("todo.db"));

    let store = Store::open(&db_path).await?;
    let settings = Arc::new(SettingsStore::open(&data_dir)?);

    // Headless hosts are always "plugged in and idle"; embedders with real
    // battery/idle probes inject their own HostStatus.
    let host: Arc<dyn HostStatus> = Arc::new(StaticHostStatus::permissive());
    let scheduler = Arc::new(Scheduler::new(store.clone(), host));
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let coordinator = JobCoordinator::new(
        Arc::clone(&scheduler),
        store,
        Arc::clone(&settings),
        notifier,
        data_dir.join("backups"),
    );
    coordinator.register_startup_jobs().await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let settings_watcher = tokio::spawn(coordinator.watch_settings(shutdown_rx));

    info!(data_dir = %data_dir.display(), "taskvault engine running; Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    let _ = settings_watcher.await;
    scheduler.shutdown().await;

    Ok(())
}
