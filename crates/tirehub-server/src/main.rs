//! # tirehub-server
//!
//! Back-office service for the tirehub storefront.
//!
//! This binary provides:
//! - **Inventory sweep** that keeps every inventory record's stock status in
//!   line with its quantity (at startup, then every few minutes)
//! - **Order archival** that moves orders older than the retention window
//!   into immutable JSON archives once a day
//! - **Backup/restore** of the catalog and order tables as JSON, with an
//!   audit trail
//! - **REST API** (axum) for health checks and the admin backup surface

mod api;
mod backup;
mod config;
mod db;
mod error;
mod jobs;
mod scheduler;
mod snapshot_dir;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::backup::BackupService;
use crate::config::ServerConfig;
use crate::jobs::{ArchivalJob, SweepJob};
use crate::scheduler::{Schedule, Scheduler};
use crate::snapshot_dir::SnapshotDir;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,tirehub_server=debug,tirehub_store=debug")
            }),
        )
        .init();

    info!("Starting tirehub back-office server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        http_addr = %config.http_addr,
        database = %config.database_path.display(),
        backup_dir = %config.backup_dir.display(),
        archive_dir = %config.archive_dir.display(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        archive_at = %config.archive_at,
        admin_enabled = config.admin_token.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Open the store (runs migrations)
    // -----------------------------------------------------------------------
    let shared_db = db::open_shared(&config.database_path)?;

    let app_state = AppState {
        backup: BackupService::new(shared_db.clone(), SnapshotDir::new(&config.backup_dir)),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Start background jobs
    // -----------------------------------------------------------------------
    let scheduler = Scheduler::new()
        .add(
            SweepJob::new(shared_db.clone()),
            Schedule::Every {
                period: config.sweep_interval,
                run_at_startup: true,
            },
        )
        .add(
            ArchivalJob::new(shared_db, SnapshotDir::new(&config.archive_dir)),
            Schedule::DailyAt(config.archive_at),
        )
        .start();

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let result = tokio::select! {
        result = api::serve(app_state, config.http_addr) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    scheduler.shutdown();

    if let Err(ref e) = result {
        tracing::error!(error = %e, "HTTP server failed");
    }
    result
}
