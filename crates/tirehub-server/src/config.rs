//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./data/tirehub.db`
    pub database_path: PathBuf,

    /// Directory receiving `backup_*.json` files, served under `/database`.
    /// Env: `BACKUP_DIR`
    /// Default: `./public/database`
    pub backup_dir: PathBuf,

    /// Directory receiving `orders_archive_*.json` files.
    /// Env: `ARCHIVE_DIR`
    /// Default: `./database/archives`
    pub archive_dir: PathBuf,

    /// Period of the inventory sweep.
    /// Env: `SWEEP_INTERVAL_SECS`
    /// Default: `300`
    pub sweep_interval: Duration,

    /// Local wall-clock time of the daily order archival.
    /// Env: `ARCHIVE_AT` (`HH:MM`)
    /// Default: `02:00`
    pub archive_at: NaiveTime,

    /// Admin API bearer token. Required to access /admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// Largest accepted restore upload in bytes (50 MiB).
    pub max_restore_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: PathBuf::from("./data/tirehub.db"),
            backup_dir: PathBuf::from("./public/database"),
            archive_dir: PathBuf::from("./database/archives"),
            sweep_interval: Duration::from_secs(300),
            archive_at: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or(NaiveTime::MIN),
            admin_token: None,
            max_restore_bytes: 50 * 1024 * 1024, // 50 MiB
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("BACKUP_DIR") {
            config.backup_dir = PathBuf::from(path);
        }

        if let Some(path) = lookup("ARCHIVE_DIR") {
            config.archive_dir = PathBuf::from(path);
        }

        if let Some(val) = lookup("SWEEP_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.sweep_interval = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid SWEEP_INTERVAL_SECS, using default"),
            }
        }

        if let Some(val) = lookup("ARCHIVE_AT") {
            match parse_wall_clock(&val) {
                Ok(at) => config.archive_at = at,
                Err(e) => tracing::warn!(error = %e, "Invalid ARCHIVE_AT, using default"),
            }
        }

        if let Some(token) = lookup("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`) into a wall-clock time.
fn parse_wall_clock(value: &str) -> Result<NaiveTime, String> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|e| format!("expected HH:MM, got {value:?}: {e}"))
}
