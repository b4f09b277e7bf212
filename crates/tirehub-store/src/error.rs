use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// JSON (de)serialization error while dumping or restoring rows.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A restore row failed shape or value validation.
    #[error("Invalid row {index} in table '{table}': {reason}")]
    InvalidRow {
        table: &'static str,
        index: usize,
        reason: String,
    },

    /// A known table in a restore payload is neither an array nor `null`.
    #[error("Invalid table '{table}': {reason}")]
    InvalidTable {
        table: &'static str,
        reason: String,
    },

    /// The rows changed underneath a multi-step write; nothing was committed.
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
