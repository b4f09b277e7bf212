//! # tirehub-store
//!
//! Back-office storage for the tirehub storefront, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model, the stock status evaluator, the order archival queries and the
//! table registry behind full backups.

pub mod archive;
pub mod audit;
pub mod backup;
pub mod catalog;
pub mod content;
pub mod convert;
pub mod database;
pub mod inventory;
pub mod migrations;
pub mod models;
pub mod orders;
pub mod stock;
pub mod table;
pub mod users;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fixtures;

mod error;

pub use archive::{ArchiveSnapshot, ORDER_RETENTION_DAYS};
pub use backup::{to_restore_payload, BackupPayload, ImportStats, RestorePayload, TableRegistry};
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use stock::{evaluate, StockStatus};
