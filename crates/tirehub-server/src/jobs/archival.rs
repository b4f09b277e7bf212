//! Daily order archival.
//!
//! Orders older than the retention window are written to an immutable JSON
//! snapshot. Only once that file is on disk and verified are the orders
//! flagged archived and their items deleted, in one store transaction.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tirehub_store::archive::retention_cutoff;
use tirehub_store::convert::truncate_to_millis;
use tirehub_store::{ArchiveSnapshot, AuditStatus, Database};
use tracing::{debug, error, info, warn};

use super::Job;
use crate::db::{self, SharedDb};
use crate::snapshot_dir::SnapshotDir;

pub const ARCHIVE_FILE_PREFIX: &str = "orders_archive";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchivalOutcome {
    /// No active order was older than the cutoff. Nothing was written.
    NothingToArchive,
    Archived {
        file: PathBuf,
        orders: usize,
        items: usize,
    },
}

/// Archive every eligible order as of `now`.
///
/// `now` is truncated to the store's millisecond precision so the snapshot's
/// `archivedAt` matches the `archived_at` written to the orders.
pub fn run_archival_at(
    db: &mut Database,
    dir: &SnapshotDir,
    now: DateTime<Utc>,
) -> anyhow::Result<ArchivalOutcome> {
    let now = truncate_to_millis(now);
    let cutoff = retention_cutoff(now);
    let orders = db
        .find_archivable_orders(cutoff)
        .context("failed to select archivable orders")?;

    if orders.is_empty() {
        debug!(cutoff = %cutoff, "no orders to archive");
        return Ok(ArchivalOutcome::NothingToArchive);
    }

    let snapshot = ArchiveSnapshot::new(now, orders);
    let ids = snapshot.order_ids();
    let count = snapshot.count;

    let file = match dir.write_json(&SnapshotDir::file_name(ARCHIVE_FILE_PREFIX, now), &snapshot) {
        Ok(file) => file,
        Err(e) => {
            record_failure(db, None, count, &e.to_string());
            return Err(e).context("failed to write order archive");
        }
    };
    let file_name = file_name_of(&file);

    let commit = match db.commit_archival(&ids, now) {
        Ok(commit) => commit,
        Err(e) => {
            // The archive must not describe an archival that never happened.
            if let Err(remove_err) = dir.remove(&file_name) {
                error!(file = %file_name, error = %remove_err, "failed to remove orphaned archive");
            }
            record_failure(db, None, count, &e.to_string());
            return Err(e).context("failed to commit archival");
        }
    };

    if let Err(e) = db.record_archive_history(Some(&file_name), count, AuditStatus::Success, None)
    {
        warn!(error = %e, "failed to record archive history");
    }

    Ok(ArchivalOutcome::Archived {
        file,
        orders: commit.orders_archived,
        items: commit.items_deleted,
    })
}

fn record_failure(db: &Database, file_name: Option<&str>, count: usize, reason: &str) {
    if let Err(e) = db.record_archive_history(file_name, count, AuditStatus::Failed, Some(reason)) {
        warn!(error = %e, "failed to record archive history");
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct ArchivalJob {
    db: SharedDb,
    dir: SnapshotDir,
}

impl ArchivalJob {
    pub fn new(db: SharedDb, dir: SnapshotDir) -> Self {
        Self { db, dir }
    }
}

impl Job for ArchivalJob {
    fn name(&self) -> &'static str {
        "order-archival"
    }

    fn run(&self) -> anyhow::Result<()> {
        let mut db = db::lock(&self.db)?;
        match run_archival_at(&mut db, &self.dir, Utc::now())? {
            ArchivalOutcome::NothingToArchive => info!("no orders due for archival"),
            ArchivalOutcome::Archived {
                file,
                orders,
                items,
            } => info!(file = %file.display(), orders, items, "orders archived"),
        }
        Ok(())
    }
}
