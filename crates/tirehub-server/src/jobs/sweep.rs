//! Periodic inventory status sweep.
//!
//! Recomputes every inventory record's status from its quantity and
//! threshold and writes back only the records whose status changed.

use anyhow::Context;
use tirehub_store::{evaluate, Database};
use tracing::{debug, info, warn};

use super::Job;
use crate::db::{self, SharedDb};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub updated: usize,
    pub failed: usize,
}

/// One pass over the inventory table.
///
/// A failed write is logged and counted; the remaining records are still
/// processed. Only reading the table can fail the whole pass.
pub fn run_sweep(db: &Database) -> tirehub_store::Result<SweepReport> {
    let levels = db.list_stock_levels()?;
    let mut report = SweepReport {
        scanned: levels.len(),
        ..SweepReport::default()
    };

    for level in levels {
        let computed = evaluate(level.quantity, level.min_stock);
        if level.status == computed.as_str() {
            continue;
        }

        match db.set_inventory_status(level.id, computed) {
            Ok(true) => {
                debug!(
                    inventory_id = %level.id,
                    from = %level.status,
                    to = %computed,
                    "inventory status changed"
                );
                report.updated += 1;
            }
            // Deleted between the read and the write.
            Ok(false) => {}
            Err(e) => {
                warn!(inventory_id = %level.id, error = %e, "failed to update inventory status");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

pub struct SweepJob {
    db: SharedDb,
}

impl SweepJob {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }
}

impl Job for SweepJob {
    fn name(&self) -> &'static str {
        "inventory-sweep"
    }

    fn run(&self) -> anyhow::Result<()> {
        let db = db::lock(&self.db)?;
        let report = run_sweep(&db).context("inventory sweep failed")?;
        info!(
            scanned = report.scanned,
            updated = report.updated,
            failed = report.failed,
            "inventory sweep finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tirehub_store::fixtures;
    use tirehub_store::StockStatus;

    fn seed_product(db: &Database) -> uuid::Uuid {
        let brand = fixtures::brand("Yokohama");
        let product = fixtures::product(brand.id, "Advan Sport");
        db.create_brand(&brand).unwrap();
        db.create_product(&product).unwrap();
        product.id
    }

    #[test]
    fn test_sweep_scenarios() {
        let (db, _dir) = fixtures::test_db();
        let product_id = seed_product(&db);

        let out = fixtures::inventory(product_id, 0, 5);
        let low = fixtures::inventory(product_id, 3, 5);
        let healthy = fixtures::inventory(product_id, 10, 5);
        for record in [&out, &low, &healthy] {
            db.create_inventory(record).unwrap();
        }

        let report = run_sweep(&db).unwrap();
        assert_eq!(
            report,
            SweepReport {
                scanned: 3,
                updated: 2,
                failed: 0
            }
        );

        assert_eq!(db.get_inventory(out.id).unwrap().status, StockStatus::OutOfStock);
        assert_eq!(db.get_inventory(low.id).unwrap().status, StockStatus::LowStock);
        assert_eq!(db.get_inventory(healthy.id).unwrap().status, StockStatus::InStock);
    }

    #[test]
    fn test_second_sweep_writes_nothing() {
        let (db, _dir) = fixtures::test_db();
        let product_id = seed_product(&db);
        let record = fixtures::inventory(product_id, 2, 5);
        db.create_inventory(&record).unwrap();

        assert_eq!(run_sweep(&db).unwrap().updated, 1);
        let stamped = db.get_inventory(record.id).unwrap().updated_at;

        let second = run_sweep(&db).unwrap();
        assert_eq!(second.updated, 0);
        assert_eq!(db.get_inventory(record.id).unwrap().updated_at, stamped);
    }

    #[test]
    fn test_sweep_follows_quantity_changes() {
        let (db, _dir) = fixtures::test_db();
        let product_id = seed_product(&db);
        let record = fixtures::inventory(product_id, 10, 5);
        db.create_inventory(&record).unwrap();

        db.adjust_inventory_quantity(record.id, -25).unwrap();
        // Status is stale until the next sweep.
        assert_eq!(db.get_inventory(record.id).unwrap().status, StockStatus::InStock);

        run_sweep(&db).unwrap();
        let swept = db.get_inventory(record.id).unwrap();
        assert_eq!(swept.quantity, 0);
        assert_eq!(swept.status, StockStatus::OutOfStock);
    }

    #[test]
    fn test_failed_record_does_not_stop_batch() {
        let (db, _dir) = fixtures::test_db();
        let product_id = seed_product(&db);
        let broken = fixtures::inventory(product_id, 0, 5);
        let fine = fixtures::inventory(product_id, 1, 5);
        db.create_inventory(&broken).unwrap();
        db.create_inventory(&fine).unwrap();

        db.conn()
            .execute_batch(&format!(
                "CREATE TRIGGER reject_status BEFORE UPDATE OF status ON inventory
                 WHEN OLD.id = '{}'
                 BEGIN SELECT RAISE(ABORT, 'status locked'); END;",
                broken.id
            ))
            .unwrap();

        let report = run_sweep(&db).unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(db.get_inventory(fine.id).unwrap().status, StockStatus::LowStock);
        assert_eq!(db.get_inventory(broken.id).unwrap().status, StockStatus::InStock);
    }

    #[test]
    fn test_job_runs_against_shared_db() {
        let (db, _dir) = fixtures::test_db();
        let product_id = seed_product(&db);
        let record = fixtures::inventory(product_id, 0, 0);
        db.create_inventory(&record).unwrap();

        let shared = Arc::new(Mutex::new(db));
        let job = SweepJob::new(shared.clone());
        job.run().unwrap();

        let db = shared.lock().unwrap();
        assert_eq!(db.get_inventory(record.id).unwrap().status, StockStatus::OutOfStock);
    }
}
