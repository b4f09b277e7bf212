//! CRUD operations for [`InventoryRecord`] records.
//!
//! Quantity edits never touch `status`; the inventory sweep owns that column.

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::convert::{ts_from_db, ts_to_db, uuid_from_db};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::InventoryRecord;
use crate::table::Table;

const COLUMNS: &str =
    "id, product_id, quantity, min_stock, max_stock, sku, status, created_at, updated_at";

/// The columns the inventory sweep needs, with the stored status kept as raw
/// text so unrecognised values can be corrected rather than failing the read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub id: Uuid,
    pub quantity: i64,
    pub min_stock: i64,
    pub status: String,
}

impl Database {
    pub fn create_inventory(&self, record: &InventoryRecord) -> Result<()> {
        InventoryRecord::insert(self.conn(), record)
    }

    pub fn get_inventory(&self, id: Uuid) -> Result<InventoryRecord> {
        self.conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM inventory WHERE id = ?1"),
                params![id.to_string()],
                row_to_inventory,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn list_inventory(&self) -> Result<Vec<InventoryRecord>> {
        InventoryRecord::select_all(self.conn())
    }

    /// Quantity, threshold and stored status of every inventory record.
    pub fn list_stock_levels(&self) -> Result<Vec<StockLevel>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, quantity, min_stock, status FROM inventory ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let id_str: String = row.get(0)?;
            Ok(StockLevel {
                id: uuid_from_db(0, &id_str)?,
                quantity: row.get(1)?,
                min_stock: row.get(2)?,
                status: row.get(3)?,
            })
        })?;

        let mut levels = Vec::new();
        for row in rows {
            levels.push(row?);
        }
        Ok(levels)
    }

    /// Persist a recomputed status.  Returns `true` if a row was updated.
    pub fn set_inventory_status(&self, id: Uuid, status: crate::StockStatus) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE inventory SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, ts_to_db(&Utc::now()), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Manual admin edit of the on-hand quantity.
    pub fn set_inventory_quantity(&self, id: Uuid, quantity: i64) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE inventory SET quantity = ?1, updated_at = ?2 WHERE id = ?3",
            params![quantity, ts_to_db(&Utc::now()), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Apply a fulfilment delta (negative when stock ships).  The quantity
    /// never drops below zero.
    pub fn adjust_inventory_quantity(&self, id: Uuid, delta: i64) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE inventory SET quantity = MAX(quantity + ?1, 0), updated_at = ?2 WHERE id = ?3",
            params![delta, ts_to_db(&Utc::now()), id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

impl Table for InventoryRecord {
    const NAME: &'static str = "inventory";

    fn id(&self) -> Uuid {
        self.id
    }

    fn select_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM inventory ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_inventory)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    fn insert(conn: &Connection, record: &Self) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO inventory ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                record.id.to_string(),
                record.product_id.to_string(),
                record.quantity,
                record.min_stock,
                record.max_stock,
                record.sku,
                record.status,
                ts_to_db(&record.created_at),
                ts_to_db(&record.updated_at),
            ],
        )?;
        Ok(())
    }

    fn upsert(conn: &Connection, record: &Self) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO inventory ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    product_id = excluded.product_id,
                    quantity = excluded.quantity,
                    min_stock = excluded.min_stock,
                    max_stock = excluded.max_stock,
                    sku = excluded.sku,
                    status = excluded.status,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at"
            ),
            params![
                record.id.to_string(),
                record.product_id.to_string(),
                record.quantity,
                record.min_stock,
                record.max_stock,
                record.sku,
                record.status,
                ts_to_db(&record.created_at),
                ts_to_db(&record.updated_at),
            ],
        )?;
        Ok(())
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.quantity < 0 {
            return Err(format!("quantity must be >= 0, got {}", self.quantity));
        }
        if self.min_stock < 0 {
            return Err(format!("minStock must be >= 0, got {}", self.min_stock));
        }
        Ok(())
    }
}

fn row_to_inventory(row: &rusqlite::Row<'_>) -> rusqlite::Result<InventoryRecord> {
    let id_str: String = row.get(0)?;
    let product_id_str: String = row.get(1)?;
    let created_str: String = row.get(7)?;
    let updated_str: String = row.get(8)?;

    Ok(InventoryRecord {
        id: uuid_from_db(0, &id_str)?,
        product_id: uuid_from_db(1, &product_id_str)?,
        quantity: row.get(2)?,
        min_stock: row.get(3)?,
        max_stock: row.get(4)?,
        sku: row.get(5)?,
        status: row.get(6)?,
        created_at: ts_from_db(7, &created_str)?,
        updated_at: ts_from_db(8, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::StockStatus;

    fn stocked(db: &Database, quantity: i64, min_stock: i64) -> InventoryRecord {
        let brand = fixtures::brand("Goodyear");
        db.create_brand(&brand).unwrap();
        let product = fixtures::product(brand.id, "Eagle F1");
        db.create_product(&product).unwrap();
        let record = fixtures::inventory(product.id, quantity, min_stock);
        db.create_inventory(&record).unwrap();
        record
    }

    #[test]
    fn quantity_edit_leaves_status_alone() {
        let (db, _dir) = fixtures::test_db();
        let record = stocked(&db, 10, 5);

        assert!(db.set_inventory_quantity(record.id, 0).unwrap());

        let stored = db.get_inventory(record.id).unwrap();
        assert_eq!(stored.quantity, 0);
        assert_eq!(stored.status, StockStatus::InStock);
    }

    #[test]
    fn adjust_clamps_at_zero() {
        let (db, _dir) = fixtures::test_db();
        let record = stocked(&db, 3, 1);

        db.adjust_inventory_quantity(record.id, -10).unwrap();
        assert_eq!(db.get_inventory(record.id).unwrap().quantity, 0);

        db.adjust_inventory_quantity(record.id, 4).unwrap();
        assert_eq!(db.get_inventory(record.id).unwrap().quantity, 4);
    }

    #[test]
    fn negative_quantity_is_rejected_by_schema() {
        let (db, _dir) = fixtures::test_db();
        let record = stocked(&db, 3, 1);
        assert!(db.set_inventory_quantity(record.id, -1).is_err());
    }

    #[test]
    fn stock_levels_expose_raw_status() {
        let (db, _dir) = fixtures::test_db();
        let record = stocked(&db, 3, 1);
        db.conn()
            .execute(
                "UPDATE inventory SET status = 'legacy' WHERE id = ?1",
                params![record.id.to_string()],
            )
            .unwrap();

        let levels = db.list_stock_levels().unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].status, "legacy");
    }

    #[test]
    fn set_status_reports_missing_row() {
        let (db, _dir) = fixtures::test_db();
        assert!(!db
            .set_inventory_status(Uuid::new_v4(), StockStatus::LowStock)
            .unwrap());
    }
}
