//! Table registry used for full-database backup and restore.
//!
//! A backup is a JSON object keyed by table name, each value the table's
//! rows as the typed models serialize them.  Restore accepts any JSON object:
//! keys outside the backup set are skipped whatever their value, and known
//! tables may be `null`.  Every row of every known table is validated before
//! anything is written, then the rows are upserted in a single transaction in
//! dependency order.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Brand, Faq, InventoryRecord, Order, OrderItem, Product, Promotion, User};
use crate::table::Table;

/// Full backup payload: table name to rows.
pub type BackupPayload = BTreeMap<String, Vec<Value>>;

/// Restore input as received: any JSON object keyed by table name.
pub type RestorePayload = serde_json::Map<String, Value>;

/// A dumped backup in restore form.
pub fn to_restore_payload(payload: &BackupPayload) -> RestorePayload {
    payload
        .iter()
        .map(|(name, rows)| (name.clone(), Value::Array(rows.clone())))
        .collect()
}

/// Type-erased access to one table of the backup set.
pub trait TableHandle: Send + Sync {
    fn name(&self) -> &'static str;

    fn dump(&self, conn: &Connection) -> Result<Vec<Value>>;

    /// Check every row without writing.
    fn validate(&self, rows: &[Value]) -> Result<()>;

    /// Write every row, returning how many were upserted by id and how many
    /// were inserted with a fresh id.
    fn restore(&self, conn: &Connection, rows: &[Value]) -> Result<(usize, usize)>;
}

struct Handle<T>(PhantomData<fn() -> T>);

impl<T: Table> Handle<T> {
    /// Turn a raw row into a model.  Rows without an `id` get a fresh one;
    /// the returned flag tells whether the row carried its own id.
    fn prepare(index: usize, row: &Value) -> Result<(T, bool)> {
        let invalid = |reason: String| StoreError::InvalidRow {
            table: T::NAME,
            index,
            reason,
        };

        let mut object = row
            .as_object()
            .cloned()
            .ok_or_else(|| invalid("row is not a JSON object".into()))?;

        let has_id = object.get("id").is_some_and(|id| !id.is_null());
        if !has_id {
            object.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }

        let model: T =
            serde_json::from_value(Value::Object(object)).map_err(|e| invalid(e.to_string()))?;
        model.check().map_err(invalid)?;

        Ok((model, has_id))
    }
}

impl<T: Table> TableHandle for Handle<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn dump(&self, conn: &Connection) -> Result<Vec<Value>> {
        T::select_all(conn)?
            .iter()
            .map(|row| serde_json::to_value(row).map_err(StoreError::from))
            .collect()
    }

    fn validate(&self, rows: &[Value]) -> Result<()> {
        for (index, row) in rows.iter().enumerate() {
            Self::prepare(index, row)?;
        }
        Ok(())
    }

    fn restore(&self, conn: &Connection, rows: &[Value]) -> Result<(usize, usize)> {
        let (mut upserted, mut inserted) = (0, 0);
        for (index, row) in rows.iter().enumerate() {
            let (model, has_id) = Self::prepare(index, row)?;
            if has_id {
                T::upsert(conn, &model)?;
                upserted += 1;
            } else {
                T::insert(conn, &model)?;
                inserted += 1;
            }
        }
        Ok((upserted, inserted))
    }
}

/// The fixed backup set, in dependency order.
pub struct TableRegistry {
    tables: Vec<Box<dyn TableHandle>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self {
            tables: vec![
                Box::new(Handle::<User>(PhantomData)),
                Box::new(Handle::<Brand>(PhantomData)),
                Box::new(Handle::<Product>(PhantomData)),
                Box::new(Handle::<InventoryRecord>(PhantomData)),
                Box::new(Handle::<Order>(PhantomData)),
                Box::new(Handle::<OrderItem>(PhantomData)),
                Box::new(Handle::<Promotion>(PhantomData)),
                Box::new(Handle::<Faq>(PhantomData)),
            ],
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.iter().map(|t| t.name())
    }

    pub fn get(&self, name: &str) -> Option<&dyn TableHandle> {
        self.tables
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn TableHandle> + '_ {
        self.tables.iter().map(|t| t.as_ref())
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-table and overall counts from [`Database::import_backup`].
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub rows_upserted: usize,
    pub rows_inserted: usize,
    pub tables: BTreeMap<String, usize>,
    pub skipped_tables: Vec<String>,
}

impl ImportStats {
    pub fn total_rows(&self) -> usize {
        self.rows_upserted + self.rows_inserted
    }
}

impl Database {
    /// Dump every table of the backup set.  Empty tables appear as `[]`.
    pub fn export_backup(&self, registry: &TableRegistry) -> Result<BackupPayload> {
        let mut payload = BackupPayload::new();
        for table in registry.iter() {
            let rows = table.dump(self.conn())?;
            tracing::debug!(table = table.name(), rows = rows.len(), "dumped table");
            payload.insert(table.name().to_string(), rows);
        }
        Ok(payload)
    }

    /// Restore a backup payload.
    ///
    /// Unknown table names are skipped, whatever their value.  A known table
    /// set to `null` has nothing to restore; any other non-array value is
    /// [`StoreError::InvalidTable`].  Every row of every known table is
    /// validated first; a single invalid row rejects the payload with
    /// [`StoreError::InvalidRow`] and nothing is written.  Writes run in one
    /// transaction, so a failure part-way leaves the store untouched.
    pub fn import_backup(
        &mut self,
        registry: &TableRegistry,
        payload: &RestorePayload,
    ) -> Result<ImportStats> {
        let mut stats = ImportStats::default();

        for name in payload.keys() {
            if registry.get(name).is_none() {
                tracing::debug!(table = %name, "skipping unknown table in backup");
                stats.skipped_tables.push(name.clone());
            }
        }

        let mut restorable = Vec::new();
        for table in registry.iter() {
            let rows = match payload.get(table.name()) {
                None | Some(Value::Null) => continue,
                Some(Value::Array(rows)) => rows,
                Some(other) => {
                    return Err(StoreError::InvalidTable {
                        table: table.name(),
                        reason: format!("expected an array of rows, found {}", json_kind(other)),
                    })
                }
            };
            table.validate(rows)?;
            if !rows.is_empty() {
                restorable.push((table, rows));
            }
        }

        let tx = self.conn_mut().transaction()?;
        for (table, rows) in restorable {
            let (upserted, inserted) = table.restore(&tx, rows)?;
            stats.rows_upserted += upserted;
            stats.rows_inserted += inserted;
            stats.tables.insert(table.name().to_string(), upserted + inserted);
        }
        tx.commit()?;

        Ok(stats)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn registry_order_matches_backup_set() {
        let names: Vec<_> = TableRegistry::new().names().collect();
        assert_eq!(
            names,
            vec![
                "users",
                "brands",
                "products",
                "inventory",
                "orders",
                "orderItems",
                "promotions",
                "faqs"
            ]
        );
    }

    #[test]
    fn export_keeps_empty_tables() {
        let (db, _dir) = fixtures::test_db();
        for name in ["Michelin", "Bridgestone", "Yokohama"] {
            db.create_brand(&fixtures::brand(name)).unwrap();
        }

        let payload = db.export_backup(&TableRegistry::new()).unwrap();
        assert_eq!(payload["brands"].len(), 3);
        assert_eq!(payload["products"], Vec::<Value>::new());
        assert_eq!(payload.len(), 8);
    }

    #[test]
    fn export_then_import_into_empty_store() {
        let registry = TableRegistry::new();
        let (source, _a) = fixtures::test_db();
        let now = fixtures::now();
        let seeded = fixtures::seed_order(&source, now, Duration::days(3));
        source
            .create_inventory(&fixtures::inventory(seeded.product.id, 4, 2))
            .unwrap();
        source.create_faq(&fixtures::faq("Warranty?", 1)).unwrap();
        let payload = source.export_backup(&registry).unwrap();

        let (mut target, _b) = fixtures::test_db();
        let stats = target
            .import_backup(&registry, &to_restore_payload(&payload))
            .unwrap();
        assert_eq!(stats.rows_inserted, 0);
        assert_eq!(stats.rows_upserted, 7);

        assert_eq!(target.export_backup(&registry).unwrap(), payload);
    }

    #[test]
    fn import_into_same_store_is_idempotent() {
        let registry = TableRegistry::new();
        let (mut db, _dir) = fixtures::test_db();
        fixtures::seed_order(&db, fixtures::now(), Duration::days(3));
        let payload = db.export_backup(&registry).unwrap();

        let restore = to_restore_payload(&payload);
        db.import_backup(&registry, &restore).unwrap();
        db.import_backup(&registry, &restore).unwrap();

        assert_eq!(db.export_backup(&registry).unwrap(), payload);
    }

    #[test]
    fn unknown_tables_are_skipped() {
        let registry = TableRegistry::new();
        let (mut db, _dir) = fixtures::test_db();
        let brand = fixtures::brand("Continental");

        let mut payload = RestorePayload::new();
        payload.insert("brands".into(), json!([brand]));
        payload.insert("carModels".into(), json!([{ "id": "x", "make": "Toyota" }]));

        let stats = db.import_backup(&registry, &payload).unwrap();
        assert_eq!(stats.skipped_tables, vec!["carModels".to_string()]);
        assert_eq!(db.list_brands().unwrap(), vec![brand]);
    }

    #[test]
    fn unknown_keys_are_skipped_whatever_their_value() {
        let registry = TableRegistry::new();
        let (mut db, _dir) = fixtures::test_db();
        let brand = fixtures::brand("Continental");

        let mut payload = RestorePayload::new();
        payload.insert("brands".into(), json!([brand]));
        payload.insert("exportedAt".into(), json!("2026-01-01T00:00:00Z"));
        payload.insert("version".into(), json!(2));
        payload.insert("meta".into(), json!({ "source": "legacy" }));

        let stats = db.import_backup(&registry, &payload).unwrap();
        assert_eq!(stats.total_rows(), 1);
        assert_eq!(
            stats.skipped_tables,
            vec!["exportedAt".to_string(), "meta".to_string(), "version".to_string()]
        );
        assert_eq!(db.list_brands().unwrap(), vec![brand]);
    }

    #[test]
    fn null_known_table_restores_nothing() {
        let registry = TableRegistry::new();
        let (mut db, _dir) = fixtures::test_db();
        let brand = fixtures::brand("Hankook");

        let mut payload = RestorePayload::new();
        payload.insert("brands".into(), json!([brand]));
        payload.insert("products".into(), Value::Null);

        let stats = db.import_backup(&registry, &payload).unwrap();
        assert_eq!(stats.total_rows(), 1);
        assert!(stats.skipped_tables.is_empty());
        assert!(db.list_products().unwrap().is_empty());
    }

    #[test]
    fn known_table_must_be_an_array() {
        let registry = TableRegistry::new();
        let (mut db, _dir) = fixtures::test_db();

        let mut payload = RestorePayload::new();
        payload.insert("users".into(), json!([fixtures::user("lee@example.com")]));
        payload.insert("brands".into(), json!({ "name": "Falken" }));

        assert!(matches!(
            db.import_backup(&registry, &payload),
            Err(StoreError::InvalidTable { table: "brands", .. })
        ));
        assert!(db.list_users().unwrap().is_empty());
    }

    #[test]
    fn rows_without_id_are_inserted_fresh() {
        let registry = TableRegistry::new();
        let (mut db, _dir) = fixtures::test_db();

        let mut payload = RestorePayload::new();
        payload.insert(
            "faqs".into(),
            json!([{
                "question": "Do you balance wheels?",
                "answer": "Free with every set of four.",
                "sortOrder": 1,
                "createdAt": "2026-01-01T00:00:00Z"
            }]),
        );

        let stats = db.import_backup(&registry, &payload).unwrap();
        assert_eq!(stats.rows_inserted, 1);
        assert_eq!(db.list_faqs().unwrap().len(), 1);
    }

    #[test]
    fn invalid_row_rejects_whole_payload() {
        let registry = TableRegistry::new();
        let (mut db, _dir) = fixtures::test_db();

        let mut payload = RestorePayload::new();
        payload.insert("brands".into(), json!([fixtures::brand("Pirelli")]));
        payload.insert("faqs".into(), json!([{ "id": Uuid::new_v4(), "question": 42 }]));

        let err = db.import_backup(&registry, &payload).unwrap_err();
        match err {
            StoreError::InvalidRow { table, index, .. } => {
                assert_eq!(table, "faqs");
                assert_eq!(index, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(db.list_brands().unwrap().is_empty());
    }

    #[test]
    fn value_checks_reject_negative_stock() {
        let registry = TableRegistry::new();
        let (mut db, _dir) = fixtures::test_db();
        let mut record = fixtures::inventory(Uuid::new_v4(), 1, 1);
        record.quantity = -4;

        let mut payload = RestorePayload::new();
        payload.insert("inventory".into(), json!([record]));

        assert!(matches!(
            db.import_backup(&registry, &payload),
            Err(StoreError::InvalidRow { table: "inventory", .. })
        ));
    }

    #[test]
    fn failed_write_rolls_back_earlier_tables() {
        let registry = TableRegistry::new();
        let (mut db, _dir) = fixtures::test_db();

        // Valid shape, but the product points at a brand that does not exist.
        let mut payload = RestorePayload::new();
        payload.insert("users".into(), json!([fixtures::user("kim@example.com")]));
        payload.insert(
            "products".into(),
            json!([fixtures::product(Uuid::new_v4(), "Orphan")]),
        );

        assert!(matches!(
            db.import_backup(&registry, &payload),
            Err(StoreError::Sqlite(_))
        ));
        assert!(db.list_users().unwrap().is_empty());
    }
}
