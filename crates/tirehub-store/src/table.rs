//! Uniform row access used by backup and restore.

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

/// A model persisted as one row of a named table.
///
/// Every table in the backup set implements this so it can be dumped and
/// restored without knowing its concrete type.
pub trait Table: Serialize + DeserializeOwned + Sized + 'static {
    /// Key used for the table in backup files.
    const NAME: &'static str;

    fn id(&self) -> Uuid;

    /// Every row, in a stable order.
    fn select_all(conn: &Connection) -> Result<Vec<Self>>;

    fn insert(conn: &Connection, row: &Self) -> Result<()>;

    /// Update the row with the same id, or insert it if absent.
    ///
    /// Implementations use `ON CONFLICT(id) DO UPDATE`, never `REPLACE`,
    /// so dependent rows are not cascaded away.
    fn upsert(conn: &Connection, row: &Self) -> Result<()>;

    /// Value-level checks beyond what deserialization enforces.
    fn check(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}
