//! Audit trail: backup history, system logs and archive history.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::convert::{opt_uuid_from_db, truncate_to_millis, ts_from_db, ts_to_db, uuid_from_db};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ArchiveHistory, AuditStatus, BackupAction, BackupHistory, SystemLog};

impl Database {
    // ------------------------------------------------------------------
    // Backup history
    // ------------------------------------------------------------------

    pub fn record_backup_history(
        &self,
        action: BackupAction,
        filename: &str,
        status: AuditStatus,
    ) -> Result<BackupHistory> {
        let entry = BackupHistory {
            id: Uuid::new_v4(),
            action,
            filename: filename.to_string(),
            status,
            created_at: truncate_to_millis(Utc::now()),
        };

        self.conn().execute(
            "INSERT INTO backup_history (id, action, filename, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.id.to_string(),
                entry.action,
                entry.filename,
                entry.status,
                ts_to_db(&entry.created_at),
            ],
        )?;
        Ok(entry)
    }

    /// Most recent entries first.
    pub fn list_backup_history(&self, limit: u32) -> Result<Vec<BackupHistory>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, action, filename, status, created_at
             FROM backup_history
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            let id_str: String = row.get(0)?;
            let created_str: String = row.get(4)?;
            Ok(BackupHistory {
                id: uuid_from_db(0, &id_str)?,
                action: row.get(1)?,
                filename: row.get(2)?,
                status: row.get(3)?,
                created_at: ts_from_db(4, &created_str)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // System logs
    // ------------------------------------------------------------------

    pub fn record_system_log(
        &self,
        action: &str,
        details: &str,
        user_id: Option<Uuid>,
    ) -> Result<SystemLog> {
        let entry = SystemLog {
            id: Uuid::new_v4(),
            action: action.to_string(),
            details: details.to_string(),
            user_id,
            created_at: truncate_to_millis(Utc::now()),
        };

        self.conn().execute(
            "INSERT INTO system_logs (id, action, details, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.id.to_string(),
                entry.action,
                entry.details,
                entry.user_id.map(|u| u.to_string()),
                ts_to_db(&entry.created_at),
            ],
        )?;
        Ok(entry)
    }

    pub fn list_system_logs(&self, limit: u32) -> Result<Vec<SystemLog>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, action, details, user_id, created_at
             FROM system_logs
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            let id_str: String = row.get(0)?;
            let created_str: String = row.get(4)?;
            Ok(SystemLog {
                id: uuid_from_db(0, &id_str)?,
                action: row.get(1)?,
                details: row.get(2)?,
                user_id: opt_uuid_from_db(3, row.get(3)?)?,
                created_at: ts_from_db(4, &created_str)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Archive history
    // ------------------------------------------------------------------

    pub fn record_archive_history(
        &self,
        filename: Option<&str>,
        order_count: usize,
        status: AuditStatus,
        error: Option<&str>,
    ) -> Result<ArchiveHistory> {
        let entry = ArchiveHistory {
            id: Uuid::new_v4(),
            filename: filename.map(str::to_string),
            order_count: order_count as i64,
            status,
            error: error.map(str::to_string),
            created_at: truncate_to_millis(Utc::now()),
        };

        self.conn().execute(
            "INSERT INTO archive_history (id, filename, order_count, status, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id.to_string(),
                entry.filename,
                entry.order_count,
                entry.status,
                entry.error,
                ts_to_db(&entry.created_at),
            ],
        )?;
        Ok(entry)
    }

    pub fn list_archive_history(&self, limit: u32) -> Result<Vec<ArchiveHistory>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, filename, order_count, status, error, created_at
             FROM archive_history
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            let id_str: String = row.get(0)?;
            let created_str: String = row.get(5)?;
            Ok(ArchiveHistory {
                id: uuid_from_db(0, &id_str)?,
                filename: row.get(1)?,
                order_count: row.get(2)?,
                status: row.get(3)?,
                error: row.get(4)?,
                created_at: ts_from_db(5, &created_str)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}
