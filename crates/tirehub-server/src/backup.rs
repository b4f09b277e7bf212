//! On-demand backup and restore, with audit trail.
//!
//! Every attempt records exactly one `backup_history` row. Restores also
//! record a `system_logs` row tagged with the acting user.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tirehub_store::{
    ArchiveHistory, AuditStatus, BackupAction, BackupHistory, Database, RestorePayload,
    StoreError, TableRegistry,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{self, SharedDb};
use crate::error::ServerError;
use crate::snapshot_dir::SnapshotDir;

pub const BACKUP_FILE_PREFIX: &str = "backup";

/// URL prefix under which the backup directory is served.
pub const BACKUP_URL_PREFIX: &str = "/database";

/// History label for restores whose payload came in the request body.
const UPLOAD_SOURCE: &str = "upload";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupCreated {
    /// Stable URL path of the new file, e.g. `/database/backup_<ts>.json`.
    pub file: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreCompleted {
    pub message: String,
    pub rows: usize,
    pub tables: BTreeMap<String, usize>,
    pub skipped_tables: Vec<String>,
}

#[derive(Clone)]
pub struct BackupService {
    db: SharedDb,
    registry: Arc<TableRegistry>,
    dir: SnapshotDir,
    active: Arc<AtomicUsize>,
}

/// Counts in-flight backup/restore calls.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl BackupService {
    pub fn new(db: SharedDb, dir: SnapshotDir) -> Self {
        Self {
            db,
            registry: Arc::new(TableRegistry::new()),
            dir,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[cfg(test)]
    pub fn dir(&self) -> &SnapshotDir {
        &self.dir
    }

    /// Concurrent calls are allowed but reported.
    fn enter(&self, operation: &'static str) -> ActiveGuard {
        if self.active.fetch_add(1, Ordering::AcqRel) > 0 {
            warn!(operation, "Another backup or restore is already running");
        }
        ActiveGuard(self.active.clone())
    }

    /// Dump the backup set to `backup_<ts>.json`.
    pub fn create_backup(&self, acting_user: Option<Uuid>) -> Result<BackupCreated, ServerError> {
        let _active = self.enter("backup");
        let file_name = SnapshotDir::file_name(BACKUP_FILE_PREFIX, Utc::now());
        let db = db::lock(&self.db)?;

        let written = db
            .export_backup(&self.registry)
            .map_err(ServerError::from)
            .and_then(|payload| self.dir.write_json(&file_name, &payload));

        match written {
            Ok(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or(file_name);
                record_history(&db, BackupAction::Backup, &name, AuditStatus::Success);
                info!(file = %name, user = ?acting_user, "Backup created");

                Ok(BackupCreated {
                    file: format!("{BACKUP_URL_PREFIX}/{name}"),
                    message: "Backup created successfully".to_string(),
                })
            }
            Err(e) => {
                record_history(&db, BackupAction::Backup, &file_name, AuditStatus::Failed);
                Err(ServerError::Backup(e.to_string()))
            }
        }
    }

    /// Restore from a JSON body. A body that is not a backup payload is
    /// rejected and audited like any other failed restore.
    pub fn restore_json(
        &self,
        body: &[u8],
        acting_user: Option<Uuid>,
    ) -> Result<RestoreCompleted, ServerError> {
        match serde_json::from_slice::<RestorePayload>(body) {
            Ok(payload) => self.restore_backup(&payload, acting_user),
            Err(e) => {
                let err = ServerError::BadRequest(format!(
                    "Backup payload must be a JSON object keyed by table name: {e}"
                ));
                self.record_failure(UPLOAD_SOURCE, &err, acting_user)?;
                Err(err)
            }
        }
    }

    /// Restore from a backup file previously written to the backup directory.
    pub fn restore_file(
        &self,
        file_name: &str,
        acting_user: Option<Uuid>,
    ) -> Result<RestoreCompleted, ServerError> {
        match self.dir.read_json::<RestorePayload>(file_name) {
            Ok(payload) => self.restore_from(&payload, file_name, acting_user),
            Err(e) => {
                self.record_failure(file_name, &e, acting_user)?;
                Err(e)
            }
        }
    }

    /// Validate the whole payload, then upsert it in one transaction.
    pub fn restore_backup(
        &self,
        payload: &RestorePayload,
        acting_user: Option<Uuid>,
    ) -> Result<RestoreCompleted, ServerError> {
        self.restore_from(payload, UPLOAD_SOURCE, acting_user)
    }

    fn restore_from(
        &self,
        payload: &RestorePayload,
        source: &str,
        acting_user: Option<Uuid>,
    ) -> Result<RestoreCompleted, ServerError> {
        let _active = self.enter("restore");
        let mut db = db::lock(&self.db)?;

        match db.import_backup(&self.registry, payload) {
            Ok(stats) => {
                record_history(&db, BackupAction::Restore, source, AuditStatus::Success);
                let details = if stats.skipped_tables.is_empty() {
                    format!("Restored {} rows from {source}", stats.total_rows())
                } else {
                    format!(
                        "Restored {} rows from {source}, skipped unknown tables: {}",
                        stats.total_rows(),
                        stats.skipped_tables.join(", ")
                    )
                };
                record_log(&db, &details, acting_user);
                info!(source, rows = stats.total_rows(), user = ?acting_user, "Restore completed");

                Ok(RestoreCompleted {
                    message: "Database restored successfully".to_string(),
                    rows: stats.total_rows(),
                    tables: stats.tables,
                    skipped_tables: stats.skipped_tables,
                })
            }
            Err(e) => {
                let err = match e {
                    StoreError::InvalidRow { .. } | StoreError::InvalidTable { .. } => {
                        ServerError::BadRequest(e.to_string())
                    }
                    other => ServerError::Restore(other.to_string()),
                };
                record_restore_failure(&db, source, &err, acting_user);
                Err(err)
            }
        }
    }

    fn record_failure(
        &self,
        source: &str,
        err: &ServerError,
        acting_user: Option<Uuid>,
    ) -> Result<(), ServerError> {
        let db = db::lock(&self.db)?;
        record_restore_failure(&db, source, err, acting_user);
        Ok(())
    }

    pub fn backup_history(&self, limit: u32) -> Result<Vec<BackupHistory>, ServerError> {
        Ok(db::lock(&self.db)?.list_backup_history(limit)?)
    }

    pub fn archive_history(&self, limit: u32) -> Result<Vec<ArchiveHistory>, ServerError> {
        Ok(db::lock(&self.db)?.list_archive_history(limit)?)
    }

    /// Backup file names, newest first.
    pub fn list_backups(&self) -> Result<Vec<String>, ServerError> {
        let mut names = self.dir.list(&format!("{BACKUP_FILE_PREFIX}_"))?;
        names.reverse();
        Ok(names)
    }

    /// Raw contents of one backup file.
    pub fn backup_file(&self, file_name: &str) -> Result<Vec<u8>, ServerError> {
        if !file_name.starts_with(BACKUP_FILE_PREFIX) || !file_name.ends_with(".json") {
            return Err(ServerError::NotFound(format!("File {file_name} not found")));
        }
        self.dir.read(file_name)
    }
}

fn record_history(db: &Database, action: BackupAction, file_name: &str, status: AuditStatus) {
    if let Err(e) = db.record_backup_history(action, file_name, status) {
        warn!(%action, %status, error = %e, "Failed to record backup history");
    }
}

fn record_log(db: &Database, details: &str, acting_user: Option<Uuid>) {
    if let Err(e) = db.record_system_log("restore", details, acting_user) {
        warn!(error = %e, "Failed to record system log");
    }
}

fn record_restore_failure(
    db: &Database,
    source: &str,
    err: &ServerError,
    acting_user: Option<Uuid>,
) {
    record_history(db, BackupAction::Restore, source, AuditStatus::Failed);
    record_log(db, &format!("Restore from {source} failed: {err}"), acting_user);
    warn!(source, error = %err, "Restore failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tirehub_store::fixtures;

    fn service() -> (BackupService, tempfile::TempDir) {
        let (db, tmp) = fixtures::test_db();
        let dir = SnapshotDir::new(tmp.path().join("public").join("database"));
        (BackupService::new(Arc::new(Mutex::new(db)), dir), tmp)
    }

    fn with_db<T>(service: &BackupService, f: impl FnOnce(&Database) -> T) -> T {
        let db = service.db.lock().unwrap();
        f(&db)
    }

    #[test]
    fn test_backup_writes_every_table() {
        let (service, _tmp) = service();
        with_db(&service, |db| {
            for name in ["Michelin", "Bridgestone", "Yokohama"] {
                db.create_brand(&fixtures::brand(name)).unwrap();
            }
        });

        let created = service.create_backup(None).unwrap();
        assert!(created.file.starts_with("/database/backup_"));
        assert!(created.file.ends_with(".json"));

        let name = created.file.trim_start_matches("/database/");
        let json: Value = service.dir().read_json(name).unwrap();
        assert_eq!(json["brands"].as_array().unwrap().len(), 3);
        assert_eq!(json["products"], json!([]));
        assert_eq!(json.as_object().unwrap().len(), 8);

        let history = service.backup_history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, BackupAction::Backup);
        assert_eq!(history[0].status, AuditStatus::Success);
        assert_eq!(history[0].filename, name);

        assert_eq!(service.list_backups().unwrap(), vec![name.to_string()]);
    }

    #[test]
    fn test_backup_failure_is_recorded() {
        let (db, tmp) = fixtures::test_db();
        let blocker = tmp.path().join("public");
        std::fs::write(&blocker, b"").unwrap();
        let service = BackupService::new(Arc::new(Mutex::new(db)), SnapshotDir::new(&blocker));

        assert!(matches!(
            service.create_backup(None),
            Err(ServerError::Backup(_))
        ));

        let history = service.backup_history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, AuditStatus::Failed);
    }

    #[test]
    fn test_backup_then_restore_round_trip() {
        let (source, _src_tmp) = service();
        let seeded = with_db(&source, |db| {
            let seeded = fixtures::seed_order(db, fixtures::now(), chrono::Duration::days(1));
            db.create_faq(&fixtures::faq("Do you ship?", 1)).unwrap();
            seeded
        });
        let created = source.create_backup(None).unwrap();
        let name = created.file.trim_start_matches("/database/");
        let body = source.dir().read(name).unwrap();

        let (target, _dst_tmp) = service();
        let admin = Uuid::new_v4();
        let restored = target.restore_json(&body, Some(admin)).unwrap();
        assert_eq!(restored.rows, 6);
        assert!(restored.skipped_tables.is_empty());

        with_db(&target, |db| {
            assert_eq!(db.get_order(seeded.order.id).unwrap(), seeded.order);
            assert_eq!(db.list_order_items(seeded.order.id).unwrap(), vec![seeded.item.clone()]);
            assert_eq!(db.list_faqs().unwrap().len(), 1);

            let history = db.list_backup_history(10).unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].action, BackupAction::Restore);
            assert_eq!(history[0].status, AuditStatus::Success);

            let logs = db.list_system_logs(10).unwrap();
            assert_eq!(logs.len(), 1);
            assert_eq!(logs[0].action, "restore");
            assert_eq!(logs[0].user_id, Some(admin));
        });
    }

    #[test]
    fn test_restore_skips_unknown_tables() {
        let (service, _tmp) = service();
        let brand = fixtures::brand("Pirelli");
        let body = serde_json::to_vec(&json!({
            "brands": [brand],
            "legacyCoupons": [{"id": "x"}],
        }))
        .unwrap();

        let restored = service.restore_json(&body, None).unwrap();
        assert_eq!(restored.rows, 1);
        assert_eq!(restored.skipped_tables, vec!["legacyCoupons".to_string()]);
        with_db(&service, |db| {
            assert_eq!(db.get_brand(brand.id).unwrap(), brand);
        });
    }

    #[test]
    fn test_restore_skips_unknown_keys_of_any_shape() {
        let (service, _tmp) = service();
        let brand = fixtures::brand("Pirelli");
        let body = serde_json::to_vec(&json!({
            "brands": [brand],
            "exportedAt": "2026-01-01T00:00:00Z",
            "version": 2,
        }))
        .unwrap();

        let restored = service.restore_json(&body, None).unwrap();
        assert_eq!(restored.rows, 1);
        assert_eq!(
            restored.skipped_tables,
            vec!["exportedAt".to_string(), "version".to_string()]
        );
        with_db(&service, |db| {
            assert_eq!(db.get_brand(brand.id).unwrap(), brand);
            let history = db.list_backup_history(10).unwrap();
            assert_eq!(history[0].status, AuditStatus::Success);
        });
    }

    #[test]
    fn test_restore_treats_null_table_as_empty() {
        let (service, _tmp) = service();
        let brand = fixtures::brand("Kumho");
        let body = serde_json::to_vec(&json!({
            "brands": [brand],
            "products": null,
        }))
        .unwrap();

        let restored = service.restore_json(&body, None).unwrap();
        assert_eq!(restored.rows, 1);
        assert!(restored.skipped_tables.is_empty());
    }

    #[test]
    fn test_restore_rejects_non_array_known_table() {
        let (service, _tmp) = service();
        let body = serde_json::to_vec(&json!({ "brands": "Michelin" })).unwrap();

        assert!(matches!(
            service.restore_json(&body, None),
            Err(ServerError::BadRequest(_))
        ));
        let history = service.backup_history(10).unwrap();
        assert_eq!(history[0].status, AuditStatus::Failed);
    }

    #[test]
    fn test_invalid_row_rejects_whole_payload() {
        let (service, _tmp) = service();
        let good = fixtures::brand("Pirelli");
        let body = serde_json::to_vec(&json!({
            "brands": [good, {"id": Uuid::new_v4(), "name": 42}],
        }))
        .unwrap();

        assert!(matches!(
            service.restore_json(&body, None),
            Err(ServerError::BadRequest(_))
        ));

        with_db(&service, |db| {
            assert!(db.list_brands().unwrap().is_empty());
            let history = db.list_backup_history(10).unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].status, AuditStatus::Failed);
            assert_eq!(db.list_system_logs(10).unwrap().len(), 1);
        });
    }

    #[test]
    fn test_malformed_body_is_audited() {
        let (service, _tmp) = service();

        assert!(matches!(
            service.restore_json(b"[1, 2, 3]", None),
            Err(ServerError::BadRequest(_))
        ));

        let history = service.backup_history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].filename, "upload");
        assert_eq!(history[0].status, AuditStatus::Failed);
    }

    #[test]
    fn test_restore_from_stored_file() {
        let (service, _tmp) = service();
        let brand = fixtures::brand("Continental");
        with_db(&service, |db| db.create_brand(&brand).unwrap());
        let created = service.create_backup(None).unwrap();
        let name = created.file.trim_start_matches("/database/").to_string();

        with_db(&service, |db| {
            db.conn().execute("DELETE FROM brands", []).unwrap();
        });

        let restored = service.restore_file(&name, None).unwrap();
        assert_eq!(restored.rows, 1);
        with_db(&service, |db| assert_eq!(db.list_brands().unwrap(), vec![brand.clone()]));

        assert!(matches!(
            service.restore_file("backup_missing.json", None),
            Err(ServerError::NotFound(_))
        ));
    }

    #[test]
    fn test_backup_file_only_serves_backups() {
        let (service, _tmp) = service();
        service
            .dir()
            .write_json("orders_archive_x.json", &json!({}))
            .unwrap();

        assert!(matches!(
            service.backup_file("orders_archive_x.json"),
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(
            service.backup_file("../secret.json"),
            Err(ServerError::NotFound(_))
        ));
    }
}
