use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Verify that a resolved path stays within the expected base directory.
/// Prevents path traversal attacks.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let mut resolved = base.to_path_buf();
    for component in target.strip_prefix(base).unwrap_or(target).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
            _ => {} // RootDir, CurDir, Prefix
        }
    }
    if !resolved.starts_with(base) {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

/// ISO-8601 timestamp with `:` and `.` replaced so it is safe in file names,
/// e.g. `2024-05-01T02-00-00-000Z`.
pub fn timestamp_slug(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// A directory of immutable JSON snapshot files (archives or backups).
///
/// Files are written once and never modified afterwards.
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    base_path: PathBuf,
}

impl SnapshotDir {
    /// The directory is created lazily on first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    #[cfg(test)]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// `<prefix>_<timestamp>.json`
    pub fn file_name(prefix: &str, at: DateTime<Utc>) -> String {
        format!("{prefix}_{}.json", timestamp_slug(at))
    }

    /// Serialize `value` into a new file named `file_name`.
    ///
    /// The JSON goes to a temporary file first, is flushed to disk and then
    /// renamed into place. If `file_name` already exists a random suffix is
    /// appended. The written file is read back and parsed before the final
    /// path is returned.
    pub fn write_json<T: Serialize>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<PathBuf, ServerError> {
        let data = serde_json::to_vec_pretty(value)
            .map_err(|e| ServerError::Storage(format!("Failed to encode {file_name}: {e}")))?;

        fs::create_dir_all(&self.base_path).map_err(|e| {
            ServerError::Storage(format!(
                "Failed to create directory '{}': {}",
                self.base_path.display(),
                e
            ))
        })?;

        let target = self.unused_path(file_name)?;
        let tmp = self.safe_path(&format!(".{}.tmp", Uuid::new_v4().simple()))?;

        if let Err(e) = write_synced(&tmp, &data) {
            let _ = fs::remove_file(&tmp);
            return Err(ServerError::Storage(format!(
                "Failed to write {}: {}",
                tmp.display(),
                e
            )));
        }

        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(ServerError::Storage(format!(
                "Failed to move snapshot into {}: {}",
                target.display(),
                e
            )));
        }

        if let Err(e) = verify_json(&target) {
            let _ = fs::remove_file(&target);
            return Err(e);
        }

        info!(path = %target.display(), bytes = data.len(), "Wrote snapshot");
        Ok(target)
    }

    pub fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<T, ServerError> {
        let data = self.read(file_name)?;
        serde_json::from_slice(&data)
            .map_err(|e| ServerError::Storage(format!("Failed to parse {file_name}: {e}")))
    }

    /// Raw bytes of a snapshot, for downloads.
    pub fn read(&self, file_name: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.safe_path(file_name)?;
        if !path.is_file() {
            return Err(ServerError::NotFound(format!("File {file_name} not found")));
        }
        let data = fs::read(&path)
            .map_err(|e| ServerError::Storage(format!("Failed to read {file_name}: {e}")))?;
        debug!(file = %file_name, size = data.len(), "Read snapshot");
        Ok(data)
    }

    pub fn remove(&self, file_name: &str) -> Result<(), ServerError> {
        let path = self.safe_path(file_name)?;
        fs::remove_file(&path)
            .map_err(|e| ServerError::Storage(format!("Failed to delete {file_name}: {e}")))?;
        debug!(file = %file_name, "Removed snapshot");
        Ok(())
    }

    /// Snapshot file names starting with `prefix`, sorted ascending (which is
    /// chronological for timestamped names). A missing directory is empty.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, ServerError> {
        let entries = match fs::read_dir(&self.base_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ServerError::Storage(format!(
                    "Failed to list snapshots: {e}"
                )))
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                ServerError::Storage(format!("Failed to read directory entry: {e}"))
            })?;
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(prefix) && name.ends_with(".json") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Resolve a bare file name inside the directory, rejecting separators
    /// and traversal.
    pub fn safe_path(&self, file_name: &str) -> Result<PathBuf, ServerError> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return Err(ServerError::BadRequest(
                "Invalid file name".to_string(),
            ));
        }
        ensure_within(&self.base_path, &self.base_path.join(file_name))
    }

    fn unused_path(&self, file_name: &str) -> Result<PathBuf, ServerError> {
        let path = self.safe_path(file_name)?;
        if !path.exists() {
            return Ok(path);
        }
        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (file_name, String::new()),
        };
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        self.safe_path(&format!("{stem}_{suffix}{ext}"))
    }
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn verify_json(path: &Path) -> Result<(), ServerError> {
    let file = File::open(path)
        .map_err(|e| ServerError::Storage(format!("Failed to reopen {}: {}", path.display(), e)))?;
    serde_json::from_reader::<_, serde::de::IgnoredAny>(io::BufReader::new(file)).map_err(|e| {
        ServerError::Storage(format!(
            "Snapshot {} failed verification: {}",
            path.display(),
            e
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_timestamp_slug() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap();
        assert_eq!(timestamp_slug(at), "2024-05-01T02-00-00-000Z");
        assert_eq!(
            SnapshotDir::file_name("orders_archive", at),
            "orders_archive_2024-05-01T02-00-00-000Z.json"
        );
    }

    #[test]
    fn test_write_creates_directory_and_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = SnapshotDir::new(tmp.path().join("database").join("archives"));

        let path = dir.write_json("a.json", &json!({"count": 2})).unwrap();
        assert!(path.is_file());

        let value: serde_json::Value = dir.read_json("a.json").unwrap();
        assert_eq!(value["count"], 2);

        // No temporary files are left behind.
        assert_eq!(dir.list("").unwrap(), vec!["a.json".to_string()]);
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = SnapshotDir::new(tmp.path());

        let first = dir.write_json("backup_x.json", &json!([1])).unwrap();
        let second = dir.write_json("backup_x.json", &json!([2])).unwrap();

        assert_ne!(first, second);
        let name = second.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("backup_x_"));
        assert!(name.ends_with(".json"));

        let original: Vec<i32> = dir.read_json("backup_x.json").unwrap();
        assert_eq!(original, vec![1]);
    }

    #[test]
    fn test_list_filters_by_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = SnapshotDir::new(tmp.path());
        dir.write_json("backup_2.json", &json!({})).unwrap();
        dir.write_json("backup_1.json", &json!({})).unwrap();
        dir.write_json("orders_archive_1.json", &json!({})).unwrap();

        assert_eq!(
            dir.list("backup_").unwrap(),
            vec!["backup_1.json".to_string(), "backup_2.json".to_string()]
        );
    }

    #[test]
    fn test_list_missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = SnapshotDir::new(tmp.path().join("missing"));
        assert!(dir.list("backup_").unwrap().is_empty());
    }

    #[test]
    fn test_safe_path_rejects_traversal() {
        let dir = SnapshotDir::new("/srv/public/database");
        assert!(dir.safe_path("../secret.json").is_err());
        assert!(dir.safe_path("a/b.json").is_err());
        assert!(dir.safe_path("a\\b.json").is_err());
        assert!(dir.safe_path("").is_err());
        assert_eq!(
            dir.safe_path("backup_1.json").unwrap(),
            PathBuf::from("/srv/public/database/backup_1.json")
        );
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = SnapshotDir::new(tmp.path());
        assert!(matches!(
            dir.read("nope.json"),
            Err(ServerError::NotFound(_))
        ));
    }

    #[test]
    fn test_write_fails_when_base_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("archives");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let dir = SnapshotDir::new(&blocker);
        assert!(matches!(
            dir.write_json("a.json", &json!({})),
            Err(ServerError::Storage(_))
        ));
    }
}
