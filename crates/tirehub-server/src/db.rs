//! Shared handle to the synchronous store.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tirehub_store::Database;

use crate::error::ServerError;

/// The store is synchronous; callers lock it from blocking tasks only.
pub type SharedDb = Arc<Mutex<Database>>;

pub fn open_shared(path: &Path) -> Result<SharedDb, ServerError> {
    let db = Database::open_at(path)?;
    Ok(Arc::new(Mutex::new(db)))
}

/// Lock the store, reporting a poisoned mutex as an error instead of
/// panicking.
pub fn lock(db: &SharedDb) -> Result<MutexGuard<'_, Database>, ServerError> {
    db.lock()
        .map_err(|_| ServerError::Internal("database lock poisoned".to_string()))
}
