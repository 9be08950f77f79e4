//! Storage module for persisting finished runs
//!
//! This module handles the durable side of a run:
//! - SQLite database initialization and schema management
//! - Writing a run and its ordered artifact list exactly once
//! - Reading a run back by its identifier

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteArtifactStore;
pub use traits::{ArtifactStore, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens the artifact store database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_store(path: &Path) -> StorageResult<SqliteArtifactStore> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Database(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
    }
    SqliteArtifactStore::new(path)
}
