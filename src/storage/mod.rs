//! Storage module for persisting semester record sets
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Replacing a semester's records with those of a usable run
//! - Loading records in their stored order
//! - Run history with per-page failures

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{SemesterSummary, Storage, StorageError, StorageResult, StoreOutcome};

use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}
