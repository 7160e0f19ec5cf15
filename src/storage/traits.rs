//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{CourseRecord, RunResult, Semester};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run belongs to {found}, not {expected}")]
    SemesterMismatch { expected: Semester, found: Semester },

    #[error("Corrupt semester key in database: {0}")]
    InvalidSemesterKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What `store` did with a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The semester's previous records were replaced
    Replaced { records: usize },
    /// The run had no records; stored data was left untouched
    SkippedEmpty,
    /// The run was stopped early and the semester already had stored data,
    /// which was left untouched
    SkippedStopped,
}

/// Overview of one stored semester
#[derive(Debug, Clone, PartialEq)]
pub struct SemesterSummary {
    pub semester: Semester,
    pub records: usize,
    /// Distinct lecturer names across all records
    pub lecturers: usize,
    pub stored_at: String,
    pub pages_visited: u64,
    pub failures: u64,
    pub config_hash: String,
}

/// Trait for storage backend implementations
///
/// A semester is the unit of persistence: storing a usable run replaces
/// everything previously stored for its semester.
pub trait Storage {
    /// Stores the records of `run` as the current data of `semester`
    ///
    /// Runs without records are logged but never overwrite stored data;
    /// neither do stopped runs once the semester has stored records.
    fn store(
        &mut self,
        semester: Semester,
        run: &RunResult,
        config_hash: &str,
    ) -> StorageResult<StoreOutcome>;

    /// Records of `semester` in the order they were stored; empty if none
    fn load(&self, semester: Semester) -> StorageResult<Vec<CourseRecord>>;

    /// Semesters with stored records, newest first
    fn list_semesters(&self) -> StorageResult<Vec<Semester>>;

    fn semester_summary(&self, semester: Semester) -> StorageResult<Option<SemesterSummary>>;
}
