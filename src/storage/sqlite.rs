//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{CourseRecord, RunResult, Semester};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    SemesterSummary, Storage, StorageError, StorageResult, StoreOutcome,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn insert_run(
        tx: &rusqlite::Transaction,
        semester: Semester,
        run: &RunResult,
        config_hash: &str,
        status: &str,
    ) -> StorageResult<i64> {
        tx.execute(
            "INSERT INTO runs (semester_key, stored_at, config_hash, pages_visited, record_count,
                               failure_count, conflicts_resolved, stopped, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                semester.key(),
                Utc::now().to_rfc3339(),
                config_hash,
                run.pages_visited as i64,
                run.records.len() as i64,
                run.failures.len() as i64,
                run.conflicts_resolved as i64,
                run.stopped,
                status,
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        let mut stmt =
            tx.prepare("INSERT INTO failures (run_id, url, stage, reason) VALUES (?1, ?2, ?3, ?4)")?;
        for failure in &run.failures {
            stmt.execute(params![
                run_id,
                failure.url,
                failure.stage.as_str(),
                failure.reason
            ])?;
        }

        Ok(run_id)
    }
}

impl Storage for SqliteStorage {
    fn store(
        &mut self,
        semester: Semester,
        run: &RunResult,
        config_hash: &str,
    ) -> StorageResult<StoreOutcome> {
        if run.semester != semester {
            return Err(StorageError::SemesterMismatch {
                expected: semester,
                found: run.semester,
            });
        }

        let tx = self.conn.transaction()?;

        if !run.is_usable() {
            Self::insert_run(&tx, semester, run, config_hash, "skipped_empty")?;
            tx.commit()?;
            tracing::warn!(
                "Run for {} has no records; keeping previously stored data",
                semester
            );
            return Ok(StoreOutcome::SkippedEmpty);
        }

        let key = semester.key();

        if run.stopped {
            let stored: i64 = tx.query_row(
                "SELECT COUNT(*) FROM semesters WHERE semester_key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            if stored > 0 {
                Self::insert_run(&tx, semester, run, config_hash, "skipped_stopped")?;
                tx.commit()?;
                tracing::warn!(
                    "Run for {} was stopped early; keeping previously stored data",
                    semester
                );
                return Ok(StoreOutcome::SkippedStopped);
            }
        }

        let run_id = Self::insert_run(&tx, semester, run, config_hash, "stored")?;

        tx.execute("DELETE FROM courses WHERE semester_key = ?1", params![key])?;
        tx.execute(
            "INSERT INTO semesters (semester_key, label, run_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(semester_key) DO UPDATE SET label = excluded.label, run_id = excluded.run_id",
            params![key, semester.to_string(), run_id],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO courses (semester_key, position, course_id, title, record_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, record) in run.records.iter().enumerate() {
                let json = serde_json::to_string(record)?;
                stmt.execute(params![
                    key,
                    position as i64,
                    record.id.as_str(),
                    record.title,
                    json
                ])?;
            }
        }

        tx.commit()?;
        tracing::info!("Stored {} records for {}", run.records.len(), semester);
        Ok(StoreOutcome::Replaced {
            records: run.records.len(),
        })
    }

    fn load(&self, semester: Semester) -> StorageResult<Vec<CourseRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_json FROM courses WHERE semester_key = ?1 ORDER BY position",
        )?;

        let rows = stmt.query_map(params![semester.key()], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str(&row?)?);
        }
        Ok(records)
    }

    fn list_semesters(&self) -> StorageResult<Vec<Semester>> {
        let mut stmt = self.conn.prepare("SELECT semester_key FROM semesters")?;
        let keys = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut semesters = Vec::new();
        for key in keys {
            let key = key?;
            let semester =
                Semester::from_key(&key).ok_or(StorageError::InvalidSemesterKey(key))?;
            semesters.push(semester);
        }
        semesters.sort_by(|a, b| b.cmp(a));
        Ok(semesters)
    }

    fn semester_summary(&self, semester: Semester) -> StorageResult<Option<SemesterSummary>> {
        let run = self
            .conn
            .query_row(
                "SELECT r.stored_at, r.pages_visited, r.failure_count, r.config_hash
                 FROM semesters s JOIN runs r ON r.id = s.run_id
                 WHERE s.semester_key = ?1",
                params![semester.key()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((stored_at, pages_visited, failures, config_hash)) = run else {
            return Ok(None);
        };

        let records = self.load(semester)?;
        let lecturers: BTreeSet<&str> = records.iter().flat_map(|r| r.lecturer_names()).collect();

        Ok(Some(SemesterSummary {
            semester,
            records: records.len(),
            lecturers: lecturers.len(),
            stored_at,
            pages_visited: pages_visited as u64,
            failures: failures as u64,
            config_hash,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::course::fixtures::record;
    use crate::model::{FailureStage, PageFailure, Term};

    fn winter() -> Semester {
        Semester::new(2024, Term::Winter)
    }

    fn run(records: Vec<CourseRecord>) -> RunResult {
        RunResult {
            semester: winter(),
            records,
            pages_visited: 10,
            failures: vec![PageFailure::new(
                "https://qis.example.edu/broken",
                FailureStage::Detail,
                "HTTP 500",
            )],
            conflicts_resolved: 0,
            stopped: false,
        }
    }

    #[test]
    fn test_store_and_load_preserves_order() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let records = vec![
            record("3", "Zahlentheorie", &["Eva Roth"]),
            record("1", "Algebra", &["Hans Meier"]),
        ];

        let outcome = storage.store(winter(), &run(records.clone()), "hash").unwrap();
        assert_eq!(outcome, StoreOutcome::Replaced { records: 2 });
        assert_eq!(storage.load(winter()).unwrap(), records);
    }

    #[test]
    fn test_store_replaces_previous_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .store(winter(), &run(vec![record("1", "Alt", &[])]), "h1")
            .unwrap();
        storage
            .store(winter(), &run(vec![record("2", "Neu", &[])]), "h2")
            .unwrap();

        let loaded = storage.load(winter()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "Neu");
        assert_eq!(
            storage.semester_summary(winter()).unwrap().unwrap().config_hash,
            "h2"
        );
    }

    #[test]
    fn test_empty_run_keeps_stored_data() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .store(winter(), &run(vec![record("1", "Algebra", &[])]), "h")
            .unwrap();

        let outcome = storage.store(winter(), &run(vec![]), "h").unwrap();
        assert_eq!(outcome, StoreOutcome::SkippedEmpty);
        assert_eq!(storage.load(winter()).unwrap().len(), 1);
    }

    #[test]
    fn test_stopped_run_keeps_stored_data() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut partial = run(vec![record("1", "Algebra", &[])]);
        partial.stopped = true;

        // nothing stored yet: a partial run is better than none
        let outcome = storage.store(winter(), &partial, "h").unwrap();
        assert_eq!(outcome, StoreOutcome::Replaced { records: 1 });

        let complete = run(vec![record("1", "Algebra", &[]), record("2", "Analysis", &[])]);
        storage.store(winter(), &complete, "h").unwrap();

        let outcome = storage.store(winter(), &partial, "h").unwrap();
        assert_eq!(outcome, StoreOutcome::SkippedStopped);
        assert_eq!(storage.load(winter()).unwrap().len(), 2);
    }

    #[test]
    fn test_semester_mismatch_rejected() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let summer = Semester::new(2025, Term::Summer);
        let err = storage
            .store(summer, &run(vec![record("1", "Algebra", &[])]), "h")
            .unwrap_err();
        assert!(matches!(err, StorageError::SemesterMismatch { .. }));
    }

    #[test]
    fn test_list_semesters_newest_first() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.list_semesters().unwrap().is_empty());

        let older = Semester::new(2023, Term::Summer);
        let mut old_run = run(vec![record("1", "Algebra", &[])]);
        old_run.semester = older;
        storage.store(older, &old_run, "h").unwrap();
        storage
            .store(winter(), &run(vec![record("1", "Algebra", &[])]), "h")
            .unwrap();

        assert_eq!(storage.list_semesters().unwrap(), vec![winter(), older]);
    }

    #[test]
    fn test_summary_counts_distinct_lecturers() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.semester_summary(winter()).unwrap().is_none());

        let records = vec![
            record("1", "Algebra", &["Hans Meier", "Eva Roth"]),
            record("2", "Analysis", &["Hans Meier"]),
            record("3", "Kolloquium", &[]),
        ];
        storage.store(winter(), &run(records), "h").unwrap();

        let summary = storage.semester_summary(winter()).unwrap().unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.lecturers, 2);
        assert_eq!(summary.pages_visited, 10);
        assert_eq!(summary.failures, 1);
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");
        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            storage
                .store(winter(), &run(vec![record("1", "Algebra", &[])]), "h")
                .unwrap();
        }
        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.load(winter()).unwrap().len(), 1);
    }
}
