//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the record database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Every stored (or rejected) run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    semester_key TEXT NOT NULL,
    stored_at TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    pages_visited INTEGER NOT NULL,
    record_count INTEGER NOT NULL,
    failure_count INTEGER NOT NULL,
    conflicts_resolved INTEGER NOT NULL,
    stopped INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_semester ON runs(semester_key);

-- The run whose records currently represent a semester
CREATE TABLE IF NOT EXISTS semesters (
    semester_key TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES runs(id)
);

-- Records of the current run of each semester, in run order
CREATE TABLE IF NOT EXISTS courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    semester_key TEXT NOT NULL REFERENCES semesters(semester_key),
    position INTEGER NOT NULL,
    course_id TEXT NOT NULL,
    title TEXT NOT NULL,
    record_json TEXT NOT NULL,
    UNIQUE(semester_key, position)
);

CREATE INDEX IF NOT EXISTS idx_courses_semester ON courses(semester_key);

-- Per-page failures of every run
CREATE TABLE IF NOT EXISTS failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    stage TEXT NOT NULL,
    reason TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_failures_run ON failures(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
