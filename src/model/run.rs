//! Run results and per-page failures

use crate::model::{CourseRecord, Semester};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which step of the pipeline a page failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// A faculty, subject or course-list page
    Listing,
    /// A course-detail page could not be fetched
    Detail,
    /// A course-detail page was fetched but yielded no record
    Extraction,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Detail => "detail",
            Self::Extraction => "extraction",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal problem with one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub url: String,
    pub stage: FailureStage,
    pub reason: String,
}

impl PageFailure {
    pub fn new(url: impl Into<String>, stage: FailureStage, reason: impl fmt::Display) -> Self {
        Self {
            url: url.into(),
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Progress notification handed to the UI collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Pages processed so far; never decreases within a run
    pub pages_visited: u64,
    /// Course-detail pages discovered so far, if known
    pub total_known: Option<u64>,
}

/// Outcome of one crawl of one semester
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub semester: Semester,
    /// De-duplicated records in discovery order
    pub records: Vec<CourseRecord>,
    pub pages_visited: u64,
    pub failures: Vec<PageFailure>,
    /// Duplicate keys whose fields differed and were replaced
    pub conflicts_resolved: u64,
    /// The run was halted by a stop request before discovery finished
    pub stopped: bool,
}

impl RunResult {
    /// A run is usable once it produced at least one record
    pub fn is_usable(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}
