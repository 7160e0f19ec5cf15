//! De-duplication of extracted records
//!
//! Records are keyed by [`DedupKey`]. Each key keeps the discovery sequence
//! number of its first occurrence, so the final order does not depend on the
//! order in which concurrent tasks finished.

use crate::model::{CourseRecord, DedupKey, PageFailure, RunResult, Semester};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<DedupKey, (u64, CourseRecord)>,
    failures: Vec<PageFailure>,
    conflicts: u64,
}

/// Collects records and failures of one run
///
/// All methods take `&self`; updates are serialized internally.
#[derive(Debug)]
pub struct Aggregator {
    semester: Semester,
    inner: Mutex<Inner>,
}

/// What `add_record` did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    /// Same key, same content
    Duplicate,
    /// Same key, different content; the new record won
    Replaced,
}

impl Aggregator {
    pub fn new(semester: Semester) -> Self {
        Self {
            semester,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Adds a record discovered at position `seq`
    pub fn add_record(&self, seq: u64, record: CourseRecord) -> AddOutcome {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let inner = &mut *guard;

        match inner.records.entry(record.dedup_key()) {
            Entry::Vacant(slot) => {
                slot.insert((seq, record));
                AddOutcome::Inserted
            }
            Entry::Occupied(mut slot) => {
                let existing = &mut slot.get_mut().1;
                if existing.same_content(&record) {
                    tracing::trace!(
                        "Dropping duplicate of '{}' from {}",
                        record.title,
                        record.source_url
                    );
                    return AddOutcome::Duplicate;
                }

                tracing::warn!(
                    "Conflicting records for '{}' ({} vs {}); keeping the later one",
                    record.title,
                    existing.source_url,
                    record.source_url
                );
                *existing = record;
                inner.conflicts += 1;
                AddOutcome::Replaced
            }
        }
    }

    pub fn record_failure(&self, failure: PageFailure) {
        tracing::warn!("Skipped {} page {}: {}", failure.stage, failure.url, failure.reason);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.failures.push(failure);
    }

    pub fn record_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.records.len()
    }

    /// Consumes the aggregator; records come out in discovery order
    pub fn finalize(self, pages_visited: u64, stopped: bool) -> RunResult {
        let inner = self.inner.into_inner().unwrap_or_else(|e| e.into_inner());

        let mut entries: Vec<(u64, CourseRecord)> = inner.records.into_values().collect();
        entries.sort_by_key(|(seq, _)| *seq);

        RunResult {
            semester: self.semester,
            records: entries.into_iter().map(|(_, record)| record).collect(),
            pages_visited,
            failures: inner.failures,
            conflicts_resolved: inner.conflicts,
            stopped,
        }
    }
}
