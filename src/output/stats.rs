//! Statistics over stored semesters
//!
//! Reads semester summaries and per-category course counts from the
//! storage layer and prints them.

use crate::model::{CourseRecord, Field};
use crate::storage::{SemesterSummary, Storage, StorageResult};
use std::collections::BTreeMap;

/// Statistics of one stored semester
#[derive(Debug, Clone)]
pub struct SemesterStatistics {
    pub summary: SemesterSummary,

    /// Course count per course type; unknown types count under "unknown"
    pub courses_by_category: BTreeMap<String, usize>,

    /// Sum of known weekly hours
    pub total_hours: f64,

    /// Records whose weekly hours were not on the page
    pub unknown_hours: usize,
}

impl SemesterStatistics {
    fn from_records(summary: SemesterSummary, records: &[CourseRecord]) -> Self {
        let mut courses_by_category = BTreeMap::new();
        let mut total_hours = 0.0;
        let mut unknown_hours = 0;

        for record in records {
            let category = match &record.category {
                Field::Known(c) => c.clone(),
                Field::Unknown => "unknown".to_string(),
            };
            *courses_by_category.entry(category).or_insert(0) += 1;

            match record.hours_per_week {
                Field::Known(h) => total_hours += h,
                Field::Unknown => unknown_hours += 1,
            }
        }

        Self {
            summary,
            courses_by_category,
            total_hours,
            unknown_hours,
        }
    }
}

/// Loads statistics for every stored semester, newest first
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<Vec<SemesterStatistics>> {
    let mut stats = Vec::new();
    for semester in storage.list_semesters()? {
        if let Some(summary) = storage.semester_summary(semester)? {
            let records = storage.load(semester)?;
            stats.push(SemesterStatistics::from_records(summary, &records));
        }
    }
    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &[SemesterStatistics]) {
    println!("=== Catalog Statistics ===\n");

    if stats.is_empty() {
        println!("No semesters stored yet.");
        return;
    }

    for semester in stats {
        let summary = &semester.summary;
        println!("{} ({}):", summary.semester, summary.semester.key());
        println!("  Stored at: {}", summary.stored_at);
        println!("  Courses: {}", summary.records);
        println!("  Lecturers: {}", summary.lecturers);
        println!("  Pages visited: {}", summary.pages_visited);
        println!("  Page failures: {}", summary.failures);
        println!("  Total SWS: {:.1}", semester.total_hours);
        if semester.unknown_hours > 0 {
            println!("  Courses without SWS: {}", semester.unknown_hours);
        }
        println!("  Config hash: {}", summary.config_hash);

        println!("  Courses by type:");
        let mut categories: Vec<_> = semester.courses_by_category.iter().collect();
        categories.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (category, count) in categories {
            println!("    {}: {}", category, count);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::course::fixtures::record;
    use crate::model::{RunResult, Semester, Term};
    use crate::storage::SqliteStorage;

    #[test]
    fn test_statistics_from_records() {
        let semester = Semester::new(2024, Term::Winter);
        let mut seminar = record("2", "Seminar", &["A"]);
        seminar.category = Field::Known("Seminar".to_string());
        seminar.hours_per_week = Field::Unknown;
        let records = vec![record("1", "Algebra", &["A"]), seminar];

        let summary = SemesterSummary {
            semester,
            records: 2,
            lecturers: 1,
            stored_at: "2024-10-01T00:00:00Z".to_string(),
            pages_visited: 5,
            failures: 0,
            config_hash: "abc".to_string(),
        };
        let stats = SemesterStatistics::from_records(summary, &records);

        assert_eq!(stats.courses_by_category.get("Vorlesung"), Some(&1));
        assert_eq!(stats.courses_by_category.get("Seminar"), Some(&1));
        assert_eq!(stats.total_hours, 2.0);
        assert_eq!(stats.unknown_hours, 1);
    }

    #[test]
    fn test_load_statistics_from_storage() {
        let semester = Semester::new(2024, Term::Winter);
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run = RunResult {
            semester,
            records: vec![record("1", "Algebra", &["A"])],
            pages_visited: 4,
            failures: vec![],
            conflicts_resolved: 0,
            stopped: false,
        };
        storage.store(semester, &run, "hash").unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].summary.records, 1);
        assert_eq!(stats[0].summary.pages_visited, 4);
    }
}
