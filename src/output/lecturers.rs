//! Grouping of records by lecturer
//!
//! A record with N lecturers joins N groups. Records without any lecturer
//! are valid but belong to no group.

use crate::model::{CourseRecord, Field, LecturerRole};
use std::collections::BTreeMap;

/// Which lecturers a record is grouped under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupingOptions {
    /// Group only under lecturers marked responsible
    pub responsible_only: bool,
    /// With `responsible_only`, records without a responsible lecturer are
    /// grouped under their other lecturers instead of being left out
    pub promote_other_lecturers: bool,
}

/// Records of one semester grouped by lecturer name
#[derive(Debug, Clone, Default)]
pub struct LecturerIndex {
    groups: BTreeMap<String, Vec<CourseRecord>>,
}

impl LecturerIndex {
    /// Builds the index; groups keep the order of `records`
    pub fn build(records: &[CourseRecord], options: GroupingOptions) -> Self {
        let mut groups: BTreeMap<String, Vec<CourseRecord>> = BTreeMap::new();

        for record in records {
            for name in group_names(record, options) {
                let group = groups.entry(name.to_string()).or_default();
                if !group.iter().any(|r| r.dedup_key() == record.dedup_key()) {
                    group.push(record.clone());
                }
            }
        }

        Self { groups }
    }

    /// Lecturer names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn courses_of(&self, name: &str) -> Option<&[CourseRecord]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[CourseRecord])> {
        self.groups
            .iter()
            .map(|(name, records)| (name.as_str(), records.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn group_names(record: &CourseRecord, options: GroupingOptions) -> Vec<&str> {
    let mut names: Vec<&str> = if options.responsible_only {
        let responsible: Vec<&str> = record
            .lecturers_with_role(LecturerRole::Responsible)
            .map(|l| l.name.as_str())
            .collect();
        if responsible.is_empty() && options.promote_other_lecturers {
            record
                .lecturers_with_role(LecturerRole::Other)
                .map(|l| l.name.as_str())
                .collect()
        } else {
            responsible
        }
    } else {
        record.lecturer_names().collect()
    };
    names.dedup();
    names
}

/// Lecturers of `record` other than `name`, in page order
pub fn co_lecturers<'a>(record: &'a CourseRecord, name: &str) -> Vec<&'a str> {
    let mut others: Vec<&str> = Vec::new();
    for other in record.lecturer_names() {
        if other != name && !others.contains(&other) {
            others.push(other);
        }
    }
    others
}

/// Drops cancelled courses and courses without weekly hours
///
/// A course counts as cancelled when its title contains "entfällt" in any
/// case. Unknown hours count as zero.
pub fn clean_records(records: &[CourseRecord]) -> Vec<CourseRecord> {
    records
        .iter()
        .filter(|r| match r.hours_per_week {
            Field::Known(hours) => hours > 0.0,
            Field::Unknown => false,
        })
        .filter(|r| !r.title.to_lowercase().contains("entfällt"))
        .cloned()
        .collect()
}
