//! Course records as extracted from course-detail pages

use crate::model::Semester;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An optional field that is explicitly tagged when the page did not provide it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Field<T> {
    Known(T),
    Unknown,
}

impl<T> Field<T> {
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Known(v),
            None => Self::Unknown,
        }
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unknown
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => write!(f, "{}", v),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Course identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "origin", content = "value", rename_all = "snake_case")]
pub enum CourseId {
    /// Assigned by the portal (course number or publish id)
    Assigned(String),
    /// Built from title and first schedule slot because the portal gave none
    Synthesized(String),
}

impl CourseId {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Assigned(id) | Self::Synthesized(id) => id,
        }
    }
}

/// How a person is attached to a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LecturerRole {
    Responsible,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lecturer {
    pub name: String,
    pub role: LecturerRole,
}

/// One row of a course's dates table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub day: Field<String>,
    pub time: Field<String>,
    pub rhythm: Field<String>,
    pub room: Field<String>,
}

/// Identity used to recognize two extracted records as the same course
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DedupKey {
    Assigned {
        id: String,
        semester: Semester,
    },
    Composite {
        title: String,
        lecturers: BTreeSet<String>,
        semester: Semester,
    },
}

/// One scraped course entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: CourseId,
    pub title: String,
    /// Zero or more lecturers in page order
    pub lecturers: Vec<Lecturer>,
    /// Course type, e.g. "Vorlesung" or "Seminar"
    pub category: Field<String>,
    pub schedule: Field<Vec<ScheduleSlot>>,
    pub semester: Semester,
    /// Semester as printed on the page
    pub semester_label: Field<String>,
    pub faculties: Vec<String>,
    pub institutions: Vec<String>,
    pub short_name: Field<String>,
    /// Weekly contact hours (SWS)
    pub hours_per_week: Field<f64>,
    pub credits: Field<String>,
    pub source_url: String,
}

impl CourseRecord {
    pub fn dedup_key(&self) -> DedupKey {
        match &self.id {
            CourseId::Assigned(id) => DedupKey::Assigned {
                id: id.clone(),
                semester: self.semester,
            },
            CourseId::Synthesized(_) => DedupKey::Composite {
                title: self.title.clone(),
                lecturers: self.lecturers.iter().map(|l| l.name.clone()).collect(),
                semester: self.semester,
            },
        }
    }

    /// Field-for-field comparison that ignores where the record was found
    pub fn same_content(&self, other: &CourseRecord) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.lecturers == other.lecturers
            && self.category == other.category
            && self.schedule == other.schedule
            && self.semester == other.semester
            && self.semester_label == other.semester_label
            && self.faculties == other.faculties
            && self.institutions == other.institutions
            && self.short_name == other.short_name
            && self.hours_per_week == other.hours_per_week
            && self.credits == other.credits
    }

    pub fn lecturer_names(&self) -> impl Iterator<Item = &str> {
        self.lecturers.iter().map(|l| l.name.as_str())
    }

    pub fn lecturers_with_role(&self, role: LecturerRole) -> impl Iterator<Item = &Lecturer> {
        self.lecturers.iter().filter(move |l| l.role == role)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::model::Term;

    pub fn record(id: &str, title: &str, lecturers: &[&str]) -> CourseRecord {
        CourseRecord {
            id: CourseId::Assigned(id.to_string()),
            title: title.to_string(),
            lecturers: lecturers
                .iter()
                .map(|name| Lecturer {
                    name: name.to_string(),
                    role: LecturerRole::Responsible,
                })
                .collect(),
            category: Field::Known("Vorlesung".to_string()),
            schedule: Field::Unknown,
            semester: Semester::new(2024, Term::Winter),
            semester_label: Field::Known("WiSe 2024/25".to_string()),
            faculties: vec![],
            institutions: vec![],
            short_name: Field::Unknown,
            hours_per_week: Field::Known(2.0),
            credits: Field::Unknown,
            source_url: format!("https://qis.example.edu/course?publishid={}", id),
        }
    }
}
