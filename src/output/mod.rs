//! Export of stored record sets
//!
//! This module handles:
//! - Grouping a semester's records by lecturer
//! - Writing one markdown document per lecturer
//! - Printing statistics of stored semesters

mod lecturers;
mod markdown;
pub mod stats;

pub use lecturers::{clean_records, co_lecturers, GroupingOptions, LecturerIndex};
pub use markdown::{
    document_file_name, export_all, export_lecturer, format_co_lecturers,
    format_lecturer_document, MAX_COURSES_PER_DOCUMENT,
};
pub use stats::{load_statistics, print_statistics, SemesterStatistics};

use thiserror::Error;

/// Errors that can occur during export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No courses to export for {0}")]
    NoCourses(String),

    #[error("Unknown lecturer '{0}' in this semester")]
    UnknownLecturer(String),

    #[error("Nothing stored for {0}; crawl it first")]
    NothingStored(crate::model::Semester),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;
