//! Data model shared by the crawler, storage and export
//!
//! - `Semester`: partition key of every record set
//! - `CourseRecord`: one extracted course
//! - `RunResult`: everything one run hands to its caller

pub(crate) mod course;
mod run;
mod semester;

pub use course::{CourseId, CourseRecord, DedupKey, Field, Lecturer, LecturerRole, ScheduleSlot};
pub use run::{FailureStage, PageFailure, Progress, RunResult};
pub use semester::{Semester, SemesterParseError, Term};
