//! Per-lecturer markdown documents
//!
//! One file per lecturer and semester, holding a table of the lecturer's
//! courses. Output depends only on the records passed in, so identical
//! record sets produce identical files.

use crate::model::{CourseRecord, Field, Semester};
use crate::output::lecturers::{co_lecturers, LecturerIndex};
use crate::output::{ExportError, ExportResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Courses that fit on one lecturer's form
pub const MAX_COURSES_PER_DOCUMENT: usize = 18;

/// Co-lecturers listed by name before the rest are summarized
const MAX_NAMED_CO_LECTURERS: usize = 2;

/// Writes the document of one lecturer into `dir`
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the written file
/// * `Err(ExportError)` - No courses or the file could not be written
pub fn export_lecturer(
    dir: &Path,
    semester: Semester,
    name: &str,
    records: &[CourseRecord],
) -> ExportResult<PathBuf> {
    if records.is_empty() {
        return Err(ExportError::NoCourses(name.to_string()));
    }

    if records.len() > MAX_COURSES_PER_DOCUMENT {
        warn!(
            "{} has {} courses in {}, more than fit on one form ({})",
            name,
            records.len(),
            semester,
            MAX_COURSES_PER_DOCUMENT
        );
    }

    fs::create_dir_all(dir)?;
    let path = dir.join(document_file_name(semester, name));
    fs::write(&path, format_lecturer_document(semester, name, records))?;

    debug!("Wrote {} courses for {} to {}", records.len(), name, path.display());
    Ok(path)
}

/// Writes one document per lecturer in `index`
pub fn export_all(
    dir: &Path,
    semester: Semester,
    index: &LecturerIndex,
) -> ExportResult<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(index.len());
    for (name, records) in index.iter() {
        written.push(export_lecturer(dir, semester, name, records)?);
    }
    info!("Exported {} lecturer documents for {}", written.len(), semester);
    Ok(written)
}

/// File name such as `2024w_Hans_Meier.md`
pub fn document_file_name(semester: Semester, name: &str) -> String {
    let slug: String = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect();
    format!("{}_{}.md", semester.key(), slug)
}

/// Formats the document of one lecturer as markdown
pub fn format_lecturer_document(semester: Semester, name: &str, records: &[CourseRecord]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", name));
    md.push_str(&format!("- **Semester**: {}\n", semester));
    md.push_str(&format!("- **Courses**: {}\n", records.len()));
    md.push_str(&format!(
        "- **Total SWS**: {}\n\n",
        format_hours(&Field::Known(total_hours(records)))
    ));

    md.push_str("| Course | Type | SWS | Co-lecturers |\n");
    md.push_str("|--------|------|-----|--------------|\n");

    for record in records {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            escape_cell(&record.title),
            escape_cell(record.category.as_option().map(String::as_str).unwrap_or("-")),
            format_hours(&record.hours_per_week),
            escape_cell(&format_co_lecturers(&co_lecturers(record, name))),
        ));
    }

    md
}

/// "A", "A und B", "A, B und weitere"; "-" when alone
pub fn format_co_lecturers(names: &[&str]) -> String {
    match names.len() {
        0 => "-".to_string(),
        1 => names[0].to_string(),
        2 => format!("{} und {}", names[0], names[1]),
        _ => format!("{} und weitere", names[..MAX_NAMED_CO_LECTURERS].join(", ")),
    }
}

fn total_hours(records: &[CourseRecord]) -> f64 {
    records
        .iter()
        .filter_map(|r| r.hours_per_week.as_option())
        .sum()
}

/// Decimal comma, no trailing zeros: 2, 1,5
fn format_hours(hours: &Field<f64>) -> String {
    match hours {
        Field::Known(h) if h.fract() == 0.0 => format!("{}", *h as i64),
        Field::Known(h) => format!("{}", h).replace('.', ","),
        Field::Unknown => "-".to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
