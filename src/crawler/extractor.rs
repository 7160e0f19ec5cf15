//! Record extraction from course-detail pages
//!
//! Fields are located by structural anchors: the page heading, table
//! `summary` attributes, row header labels and cell `headers` attributes.
//! Nothing is read by position, since the markup differs between course
//! types.

use crate::config::SelectorConfig;
use crate::crawler::fetcher::PageContent;
use crate::model::{
    CourseId, CourseRecord, Field, Lecturer, LecturerRole, ScheduleSlot, Semester,
};
use crate::url::query_param;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

const TITLE_SUFFIX: &str = " - Einzelansicht";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractErrorKind {
    /// The page has no usable heading
    MissingTitle,
    /// A required structure is present but unreadable
    Malformed(String),
    /// The page belongs to another semester than the run
    SemesterMismatch { expected: Semester, found: Semester },
}

impl fmt::Display for ExtractErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTitle => f.write_str("missing title"),
            Self::Malformed(detail) => write!(f, "malformed page: {}", detail),
            Self::SemesterMismatch { expected, found } => {
                write!(f, "page belongs to {} instead of {}", found, expected)
            }
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind} ({url})")]
pub struct ExtractError {
    pub url: String,
    pub kind: ExtractErrorKind,
}

/// Parses course-detail pages of one semester into records
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    semester: Semester,
    course_id_param: String,
    selectors: DetailSelectors,
}

#[derive(Debug, Clone)]
struct DetailSelectors {
    heading: Selector,
    faculties: Selector,
    institutions: Selector,
    lecturer_table: Selector,
    basic_data: Selector,
    tables: Selector,
    row: Selector,
    header_cell: Selector,
    data_cell: Selector,
    any_cell: Selector,
    anchor: Selector,
}

impl DetailSelectors {
    fn compile() -> Result<Self, ConfigError> {
        let parse = crate::crawler::parser::compile_selector;
        Ok(Self {
            heading: parse("h1")?,
            faculties: parse("div[style*='padding-left: 10px'] a")?,
            institutions: parse(
                "table[summary='Übersicht über die zugehörigen Einrichtungen'] td a",
            )?,
            lecturer_table: parse("table[summary='Verantwortliche Dozenten']")?,
            basic_data: parse("table[summary='Grunddaten zur Veranstaltung']")?,
            tables: parse("table[summary]")?,
            row: parse("tr")?,
            header_cell: parse("th")?,
            data_cell: parse("td")?,
            any_cell: parse("th, td")?,
            anchor: parse("a")?,
        })
    }
}

impl RecordExtractor {
    pub fn new(config: &SelectorConfig, semester: Semester) -> Result<Self, ConfigError> {
        Ok(Self {
            semester,
            course_id_param: config.course_id_param.clone(),
            selectors: DetailSelectors::compile()?,
        })
    }

    /// Extracts exactly one record from a course-detail page
    pub fn extract(&self, page: &PageContent) -> Result<CourseRecord, ExtractError> {
        let fail = |kind| ExtractError {
            url: page.url.to_string(),
            kind,
        };

        let document = Html::parse_document(&page.body);
        let s = &self.selectors;

        let title = document
            .select(&s.heading)
            .map(|h| clean_text(&h.text().collect::<String>()))
            .map(|t| t.trim_end_matches(TITLE_SUFFIX).trim().to_string())
            .find(|t| !t.is_empty())
            .ok_or_else(|| fail(ExtractErrorKind::MissingTitle))?;

        let basic = self.basic_data(&document);

        let semester_label = basic.get("Semester").cloned();
        if let Some(found) = semester_label.as_deref().and_then(Semester::find_in) {
            if found != self.semester {
                return Err(fail(ExtractErrorKind::SemesterMismatch {
                    expected: self.semester,
                    found,
                }));
            }
        }

        let hours_per_week = match basic.get("SWS").map(|raw| (raw, parse_decimal(raw))) {
            Some((_, Some(hours))) => Field::Known(hours),
            Some((raw, None)) => {
                tracing::debug!("Unreadable SWS '{}' on {}", raw, page.url);
                Field::Unknown
            }
            None => Field::Unknown,
        };

        let schedule = self.schedule(&document);
        let lecturers = self.lecturers(&document);

        let id = match basic.get("Veranstaltungsnummer") {
            Some(number) => CourseId::Assigned(number.clone()),
            None => match query_param(&page.url, &self.course_id_param) {
                Some(id) if !id.is_empty() => CourseId::Assigned(id),
                _ => CourseId::Synthesized(synthesize_id(&title, &schedule)),
            },
        };

        Ok(CourseRecord {
            id,
            title,
            lecturers,
            category: Field::from_option(basic.get("Veranstaltungsart").cloned()),
            schedule,
            semester: self.semester,
            semester_label: Field::from_option(semester_label),
            faculties: collect_texts(document.select(&s.faculties)),
            institutions: collect_texts(document.select(&s.institutions)),
            short_name: Field::from_option(basic.get("Kürzel").cloned()),
            hours_per_week,
            credits: Field::from_option(basic.get("Credits").cloned()),
            source_url: page.url.to_string(),
        })
    }

    /// Label/value pairs of the basic data table; empty values are dropped
    fn basic_data(&self, document: &Html) -> HashMap<String, String> {
        let s = &self.selectors;
        let mut values = HashMap::new();
        for table in document.select(&s.basic_data) {
            for row in table.select(&s.row) {
                let headers = row.select(&s.header_cell);
                let cells = row.select(&s.data_cell);
                for (header, cell) in headers.zip(cells) {
                    let label = clean_text(&header.text().collect::<String>());
                    let value = clean_text(&cell.text().collect::<String>());
                    if !value.is_empty() {
                        values.entry(label).or_insert(value);
                    }
                }
            }
        }
        values
    }

    fn lecturers(&self, document: &Html) -> Vec<Lecturer> {
        let s = &self.selectors;
        let mut lecturers: Vec<Lecturer> = Vec::new();

        for table in document.select(&s.lecturer_table) {
            for row in table.select(&s.row) {
                let mut name = None;
                let mut responsibility = String::new();
                for cell in row.select(&s.data_cell) {
                    match cell.value().attr("headers") {
                        Some("persons_1") => {
                            let text = cell
                                .select(&s.anchor)
                                .next()
                                .map(|a| a.text().collect::<String>())
                                .unwrap_or_else(|| cell.text().collect());
                            name = Some(reorder_name(&clean_text(&text)));
                        }
                        Some("persons_2") => {
                            responsibility = clean_text(&cell.text().collect::<String>());
                        }
                        _ => {}
                    }
                }

                let Some(name) = name.filter(|n| !n.is_empty()) else {
                    continue;
                };
                let role = if responsibility.eq_ignore_ascii_case("verantwortlich") {
                    LecturerRole::Responsible
                } else {
                    LecturerRole::Other
                };
                if !lecturers.iter().any(|l| l.name == name && l.role == role) {
                    lecturers.push(Lecturer { name, role });
                }
            }
        }

        lecturers
    }

    /// Rows of the dates tables, columns located by their header labels
    fn schedule(&self, document: &Html) -> Field<Vec<ScheduleSlot>> {
        let s = &self.selectors;
        let mut slots = Vec::new();
        let mut found_table = false;

        for table in document.select(&s.tables) {
            let is_dates = table
                .value()
                .attr("summary")
                .map_or(false, |summary| summary.contains("Veranstaltungstermine"));
            if !is_dates {
                continue;
            }
            found_table = true;

            let mut columns: HashMap<String, usize> = HashMap::new();
            for row in table.select(&s.row) {
                let header_labels: Vec<String> = row
                    .select(&s.header_cell)
                    .map(|h| clean_text(&h.text().collect::<String>()))
                    .collect();
                if columns.is_empty() && header_labels.len() > 1 {
                    columns = header_labels
                        .into_iter()
                        .enumerate()
                        .map(|(i, label)| (label, i))
                        .collect();
                    continue;
                }

                let cells: Vec<String> = row
                    .select(&s.any_cell)
                    .map(|c| clean_text(&c.text().collect::<String>()))
                    .collect();
                if cells.iter().all(|c| c.is_empty()) {
                    continue;
                }

                let column = |label: &str| {
                    columns
                        .get(label)
                        .and_then(|&i| cells.get(i))
                        .filter(|v| !v.is_empty())
                        .cloned()
                };
                let slot = ScheduleSlot {
                    day: Field::from_option(column("Tag")),
                    time: Field::from_option(column("Zeit")),
                    rhythm: Field::from_option(column("Rhythmus")),
                    room: Field::from_option(column("Raum")),
                };
                if slot != ScheduleSlot::default() {
                    slots.push(slot);
                }
            }
        }

        if found_table && !slots.is_empty() {
            Field::Known(slots)
        } else {
            Field::Unknown
        }
    }
}

fn collect_texts<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> Vec<String> {
    let mut texts: Vec<String> = Vec::new();
    for element in elements {
        let text = clean_text(&element.text().collect::<String>());
        if !text.is_empty() && !texts.contains(&text) {
            texts.push(text);
        }
    }
    texts
}

/// Normalizes whitespace and encoding artifacts
///
/// Applies NFKC, turns non-breaking spaces into spaces, drops soft hyphens and
/// zero-width characters and collapses runs of whitespace.
pub fn clean_text(raw: &str) -> String {
    let normalized: String = raw
        .nfkc()
        .filter(|c| !matches!(c, '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}'))
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .collect();
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turns the portal's `Last, First, Title` into `Title First Last`
pub fn reorder_name(name: &str) -> String {
    let parts: Vec<&str> = name
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    match parts.as_slice() {
        [] => String::new(),
        [single] => single.to_string(),
        [last, first] => format!("{} {}", first, last),
        [last, first, rest @ ..] => format!("{} {} {}", rest.join(" "), first, last),
    }
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

fn synthesize_id(title: &str, schedule: &Field<Vec<ScheduleSlot>>) -> String {
    let first = schedule.as_option().and_then(|slots| slots.first());
    match first {
        Some(slot) => format!("{}|{} {}", title, slot.day, slot.time),
        None => title.to_string(),
    }
}
