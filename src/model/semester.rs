//! Semester identifiers
//!
//! A semester is the partition key of every record set. Portals print them in
//! many spellings ("Wintersemester 2024/25", "WiSe 2024/25", "SoSe 2025",
//! "WS2024"); all of them parse to the same value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Term marker within an academic year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    /// Summer term, starts in April of its year
    Summer,
    /// Winter term, starts in October of its year and runs into the next
    Winter,
}

/// A semester: year plus term, ordered chronologically
///
/// The winter term of 2024 ("2024/25") sorts after the summer term of 2024.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Semester {
    year: u16,
    term: Term,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot parse '{0}' as a semester")]
pub struct SemesterParseError(pub String);

impl Semester {
    pub fn new(year: u16, term: Term) -> Self {
        Self { year, term }
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn term(&self) -> Term {
        self.term
    }

    /// Stable storage key, e.g. `2024w` or `2025s`
    pub fn key(&self) -> String {
        match self.term {
            Term::Summer => format!("{}s", self.year),
            Term::Winter => format!("{}w", self.year),
        }
    }

    /// Parses a storage key produced by [`Semester::key`]
    pub fn from_key(key: &str) -> Option<Self> {
        let term = key.chars().last()?;
        let year = key[..key.len() - term.len_utf8()].parse().ok()?;
        match term {
            's' => Some(Self::new(year, Term::Summer)),
            'w' => Some(Self::new(year, Term::Winter)),
            _ => None,
        }
    }

    /// Finds a semester mentioned anywhere in free text
    ///
    /// Returns `None` if the text does not name exactly one term marker and a year.
    pub fn find_in(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        let term = detect_term(&lowered)?;
        let year = detect_year(&lowered)?;
        Some(Self::new(year, term))
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.term {
            Term::Summer => write!(f, "Sommer {}", self.year),
            Term::Winter => write!(f, "Winter {}/{:02}", self.year, (self.year + 1) % 100),
        }
    }
}

impl FromStr for Semester {
    type Err = SemesterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::find_in(s)
            .or_else(|| Self::from_key(s.trim()))
            .ok_or_else(|| SemesterParseError(s.to_string()))
    }
}

fn detect_term(lowered: &str) -> Option<Term> {
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    let summer = words.iter().any(|w| {
        w.starts_with("sommer") || w.starts_with("summer") || *w == "sose" || *w == "ss"
    });
    let winter = words
        .iter()
        .any(|w| w.starts_with("winter") || *w == "wise" || *w == "ws");

    match (summer, winter) {
        (true, false) => Some(Term::Summer),
        (false, true) => Some(Term::Winter),
        _ => None,
    }
}

/// First run of four digits; a following "/25" style suffix is ignored
fn detect_year(lowered: &str) -> Option<u16> {
    let bytes = lowered.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 4 {
                return lowered[start..i].parse().ok();
            }
        } else {
            i += 1;
        }
    }
    None
}
