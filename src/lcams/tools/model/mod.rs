use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::lcams::tools::error::{Result, ToolError};

mod table;

pub use table::{Cell, Table};

/// National student identifier issued by the external grading platform.
pub type StudentId = String;

/// One of the two grading periods of a school year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    First,
    Second,
}

impl Term {
    pub const ALL: [Term; 2] = [Term::First, Term::Second];

    pub fn number(self) -> u8 {
        match self {
            Term::First => 1,
            Term::Second => 2,
        }
    }

    /// Per-term table holding one overall average per student.
    pub fn averages_table(self) -> &'static str {
        match self {
            Term::First => "term_averages_s1",
            Term::Second => "term_averages_s2",
        }
    }

    /// Per-term table holding one row per (student, discipline).
    pub fn grades_table(self) -> &'static str {
        match self {
            Term::First => "term_grades_s1",
            Term::Second => "term_grades_s2",
        }
    }
}

impl TryFrom<u8> for Term {
    type Error = ToolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Term::First),
            2 => Ok(Term::Second),
            other => Err(ToolError::InvalidTerm(other.to_string())),
        }
    }
}

impl FromStr for Term {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix('S')
            .or_else(|| trimmed.strip_prefix('s'))
            .unwrap_or(trimmed);
        digits
            .parse::<u8>()
            .map_err(|_| ToolError::InvalidTerm(value.to_string()))
            .and_then(Term::try_from)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// The (level, class, term) key identifying the rows an import owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub level: String,
    pub class: String,
    pub term: Term,
}

impl Scope {
    pub fn new(level: impl Into<String>, class: impl Into<String>, term: Term) -> Self {
        Self {
            level: level.into(),
            class: class.into(),
            term,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} S{}", self.level, self.class, self.term)
    }
}

/// Lifecycle state of a school year. At most one year is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearState {
    Active,
    Inactive,
}

impl YearState {
    pub fn as_str(self) -> &'static str {
        match self {
            YearState::Active => "active",
            YearState::Inactive => "inactive",
        }
    }
}

/// Label used for facts loaded while no school year is active.
pub const UNKNOWN_SCHOOL_YEAR: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolYear {
    pub id: i64,
    pub label: String,
    pub state: YearState,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub id: i64,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub id: i64,
    pub level_id: i64,
    pub label: String,
    pub headcount: i64,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discipline {
    pub id: i64,
    pub label: String,
    pub coefficient: f64,
    pub category: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub sex: Option<String>,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    pub class_id: Option<i64>,
    pub school_year: Option<String>,
}

/// Singleton establishment profile printed on reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Establishment {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub academy_inspection: String,
    pub education_inspection: String,
}

/// One student's overall result for a term, joined with identity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermAverageRecord {
    pub student: Student,
    pub average: f64,
    pub rank: i64,
    pub lateness: i64,
    pub absence: i64,
    pub discipline_council: String,
    pub remarks: String,
    pub observation: String,
    pub school_year: String,
}

/// One student's result in one discipline for a term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermGradeRecord {
    pub student_id: StudentId,
    pub discipline: String,
    pub continuous_average: Option<f64>,
    pub exam: Option<f64>,
    pub final_average: Option<f64>,
    pub rank: Option<i64>,
    pub school_year: String,
}
