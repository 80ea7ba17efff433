//! Maps the loosely named headers of the external platform onto canonical
//! field names.
//!
//! Matching goes through [`fold_label`], so `Prénom`, `PRENOM` and `prenom`
//! all resolve to [`fields::FIRST_NAME`]. A header that is not listed in
//! [`ALIASES`] is passed through untouched.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::lcams::tools::coerce::UNDEFINED_NAME;
use crate::lcams::tools::error::{Result, ToolError};
use crate::lcams::tools::io::workbook_read::SUMMARY_SHEET;
use crate::lcams::tools::model::{Cell, Table};

/// Canonical column names used by the ledger and the relational loader.
pub mod fields {
    pub const LEVEL: &str = "level";
    pub const CLASS: &str = "class";
    pub const TERM: &str = "term";

    pub const STUDENT_ID: &str = "student_id";
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const SEX: &str = "sex";
    pub const BIRTH_DATE: &str = "birth_date";
    pub const BIRTH_PLACE: &str = "birth_place";
    pub const LATENESS: &str = "lateness";
    pub const ABSENCE: &str = "absence";
    pub const DISCIPLINE_COUNCIL: &str = "discipline_council";
    pub const AVERAGE: &str = "average";
    pub const RANK: &str = "rank";
    pub const COUNCIL_DECISION: &str = "council_decision";
    pub const REMARKS: &str = "remarks";
    pub const COUNCIL_OBSERVATION: &str = "council_observation";

    /// Scope columns placed first in both ledger sheets.
    pub const SCOPE: [&str; 3] = [LEVEL, CLASS, TERM];
    /// Columns of the pivot frame that are not disciplines.
    pub const PIVOT_IDENTITY: [&str; 4] = [STUDENT_ID, FIRST_NAME, LAST_NAME, SEX];
}

/// Canonical field → accepted external spellings. Each canonical name is
/// implicitly accepted as well.
pub const ALIASES: &[(&str, &[&str])] = &[
    (fields::STUDENT_ID, &["IEN", "INE", "Identifiant"]),
    (fields::FIRST_NAME, &["Prénom", "Prénoms"]),
    (fields::LAST_NAME, &["Nom"]),
    (fields::SEX, &["Sexe"]),
    (fields::BIRTH_DATE, &["Date naissance", "Date de naissance"]),
    (fields::BIRTH_PLACE, &["Lieu naissance", "Lieu de naissance"]),
    (fields::LATENESS, &["Retard", "Retards"]),
    (fields::ABSENCE, &["Absence", "Absences"]),
    (fields::DISCIPLINE_COUNCIL, &["C.D.", "Conseil de discipline"]),
    (fields::AVERAGE, &["Moy", "Moyenne"]),
    (fields::RANK, &["Rang"]),
    (fields::COUNCIL_DECISION, &["Décision conseil"]),
    (fields::REMARKS, &["Appréciation"]),
    (fields::COUNCIL_OBSERVATION, &["Observation conseil"]),
];

/// Case, accent and punctuation insensitive form of a header label.
pub fn fold_label(label: &str) -> String {
    label
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn accepts(field: &str, label: &str) -> bool {
    let folded = fold_label(label);
    if folded == fold_label(field) {
        return true;
    }
    ALIASES
        .iter()
        .filter(|(canonical, _)| *canonical == field)
        .flat_map(|(_, spellings)| spellings.iter())
        .any(|spelling| fold_label(spelling) == folded)
}

/// Position of the column of `table` that spells `field`, if any.
pub fn find_column(table: &Table, field: &str) -> Option<usize> {
    table
        .column_index(field)
        .or_else(|| table.columns.iter().position(|label| accepts(field, label)))
}

/// Rejects a summary sheet lacking the identifier or the average column.
pub fn validate_summary(summary: &Table) -> Result<()> {
    let missing: Vec<String> = [fields::STUDENT_ID, fields::AVERAGE]
        .into_iter()
        .filter(|field| find_column(summary, field).is_none())
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ToolError::MissingColumns {
            sheet: SUMMARY_SHEET.to_string(),
            columns: missing,
        })
    }
}

/// Renames known headers to canonical names and synthesises the identity
/// columns: blank or missing names become [`UNDEFINED_NAME`], a missing
/// identifier column is created empty so the loader can reject those rows.
pub fn normalize_summary(mut summary: Table) -> Table {
    for (field, _) in ALIASES {
        if summary.has_column(field) {
            continue;
        }
        if let Some(index) = find_column(&summary, field) {
            summary.columns[index] = field.to_string();
        }
    }

    let placeholder = Cell::text(UNDEFINED_NAME);
    for field in [fields::FIRST_NAME, fields::LAST_NAME] {
        summary.ensure_column(field, placeholder.clone());
        summary.fill_empty(field, &placeholder);
    }
    summary.ensure_column(fields::STUDENT_ID, Cell::Empty);
    summary
}

/// Ensures the identity columns of the pivot frame exist.
pub fn normalize_pivot(mut pivot: Table) -> Table {
    for field in [fields::STUDENT_ID, fields::FIRST_NAME, fields::LAST_NAME] {
        pivot.ensure_column(field, Cell::Empty);
    }
    pivot
}

/// Whether a pivot/ledger column holds a discipline rather than identity or
/// scope data.
pub fn is_discipline_column(label: &str) -> bool {
    !fields::PIVOT_IDENTITY
        .iter()
        .chain(fields::SCOPE.iter())
        .any(|field| *field == label)
}
