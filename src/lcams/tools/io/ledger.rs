//! The cumulative ledger workbook: both sheets of every import, tagged with
//! their (level, class, term) scope.
//!
//! The ledger has no partial-update capability and no locking. Every
//! operation reads both sheets, edits them in memory and rewrites the whole
//! file, so two concurrent writers would lose one of the updates.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use calamine::{Reader, Xlsx, open_workbook};
use tracing::{debug, instrument, warn};

use crate::lcams::tools::error::Result;
use crate::lcams::tools::io::excel_write::{self, SheetTable};
use crate::lcams::tools::io::workbook_read::{DETAIL_SHEET, SUMMARY_SHEET, sheet_grid};
use crate::lcams::tools::model::{Cell, Scope, Table, Term};
use crate::lcams::tools::normalize::fields;

/// In-memory copy of both ledger sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSheets {
    pub summary: Table,
    pub detail: Table,
}

/// Outcome of reading the ledger file.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerLoad {
    Missing,
    Loaded(LedgerSheets),
    /// The file exists but could not be read as a two-sheet ledger.
    Corrupt(String),
}

/// Rows removed by a deletion, narrowest scope first.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerFilter {
    Student { student_id: String, scope: Scope },
    /// Every listed student of one scope, e.g. the rows of one import.
    Students { student_ids: BTreeSet<String>, scope: Scope },
    Class(Scope),
    Level { level: String, term: Term },
}

impl LedgerFilter {
    fn matches(&self, table: &Table, row: &[Cell]) -> bool {
        let level_term = |level: &str, term: Term| {
            table.get(row, fields::LEVEL).matches(level)
                && table.get(row, fields::TERM).matches(&term.to_string())
        };
        match self {
            LedgerFilter::Student { student_id, scope } => {
                table.get(row, fields::STUDENT_ID).matches(student_id)
                    && table.get(row, fields::CLASS).matches(&scope.class)
                    && level_term(&scope.level, scope.term)
            }
            LedgerFilter::Students { student_ids, scope } => {
                student_ids.contains(&table.get(row, fields::STUDENT_ID).key())
                    && table.get(row, fields::CLASS).matches(&scope.class)
                    && level_term(&scope.level, scope.term)
            }
            LedgerFilter::Class(scope) => {
                table.get(row, fields::CLASS).matches(&scope.class)
                    && level_term(&scope.level, scope.term)
            }
            LedgerFilter::Level { level, term } => level_term(level, *term),
        }
    }
}

/// What a ledger write did, so callers can surface data-loss risks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerReport {
    /// The previous file was unreadable. A merge restarted from an empty
    /// ledger; a removal left the file untouched.
    pub corrupt: bool,
    pub removed_rows: usize,
    pub summary_rows: usize,
    pub detail_rows: usize,
}

/// Number of summary rows stored for one imported scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub scope: Scope,
    pub students: usize,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads both sheets. Never fails: unreadable files are reported as
    /// [`LedgerLoad::Corrupt`].
    pub fn load(&self) -> LedgerLoad {
        if !self.path.exists() {
            return LedgerLoad::Missing;
        }
        match self.read_sheets() {
            Ok(sheets) => LedgerLoad::Loaded(sheets),
            Err(reason) => LedgerLoad::Corrupt(reason),
        }
    }

    fn read_sheets(&self) -> std::result::Result<LedgerSheets, String> {
        let mut workbook: Xlsx<_> =
            open_workbook(&self.path).map_err(|err: calamine::XlsxError| err.to_string())?;
        let mut read = |name: &str| -> std::result::Result<Table, String> {
            let range = workbook
                .worksheet_range(name)
                .ok_or_else(|| format!("missing sheet '{name}'"))?
                .map_err(|err| err.to_string())?;
            let mut rows = sheet_grid(&range).into_iter();
            let mut table = match rows.next() {
                Some(header) => Table::new(header.iter().map(Cell::key).collect()),
                None => Table::default(),
            };
            for row in rows.filter(|row| !row.iter().all(Cell::is_empty)) {
                table.push_row(row);
            }
            Ok(table)
        };
        Ok(LedgerSheets {
            summary: read(SUMMARY_SHEET)?,
            detail: read(DETAIL_SHEET)?,
        })
    }

    /// Loaded sheets, or an error describing why the file is unusable.
    pub fn sheets(&self) -> std::result::Result<LedgerSheets, String> {
        match self.load() {
            LedgerLoad::Missing => Ok(LedgerSheets::default()),
            LedgerLoad::Loaded(sheets) => Ok(sheets),
            LedgerLoad::Corrupt(reason) => Err(reason),
        }
    }

    pub fn write(&self, sheets: &LedgerSheets) -> Result<()> {
        excel_write::write_workbook(
            &self.path,
            &[
                SheetTable {
                    sheet_name: SUMMARY_SHEET,
                    table: &sheets.summary,
                },
                SheetTable {
                    sheet_name: DETAIL_SHEET,
                    table: &sheets.detail,
                },
            ],
        )
    }

    /// Replaces every row of `scope` in both sheets with the given frames.
    #[instrument(level = "info", skip_all, fields(ledger = %self.path.display(), %scope))]
    pub fn merge_scope(&self, scope: &Scope, summary: &Table, detail: &Table) -> Result<LedgerReport> {
        let mut report = LedgerReport::default();
        let mut sheets = match self.load() {
            LedgerLoad::Missing => LedgerSheets::default(),
            LedgerLoad::Loaded(sheets) => sheets,
            LedgerLoad::Corrupt(reason) => {
                warn!(
                    %reason,
                    "existing ledger is unreadable, rebuilding it from this import only; previous rows are lost"
                );
                report.corrupt = true;
                LedgerSheets::default()
            }
        };

        let filter = LedgerFilter::Class(scope.clone());
        report.removed_rows += sheets.summary.retain_rows(|table, row| !filter.matches(table, row));
        report.removed_rows += sheets.detail.retain_rows(|table, row| !filter.matches(table, row));

        sheets.summary.concat(tag_with_scope(summary, scope));
        sheets.detail.concat(tag_with_scope(detail, scope));
        sheets.summary.reorder_leading(&fields::SCOPE);
        sheets.detail.reorder_leading(&fields::SCOPE);

        self.write(&sheets)?;
        report.summary_rows = sheets.summary.len();
        report.detail_rows = sheets.detail.len();
        debug!(
            removed = report.removed_rows,
            summary_rows = report.summary_rows,
            "ledger rewritten"
        );
        Ok(report)
    }

    /// Drops every row matching `filter` from both sheets.
    #[instrument(level = "info", skip_all, fields(ledger = %self.path.display(), ?filter))]
    pub fn remove(&self, filter: &LedgerFilter) -> Result<LedgerReport> {
        let mut report = LedgerReport::default();
        let mut sheets = match self.load() {
            LedgerLoad::Missing => return Ok(report),
            LedgerLoad::Loaded(sheets) => sheets,
            LedgerLoad::Corrupt(reason) => {
                warn!(%reason, "ledger is unreadable, leaving it untouched");
                report.corrupt = true;
                return Ok(report);
            }
        };

        report.removed_rows += sheets.summary.retain_rows(|table, row| !filter.matches(table, row));
        report.removed_rows += sheets.detail.retain_rows(|table, row| !filter.matches(table, row));
        self.write(&sheets)?;
        report.summary_rows = sheets.summary.len();
        report.detail_rows = sheets.detail.len();
        Ok(report)
    }

    /// Student-row count per imported scope, ordered by scope.
    pub fn history(&self) -> std::result::Result<Vec<ImportRecord>, String> {
        let sheets = self.sheets()?;
        let summary = &sheets.summary;
        let mut counts: BTreeMap<Scope, usize> = BTreeMap::new();
        for row in &summary.rows {
            let term = match summary.get(row, fields::TERM).key().parse::<Term>() {
                Ok(term) => term,
                Err(_) => {
                    warn!("ledger row without a valid term ignored in history");
                    continue;
                }
            };
            let scope = Scope::new(
                summary.get(row, fields::LEVEL).key(),
                summary.get(row, fields::CLASS).key(),
                term,
            );
            *counts.entry(scope).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(scope, students)| ImportRecord { scope, students })
            .collect())
    }

    /// Student ids present in the summary sheet for `scope`.
    pub fn scope_student_ids(&self, scope: &Scope) -> std::result::Result<BTreeSet<String>, String> {
        let sheets = self.sheets()?;
        let filter = LedgerFilter::Class(scope.clone());
        let summary = &sheets.summary;
        Ok(summary
            .rows
            .iter()
            .filter(|row| filter.matches(summary, row))
            .map(|row| summary.get(row, fields::STUDENT_ID).key())
            .filter(|id| !id.is_empty())
            .collect())
    }
}

/// Copies `frame` with level, class and term columns in front.
pub fn tag_with_scope(frame: &Table, scope: &Scope) -> Table {
    let mut tagged = frame.clone();
    for column in fields::SCOPE {
        if let Some(index) = tagged.column_index(column) {
            tagged.columns.remove(index);
            for row in &mut tagged.rows {
                row.remove(index);
            }
        }
    }
    let count = tagged.rows.len();
    tagged.insert_column(0, fields::TERM, vec![Cell::from(scope.term.number() as i64); count]);
    tagged.insert_column(0, fields::CLASS, vec![Cell::text(scope.class.clone()); count]);
    tagged.insert_column(0, fields::LEVEL, vec![Cell::text(scope.level.clone()); count]);
    tagged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagging_puts_scope_columns_first() {
        let mut frame = Table::new(vec!["student_id".into(), "average".into()]);
        frame.push_row(vec![Cell::from("S1"), Cell::from(15.0)]);
        let tagged = tag_with_scope(&frame, &Scope::new("6th", "A", Term::First));

        assert_eq!(
            tagged.columns,
            vec!["level", "class", "term", "student_id", "average"]
        );
        assert_eq!(
            tagged.rows[0][..3],
            [Cell::from("6th"), Cell::from("A"), Cell::Number(1.0)]
        );
    }

    #[test]
    fn level_filter_ignores_class() {
        let scope = Scope::new("6th", "A", Term::First);
        let mut frame = Table::new(vec!["student_id".into()]);
        frame.push_row(vec![Cell::from("S1")]);
        let tagged = tag_with_scope(&frame, &scope);
        let row = &tagged.rows[0];

        let level = LedgerFilter::Level {
            level: "6th".into(),
            term: Term::First,
        };
        let other_term = LedgerFilter::Level {
            level: "6th".into(),
            term: Term::Second,
        };
        assert!(level.matches(&tagged, row));
        assert!(!other_term.matches(&tagged, row));
    }
}
