//! Commands that keep the relational store and the ledger workbook in step.
//!
//! Every command writes the relational store first, inside one transaction,
//! and the ledger second. The two stores are not updated atomically: when the
//! ledger write fails after a committed relational write, the stores disagree
//! until [`Workspace::reconcile_scope`] rebuilds the ledger rows of the scope
//! from the relational store.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::lcams::tools::coerce;
use crate::lcams::tools::config::Settings;
use crate::lcams::tools::error::{Result, ToolError};
use crate::lcams::tools::io::excel_write::{self, SheetTable};
use crate::lcams::tools::io::ledger::{ImportRecord, Ledger, LedgerFilter, LedgerReport};
use crate::lcams::tools::io::workbook_read::{self, DETAIL_SHEET, ParsedWorkbook, SUMMARY_SHEET};
use crate::lcams::tools::model::{Scope, Term};
use crate::lcams::tools::normalize::{self, fields};
use crate::lcams::tools::store::delete::{self, DeletionCounts};
use crate::lcams::tools::store::loader::{self, LoadReport};
use crate::lcams::tools::store::{Store, admin, backup, query};

/// Outcome of [`Workspace::import_term`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub scope: Scope,
    pub load: LoadReport,
    pub ledger: LedgerReport,
}

/// Outcome of the three cascading deletions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletionReport {
    pub counts: DeletionCounts,
    pub ledger: LedgerReport,
}

/// Student ids of one scope as seen by each store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeConsistency {
    pub relational: BTreeSet<String>,
    pub ledger: BTreeSet<String>,
}

impl ScopeConsistency {
    pub fn is_consistent(&self) -> bool {
        self.relational == self.ledger
    }
}

/// The data directory: relational store plus ledger workbook.
#[derive(Debug, Clone)]
pub struct Workspace {
    settings: Settings,
    store: Store,
    ledger: Ledger,
}

impl Workspace {
    /// Opens the workspace described by `settings`, creating and seeding the
    /// relational store when needed.
    #[instrument(level = "info", skip_all, fields(data_dir = %settings.data_dir.display()))]
    pub fn open(settings: Settings) -> Result<Self> {
        let store = Store::new(settings.database_path());
        store.init(&settings.default_levels, &settings.default_school_year)?;
        let ledger = Ledger::new(settings.ledger_path());
        Ok(Self {
            settings,
            store,
            ledger,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Imports one external grading workbook for `scope`.
    ///
    /// Structural and validation failures abort before either store is
    /// touched. Row-level problems are logged and counted in the report.
    #[instrument(level = "info", skip_all, fields(input = %input.display(), %scope))]
    pub fn import_term(&self, input: &Path, scope: &Scope) -> Result<ImportReport> {
        if !input.exists() {
            return Err(ToolError::MissingInput(input.to_path_buf()));
        }
        let parsed = workbook_read::parse_workbook(input)?;
        info!(students = parsed.summary.len(), "workbook parsed");
        self.import_parsed(parsed, scope)
    }

    /// Imports an already parsed workbook, e.g. one read from memory.
    pub fn import_parsed(&self, parsed: ParsedWorkbook, scope: &Scope) -> Result<ImportReport> {
        normalize::validate_summary(&parsed.summary)?;
        let summary = normalize::normalize_summary(parsed.summary);
        let pivot = normalize::normalize_pivot(parsed.pivot);

        let mut conn = self.store.open()?;
        let load = loader::load_scope(&mut conn, scope, &summary, &pivot, Some(&parsed.detail))?;
        drop(conn);

        let ledger = self.ledger.merge_scope(scope, &summary, &pivot)?;
        if ledger.corrupt {
            warn!(ledger = %self.ledger.path().display(), "ledger was rebuilt from this import only");
        }
        Ok(ImportReport {
            scope: scope.clone(),
            load,
            ledger,
        })
    }

    /// Removes a student and all of its facts, then its ledger rows for `scope`.
    #[instrument(level = "info", skip_all, fields(%student_id, %scope))]
    pub fn delete_student(&self, student_id: &str, scope: &Scope) -> Result<DeletionReport> {
        let mut conn = self.store.open()?;
        let tx = conn.transaction()?;
        let counts = delete::delete_student(&tx, student_id)?;
        tx.commit()?;

        let ledger = self.ledger.remove(&LedgerFilter::Student {
            student_id: student_id.to_string(),
            scope: scope.clone(),
        })?;
        info!(facts = counts.facts, ledger_rows = ledger.removed_rows, "student deleted");
        Ok(DeletionReport { counts, ledger })
    }

    /// Undoes an import: removes every student listed in the summary sheet of
    /// `parsed` from the relational store, then their ledger rows for `scope`.
    #[instrument(level = "info", skip_all, fields(%scope))]
    pub fn delete_import(&self, parsed: &ParsedWorkbook, scope: &Scope) -> Result<DeletionReport> {
        let summary = normalize::normalize_summary(parsed.summary.clone());
        let student_ids: BTreeSet<String> = summary
            .rows
            .iter()
            .filter_map(|row| coerce::non_blank(summary.get(row, fields::STUDENT_ID)))
            .collect();

        let mut conn = self.store.open()?;
        let tx = conn.transaction()?;
        let mut counts = DeletionCounts::default();
        for student_id in &student_ids {
            counts += delete::delete_student(&tx, student_id)?;
        }
        tx.commit()?;

        let ledger = self.ledger.remove(&LedgerFilter::Students {
            student_ids,
            scope: scope.clone(),
        })?;
        info!(
            students = counts.students,
            ledger_rows = ledger.removed_rows,
            "import deleted"
        );
        Ok(DeletionReport { counts, ledger })
    }

    /// Removes a class with all of its students, then its ledger rows for `scope`.
    #[instrument(level = "info", skip_all, fields(%scope))]
    pub fn delete_class(&self, scope: &Scope) -> Result<DeletionReport> {
        let mut conn = self.store.open()?;
        let tx = conn.transaction()?;
        let counts = delete::delete_class(&tx, &scope.level, &scope.class)?;
        tx.commit()?;

        let ledger = self.ledger.remove(&LedgerFilter::Class(scope.clone()))?;
        info!(
            students = counts.students,
            ledger_rows = ledger.removed_rows,
            "class deleted"
        );
        Ok(DeletionReport { counts, ledger })
    }

    /// Removes a level with all of its classes, then its ledger rows for `term`.
    #[instrument(level = "info", skip_all, fields(%level, %term))]
    pub fn delete_level(&self, level: &str, term: Term) -> Result<DeletionReport> {
        let mut conn = self.store.open()?;
        let tx = conn.transaction()?;
        let counts = delete::delete_level(&tx, level)?;
        tx.commit()?;

        let ledger = self.ledger.remove(&LedgerFilter::Level {
            level: level.to_string(),
            term,
        })?;
        info!(
            classes = counts.classes,
            students = counts.students,
            ledger_rows = ledger.removed_rows,
            "level deleted"
        );
        Ok(DeletionReport { counts, ledger })
    }

    /// Rebuilds the ledger rows of `scope` from the relational store.
    #[instrument(level = "info", skip_all, fields(%scope))]
    pub fn reconcile_scope(&self, scope: &Scope) -> Result<LedgerReport> {
        let conn = self.store.open()?;
        let school_year = admin::active_school_year_label(&conn)?;
        let averages = query::class_term_averages(&conn, scope, &school_year)?;
        let grades = query::class_term_grades(&conn, scope, &school_year)?;
        drop(conn);

        let summary = query::averages_frame(&averages);
        let detail = query::grades_frame(&averages, &grades);
        let report = self.ledger.merge_scope(scope, &summary, &detail)?;
        info!(
            students = averages.len(),
            grades = grades.len(),
            "ledger scope rebuilt from the relational store"
        );
        Ok(report)
    }

    /// Compares the student ids each store holds for `scope`.
    pub fn scope_consistency(&self, scope: &Scope) -> Result<ScopeConsistency> {
        let conn = self.store.open()?;
        let school_year = admin::active_school_year_label(&conn)?;
        let relational = query::scope_student_ids(&conn, scope, &school_year)?;
        let ledger = self.ledger.scope_student_ids(scope).map_err(corrupt_ledger)?;
        Ok(ScopeConsistency { relational, ledger })
    }

    /// Deletes every fact of `term` recorded under `school_year`. The ledger
    /// is left as is.
    #[instrument(level = "info", skip_all, fields(%term, %school_year))]
    pub fn purge_term(&self, term: Term, school_year: &str) -> Result<usize> {
        let mut conn = self.store.open()?;
        let tx = conn.transaction()?;
        let removed = delete::purge_term(&tx, term, school_year)?;
        tx.commit()?;
        info!(removed, "term purged");
        Ok(removed)
    }

    /// Copies the relational store to a timestamped backup file.
    pub fn backup_store(&self) -> Result<PathBuf> {
        backup::backup(self.store.path(), &self.settings.backups_dir())
    }

    /// Regular backups, newest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        backup::list_backups(&self.settings.backups_dir())
    }

    /// Replaces the relational store with a backup. A bare file name is looked
    /// up in the backups directory. Returns the safety copy of the replaced
    /// store. The ledger is not touched.
    pub fn restore_store(&self, source: &Path) -> Result<Option<PathBuf>> {
        let source = if source.components().count() == 1 {
            self.settings.backups_dir().join(source)
        } else {
            source.to_path_buf()
        };
        backup::restore(self.store.path(), &self.settings.backups_dir(), &source)
    }

    /// Removes the relational store after a safety copy. It is recreated
    /// empty on the next [`Workspace::open`].
    pub fn reset_store(&self) -> Result<Option<PathBuf>> {
        backup::reset(self.store.path(), &self.settings.backups_dir())
    }

    /// Student rows per imported scope, read from the ledger.
    pub fn import_history(&self) -> Result<Vec<ImportRecord>> {
        self.ledger.history().map_err(corrupt_ledger)
    }
}

fn corrupt_ledger(reason: String) -> ToolError {
    ToolError::Parse(format!("ledger is unreadable: {reason}"))
}

/// Writes the normalized summary and pivot frames of `parsed` to a standalone
/// two-sheet workbook.
#[instrument(level = "info", skip_all, fields(output = %output.display()))]
pub fn export_processed(parsed: &ParsedWorkbook, output: &Path) -> Result<()> {
    normalize::validate_summary(&parsed.summary)?;
    let summary = normalize::normalize_summary(parsed.summary.clone());
    let pivot = normalize::normalize_pivot(parsed.pivot.clone());
    excel_write::write_workbook(
        output,
        &[
            SheetTable {
                sheet_name: SUMMARY_SHEET,
                table: &summary,
            },
            SheetTable {
                sheet_name: DETAIL_SHEET,
                table: &pivot,
            },
        ],
    )
}
