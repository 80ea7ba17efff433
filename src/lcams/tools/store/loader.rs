//! Loads normalized frames into the relational store.
//!
//! Master data (students, classes, disciplines) is resolved or created on
//! demand; term facts replace whatever the scope held before. Per-row and
//! per-cell failures are logged and skipped, only an unresolvable class
//! anchor aborts the load and rolls the transaction back.

use std::collections::HashMap;

use rusqlite::{Connection, Transaction, params};
use tracing::{debug, info, instrument, warn};

use crate::lcams::tools::coerce::{Numeric, name_or_placeholder, non_blank, parse_numeric};
use crate::lcams::tools::error::Result;
use crate::lcams::tools::io::workbook_read::DetailTable;
use crate::lcams::tools::model::{Cell, Scope, Table, Term};
use crate::lcams::tools::normalize::{fields, is_discipline_column};
use crate::lcams::tools::store::admin;

/// Counters describing a partially successful load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub school_year: String,
    pub class_id: i64,
    pub students_created: usize,
    pub averages_written: usize,
    pub grades_written: usize,
    /// Summary or detail rows without a student id.
    pub rows_skipped: usize,
    /// Non-numeric grade cells and rows whose insert failed.
    pub cells_rejected: usize,
}

/// Upserts master data and replaces the term facts of `scope`.
#[instrument(level = "info", skip_all, fields(%scope))]
pub fn load_scope(
    conn: &mut Connection,
    scope: &Scope,
    summary: &Table,
    pivot: &Table,
    detail: Option<&DetailTable>,
) -> Result<LoadReport> {
    let tx = conn.transaction()?;

    let school_year = admin::active_school_year_label(&tx)?;
    let class_id =
        admin::resolve_or_create_class(&tx, &scope.level, &scope.class, summary.len() as i64)?;
    let mut report = LoadReport {
        school_year,
        class_id,
        ..LoadReport::default()
    };

    let cleared = clear_scope_facts(&tx, scope.term, class_id, &report.school_year)?;
    debug!(cleared, "previous facts of the scope removed");

    load_averages(&tx, scope.term, summary, &mut report)?;
    load_grades(&tx, scope.term, pivot, detail, &mut report)?;

    tx.commit()?;
    info!(
        students_created = report.students_created,
        averages = report.averages_written,
        grades = report.grades_written,
        skipped = report.rows_skipped,
        rejected = report.cells_rejected,
        "relational load complete"
    );
    Ok(report)
}

/// Removes the term facts of every student currently attached to the class
/// for the given school year.
fn clear_scope_facts(tx: &Transaction<'_>, term: Term, class_id: i64, school_year: &str) -> Result<usize> {
    let mut removed = 0;
    for table in [term.averages_table(), term.grades_table()] {
        removed += tx.execute(
            &format!(
                "DELETE FROM {table}
                 WHERE school_year = ?
                   AND student_id IN (SELECT id FROM students WHERE class_id = ?)"
            ),
            params![school_year, class_id],
        )?;
    }
    Ok(removed)
}

fn optional_text(table: &Table, row: &[Cell], field: &str) -> Option<String> {
    non_blank(table.get(row, field))
}

fn load_averages(tx: &Transaction<'_>, term: Term, summary: &Table, report: &mut LoadReport) -> Result<()> {
    let insert_student = "INSERT INTO students(id, first_name, last_name, sex, birth_date, birth_place, class_id, school_year)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO NOTHING";
    let insert_average = format!(
        "INSERT INTO {}(student_id, average, rank, lateness, absence, discipline_council, remarks, observation, school_year)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, school_year) DO UPDATE SET
           average = excluded.average,
           rank = excluded.rank,
           lateness = excluded.lateness,
           absence = excluded.absence,
           discipline_council = excluded.discipline_council,
           remarks = excluded.remarks,
           observation = excluded.observation",
        term.averages_table()
    );
    let mut student_stmt = tx.prepare(insert_student)?;
    let mut average_stmt = tx.prepare(&insert_average)?;

    for row in &summary.rows {
        let Some(student_id) = optional_text(summary, row, fields::STUDENT_ID) else {
            report.rows_skipped += 1;
            continue;
        };

        let created = student_stmt.execute(params![
            student_id,
            name_or_placeholder(summary.get(row, fields::FIRST_NAME)),
            name_or_placeholder(summary.get(row, fields::LAST_NAME)),
            optional_text(summary, row, fields::SEX),
            optional_text(summary, row, fields::BIRTH_DATE),
            optional_text(summary, row, fields::BIRTH_PLACE),
            report.class_id,
            report.school_year,
        ]);
        match created {
            Ok(count) => report.students_created += count,
            Err(error) => {
                warn!(%student_id, %error, "failed to insert student, skipping row");
                report.cells_rejected += 1;
                continue;
            }
        }

        let numeric = |field: &str| parse_numeric(summary.get(row, field));
        let average = numeric(fields::AVERAGE);
        if average == Numeric::NotANumber && !summary.get(row, fields::AVERAGE).is_empty() {
            warn!(%student_id, "non-numeric average stored as 0");
        }
        let inserted = average_stmt.execute(params![
            student_id,
            average.or_zero(),
            numeric(fields::RANK).or_zero_count(),
            numeric(fields::LATENESS).or_zero_count(),
            numeric(fields::ABSENCE).or_zero_count(),
            optional_text(summary, row, fields::DISCIPLINE_COUNCIL).unwrap_or_default(),
            optional_text(summary, row, fields::REMARKS).unwrap_or_default(),
            optional_text(summary, row, fields::COUNCIL_OBSERVATION).unwrap_or_default(),
            report.school_year,
        ]);
        match inserted {
            Ok(_) => report.averages_written += 1,
            Err(error) => {
                warn!(%student_id, %error, "failed to insert term average");
                report.cells_rejected += 1;
            }
        }
    }
    Ok(())
}

fn load_grades(
    tx: &Transaction<'_>,
    term: Term,
    pivot: &Table,
    detail: Option<&DetailTable>,
    report: &mut LoadReport,
) -> Result<()> {
    let insert_grade = format!(
        "INSERT INTO {}(student_id, discipline_id, continuous_average, exam, final_average, rank, school_year)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, discipline_id, school_year) DO UPDATE SET
           continuous_average = excluded.continuous_average,
           exam = excluded.exam,
           final_average = excluded.final_average,
           rank = excluded.rank",
        term.grades_table()
    );
    let mut grade_stmt = tx.prepare(&insert_grade)?;

    let mut disciplines: Vec<(usize, String, i64)> = Vec::new();
    for (index, label) in pivot.columns.iter().enumerate() {
        if !is_discipline_column(label) {
            continue;
        }
        match admin::resolve_or_create_discipline(tx, label) {
            Ok(id) => disciplines.push((index, label.clone(), id)),
            Err(error) => {
                warn!(discipline = %label, %error, "failed to resolve discipline, column skipped");
                report.cells_rejected += pivot.len();
            }
        }
    }

    let detail_rows: HashMap<String, usize> = detail
        .map(DetailTable::index_by_student)
        .unwrap_or_default();

    let empty = Cell::Empty;
    for row in &pivot.rows {
        let Some(student_id) = optional_text(pivot, row, fields::STUDENT_ID) else {
            report.rows_skipped += 1;
            continue;
        };
        let detail_row = detail.zip(detail_rows.get(&student_id).copied());

        for (index, label, discipline_id) in &disciplines {
            let cell = row.get(*index).unwrap_or(&empty);
            let Numeric::Value(final_average) = parse_numeric(cell) else {
                if !cell.is_empty() {
                    warn!(%student_id, discipline = %label, value = %cell, "non-numeric grade ignored");
                    report.cells_rejected += 1;
                }
                continue;
            };

            let (continuous_average, exam, rank) = match detail_row {
                Some((detail, position)) => {
                    let metrics = detail.metrics(position, label);
                    (
                        parse_numeric(&metrics.continuous_average).value(),
                        parse_numeric(&metrics.exam).value(),
                        parse_numeric(&metrics.rank)
                            .value()
                            .filter(|v| *v >= 0.0)
                            .map(|v| v.trunc() as i64),
                    )
                }
                None => (None, None, None),
            };

            let inserted = grade_stmt.execute(params![
                student_id,
                discipline_id,
                continuous_average,
                exam,
                final_average,
                rank,
                report.school_year,
            ]);
            match inserted {
                Ok(_) => report.grades_written += 1,
                Err(error) => {
                    warn!(%student_id, discipline = %label, %error, "failed to insert grade");
                    report.cells_rejected += 1;
                }
            }
        }
    }
    Ok(())
}
