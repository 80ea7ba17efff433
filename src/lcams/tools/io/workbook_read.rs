use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};
use chrono::{Days, NaiveDate};
use tracing::{debug, instrument};

use crate::lcams::tools::error::{Result, ToolError};
use crate::lcams::tools::model::{Cell, Table};
use crate::lcams::tools::normalize::{self, fields, fold_label};

/// Sheet holding one row per student with the overall term result.
pub const SUMMARY_SHEET: &str = "Moyennes eleves";
/// Sheet holding every discipline sub-metric under a two-row header.
pub const DETAIL_SHEET: &str = "Données détaillées";
/// Decorative rows preceding the summary header.
pub const SUMMARY_SKIP_ROWS: usize = 11;
/// Decorative rows preceding the two-row detail header.
pub const DETAIL_SKIP_ROWS: usize = 8;
/// Leading detail columns holding id, first name and last name.
pub const IDENTITY_COLUMNS: usize = 3;

/// Sub-metric reported for each discipline in the detail sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Metric {
    /// "Moy DD", continuous-assessment average.
    ContinuousAverage,
    /// "Comp D", exam score.
    Exam,
    /// "Moy D", final discipline average.
    FinalAverage,
    /// "Rang D", rank in the discipline.
    Rank,
    Other(String),
}

impl Metric {
    pub fn classify(label: &str) -> Self {
        match fold_label(label).as_str() {
            "moydd" => Metric::ContinuousAverage,
            "compd" => Metric::Exam,
            "moyd" => Metric::FinalAverage,
            "rangd" => Metric::Rank,
            _ => Metric::Other(label.trim().to_string()),
        }
    }
}

/// A detail-sheet column attributed to its discipline after forward fill.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailColumn {
    pub discipline: String,
    pub metric: Metric,
}

/// The pre-pivot detail sheet: identity columns plus every sub-metric column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailTable {
    pub identity: Table,
    pub columns: Vec<DetailColumn>,
    pub values: Vec<Vec<Cell>>,
}

/// All sub-metrics of one student in one discipline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisciplineMetrics {
    pub continuous_average: Cell,
    pub exam: Cell,
    pub final_average: Cell,
    pub rank: Cell,
}

impl DetailTable {
    /// Row index of every student id present in the identity columns.
    pub fn index_by_student(&self) -> HashMap<String, usize> {
        let mut index = HashMap::new();
        for (position, row) in self.identity.rows.iter().enumerate() {
            let id = self.identity.get(row, fields::STUDENT_ID).key();
            if !id.is_empty() {
                index.entry(id).or_insert(position);
            }
        }
        index
    }

    pub fn metrics(&self, row: usize, discipline: &str) -> DisciplineMetrics {
        let mut metrics = DisciplineMetrics::default();
        let Some(values) = self.values.get(row) else {
            return metrics;
        };
        for (column, cell) in self.columns.iter().zip(values) {
            if column.discipline != discipline {
                continue;
            }
            let slot = match column.metric {
                Metric::ContinuousAverage => &mut metrics.continuous_average,
                Metric::Exam => &mut metrics.exam,
                Metric::FinalAverage => &mut metrics.final_average,
                Metric::Rank => &mut metrics.rank,
                Metric::Other(_) => continue,
            };
            if slot.is_empty() {
                *slot = cell.clone();
            }
        }
        metrics
    }
}

/// Flattened content of an external grading workbook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedWorkbook {
    /// One row per student, flat columns, raw external headers.
    pub summary: Table,
    /// One column per discipline holding only the final average.
    pub wide: Table,
    /// Identity columns, optional sex column, then `wide`.
    pub pivot: Table,
    /// Every sub-metric with its discipline resolved.
    pub detail: DetailTable,
}

/// Parses the workbook at `path`.
#[instrument(level = "info", skip_all, fields(input = %path.display()))]
pub fn parse_workbook(path: &Path) -> Result<ParsedWorkbook> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(parse_failure)?;
    parse_from(&mut workbook)
}

/// Parses a workbook held in memory, e.g. an uploaded file.
pub fn parse_workbook_bytes(bytes: &[u8]) -> Result<ParsedWorkbook> {
    let mut workbook = Xlsx::new(Cursor::new(bytes)).map_err(parse_failure)?;
    parse_from(&mut workbook)
}

fn parse_from<R: Read + Seek>(workbook: &mut Xlsx<R>) -> Result<ParsedWorkbook> {
    let summary_grid = read_sheet(workbook, SUMMARY_SHEET)?;
    let detail_grid = read_sheet(workbook, DETAIL_SHEET)?;

    let summary = build_summary(summary_grid)?;
    let detail = build_detail(detail_grid)?;
    let wide = project_final_averages(&detail);
    let pivot = build_pivot(&detail, &wide, &summary);

    debug!(
        students = summary.len(),
        disciplines = wide.columns.len(),
        "workbook flattened"
    );

    Ok(ParsedWorkbook {
        summary,
        wide,
        pivot,
        detail,
    })
}

fn parse_failure(error: impl std::fmt::Display) -> ToolError {
    ToolError::Parse(error.to_string())
}

fn read_sheet<R: Read + Seek>(workbook: &mut Xlsx<R>, name: &str) -> Result<Vec<Vec<Cell>>> {
    let range = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::Parse(format!("missing sheet '{name}'")))?
        .map_err(|error| ToolError::Parse(format!("sheet '{name}': {error}")))?;
    Ok(sheet_grid(&range))
}

/// Materialises a sheet from cell A1 onwards so that skip counts refer to
/// absolute sheet rows, whatever the used range of the sheet is.
pub(crate) fn sheet_grid(range: &Range<DataType>) -> Vec<Vec<Cell>> {
    let Some((last_row, last_col)) = range.end() else {
        return Vec::new();
    };
    (0..=last_row)
        .map(|row| {
            (0..=last_col)
                .map(|col| data_to_cell(range.get_value((row, col))))
                .collect()
        })
        .collect()
}

pub(crate) fn data_to_cell(value: Option<&DataType>) -> Cell {
    match value {
        Some(DataType::String(text)) => Cell::text(text.clone()),
        Some(DataType::Float(number)) => Cell::Number(*number),
        Some(DataType::Int(number)) => Cell::Number(*number as f64),
        Some(DataType::Bool(flag)) => Cell::Text(flag.to_string()),
        Some(DataType::DateTime(serial)) => excel_serial_to_date(*serial)
            .map(|date| Cell::Text(date.format("%Y-%m-%d").to_string()))
            .unwrap_or(Cell::Number(*serial)),
        Some(DataType::Empty) | Some(DataType::Error(_)) | None => Cell::Empty,
        Some(other) => Cell::text(other.to_string()),
    }
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.trunc() as u64))
}

fn header_label(cell: &Cell, index: usize) -> String {
    let label = cell.key();
    if label.is_empty() {
        format!("Unnamed: {index}")
    } else {
        label
    }
}

fn is_blank_row(row: &[Cell]) -> bool {
    row.iter().all(Cell::is_empty)
}

fn build_summary(grid: Vec<Vec<Cell>>) -> Result<Table> {
    let mut rows = grid.into_iter().skip(SUMMARY_SKIP_ROWS);
    let header = rows.next().ok_or_else(|| {
        ToolError::Parse(format!(
            "sheet '{SUMMARY_SHEET}' has no header row after {SUMMARY_SKIP_ROWS} rows"
        ))
    })?;
    let columns = header
        .iter()
        .enumerate()
        .map(|(index, cell)| header_label(cell, index))
        .collect();

    let mut table = Table::new(columns);
    for row in rows.filter(|row| !is_blank_row(row)) {
        table.push_row(row);
    }
    Ok(table)
}

/// Propagates the nearest preceding discipline label over placeholder cells
/// of a merged outer header. Blank cells and pandas-style `Unnamed: n`
/// labels are placeholders.
pub fn forward_fill(outer: &[String]) -> Vec<String> {
    let mut current = String::new();
    outer
        .iter()
        .map(|label| {
            let label = label.trim();
            if !label.is_empty() && !label.starts_with("Unnamed") {
                current = label.to_string();
            }
            current.clone()
        })
        .collect()
}

fn build_detail(grid: Vec<Vec<Cell>>) -> Result<DetailTable> {
    let mut rows = grid.into_iter().skip(DETAIL_SKIP_ROWS);
    let (Some(outer), Some(inner)) = (rows.next(), rows.next()) else {
        return Err(ToolError::Parse(format!(
            "sheet '{DETAIL_SHEET}' has no two-row header after {DETAIL_SKIP_ROWS} rows"
        )));
    };
    if outer.len() < IDENTITY_COLUMNS {
        return Err(ToolError::Parse(format!(
            "sheet '{DETAIL_SHEET}' has {} columns, expected at least {IDENTITY_COLUMNS}",
            outer.len()
        )));
    }

    let outer_labels: Vec<String> = outer.iter().map(Cell::key).collect();
    let disciplines = forward_fill(&outer_labels);
    let columns: Vec<DetailColumn> = disciplines
        .into_iter()
        .zip(inner.iter())
        .skip(IDENTITY_COLUMNS)
        .map(|(discipline, metric)| DetailColumn {
            discipline,
            metric: Metric::classify(&metric.key()),
        })
        .collect();

    let mut identity = Table::new(vec![
        fields::STUDENT_ID.to_string(),
        fields::FIRST_NAME.to_string(),
        fields::LAST_NAME.to_string(),
    ]);
    let mut values = Vec::new();
    for mut row in rows.filter(|row| !is_blank_row(row)) {
        row.resize(IDENTITY_COLUMNS + columns.len(), Cell::Empty);
        let metrics = row.split_off(IDENTITY_COLUMNS);
        identity.push_row(row);
        values.push(metrics);
    }

    Ok(DetailTable {
        identity,
        columns,
        values,
    })
}

/// Keeps only the final-average sub-metric of each discipline, one column per
/// discipline labelled with the discipline name.
pub fn project_final_averages(detail: &DetailTable) -> Table {
    let selected: Vec<usize> = detail
        .columns
        .iter()
        .enumerate()
        .filter(|(_, column)| column.metric == Metric::FinalAverage)
        .map(|(index, _)| index)
        .collect();

    let mut wide = Table::new(
        selected
            .iter()
            .map(|&index| detail.columns[index].discipline.clone())
            .collect(),
    );
    for row in &detail.values {
        wide.push_row(
            selected
                .iter()
                .map(|&index| row.get(index).cloned().unwrap_or_default())
                .collect(),
        );
    }
    wide
}

fn build_pivot(detail: &DetailTable, wide: &Table, summary: &Table) -> Table {
    let mut pivot = detail.identity.clone();
    for (row, extra) in pivot.rows.iter_mut().zip(&wide.rows) {
        row.extend(extra.iter().cloned());
    }
    pivot.columns.extend(wide.columns.iter().cloned());

    if let Some(sex) = normalize::find_column(summary, fields::SEX) {
        let values = summary
            .rows
            .iter()
            .map(|row| row.get(sex).cloned().unwrap_or_default())
            .collect();
        pivot.insert_column(IDENTITY_COLUMNS, fields::SEX, values);
    }
    pivot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn forward_fill_attributes_sub_metrics_to_discipline() {
        let outer = labels(&["Math", "", "", "Science", ""]);
        assert_eq!(
            forward_fill(&outer),
            labels(&["Math", "Math", "Math", "Science", "Science"])
        );
    }

    #[test]
    fn forward_fill_treats_unnamed_as_placeholder() {
        let outer = labels(&["Français", "Unnamed: 4_level_0", "Anglais"]);
        assert_eq!(
            forward_fill(&outer),
            labels(&["Français", "Français", "Anglais"])
        );
    }

    #[test]
    fn wide_projection_keeps_only_final_averages() {
        let detail = DetailTable {
            identity: Table::new(labels(&["student_id", "first_name", "last_name"])),
            columns: vec![
                DetailColumn {
                    discipline: "Math".into(),
                    metric: Metric::classify("Moy DD"),
                },
                DetailColumn {
                    discipline: "Math".into(),
                    metric: Metric::classify("Moy D"),
                },
                DetailColumn {
                    discipline: "French".into(),
                    metric: Metric::classify("Moy D"),
                },
                DetailColumn {
                    discipline: "French".into(),
                    metric: Metric::classify("Rang D"),
                },
            ],
            values: vec![vec![
                Cell::Number(11.0),
                Cell::Number(12.5),
                Cell::Number(14.0),
                Cell::Number(3.0),
            ]],
        };

        let wide = project_final_averages(&detail);

        assert_eq!(wide.columns, labels(&["Math", "French"]));
        assert_eq!(wide.rows, vec![vec![Cell::Number(12.5), Cell::Number(14.0)]]);
    }

    #[test]
    fn excel_serial_dates_are_iso_formatted() {
        assert_eq!(
            data_to_cell(Some(&DataType::DateTime(45000.0))),
            Cell::Text("2023-03-15".into())
        );
    }
}
