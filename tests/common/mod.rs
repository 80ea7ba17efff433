#![allow(dead_code)]

use std::path::{Path, PathBuf};

use lcams_tools::config::Settings;
use lcams_tools::model::{Scope, Term};
use lcams_tools::sync::Workspace;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

/// A value written into a generated grading workbook.
#[derive(Clone, Copy)]
pub enum Value {
    Num(f64),
    Text(&'static str),
    Blank,
}

pub struct StudentRow {
    pub id: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub sex: &'static str,
    pub average: Value,
    pub rank: f64,
    /// Final average per discipline, in discipline order.
    pub grades: Vec<Value>,
}

pub fn student(id: &'static str, average: f64, rank: f64, grades: Vec<Value>) -> StudentRow {
    StudentRow {
        id,
        first_name: "Awa",
        last_name: id,
        sex: "F",
        average: Value::Num(average),
        rank,
        grades,
    }
}

/// Builder for workbooks shaped like the grading platform export.
pub struct GradingWorkbook {
    pub disciplines: Vec<&'static str>,
    pub students: Vec<StudentRow>,
    pub with_average_column: bool,
}

impl GradingWorkbook {
    pub fn new(disciplines: Vec<&'static str>, students: Vec<StudentRow>) -> Self {
        Self {
            disciplines,
            students,
            with_average_column: true,
        }
    }

    /// The two-student, one-discipline class used across the tests.
    pub fn scenario() -> Self {
        Self::new(
            vec!["Math"],
            vec![
                student("S1", 15.0, 1.0, vec![Value::Num(16.0)]),
                student("S2", 8.5, 2.0, vec![Value::Num(7.0)]),
            ],
        )
    }

    pub fn write(&self, path: &Path) -> PathBuf {
        let mut workbook = Workbook::new();

        let summary = workbook.add_worksheet();
        summary.set_name("Moyennes eleves").expect("summary sheet named");
        summary
            .write_string(0, 0, "Relevé des moyennes")
            .expect("title written");
        let mut header = vec!["IEN", "Prénom", "Nom", "Sexe"];
        if self.with_average_column {
            header.push("Moy");
        }
        header.extend(["Rang", "Retard", "Absence"]);
        for (col, label) in header.iter().enumerate() {
            summary
                .write_string(11, col as u16, *label)
                .expect("summary header written");
        }
        for (index, row) in self.students.iter().enumerate() {
            let r = 12 + index as u32;
            write_text(summary, r, 0, row.id);
            write_text(summary, r, 1, row.first_name);
            write_text(summary, r, 2, row.last_name);
            write_text(summary, r, 3, row.sex);
            let mut col = 4;
            if self.with_average_column {
                write_value(summary, r, col, row.average);
                col += 1;
            }
            summary.write_number(r, col, row.rank).expect("rank written");
            summary.write_number(r, col + 1, 0.0).expect("lateness written");
            summary.write_number(r, col + 2, 2.0).expect("absence written");
        }

        let detail = workbook.add_worksheet();
        detail.set_name("Données détaillées").expect("detail sheet named");
        detail
            .write_string(0, 0, "Données détaillées du semestre")
            .expect("title written");
        for (col, label) in ["IEN", "Prénom", "Nom"].iter().enumerate() {
            detail.write_string(8, col as u16, *label).expect("identity header written");
        }
        for (index, discipline) in self.disciplines.iter().enumerate() {
            let first = 3 + 4 * index as u16;
            detail.write_string(8, first, *discipline).expect("discipline written");
            for (offset, metric) in ["Moy DD", "Comp D", "Moy D", "Rang D"].iter().enumerate() {
                detail
                    .write_string(9, first + offset as u16, *metric)
                    .expect("metric written");
            }
        }
        for (index, row) in self.students.iter().enumerate() {
            let r = 10 + index as u32;
            write_text(detail, r, 0, row.id);
            write_text(detail, r, 1, row.first_name);
            write_text(detail, r, 2, row.last_name);
            for (d, grade) in row.grades.iter().enumerate() {
                let first = 3 + 4 * d as u16;
                if let Value::Num(final_average) = grade {
                    detail
                        .write_number(r, first, final_average - 1.0)
                        .expect("continuous average written");
                    detail
                        .write_number(r, first + 1, final_average + 1.0)
                        .expect("exam written");
                }
                write_value(detail, r, first + 2, *grade);
                detail
                    .write_number(r, first + 3, (index + 1) as f64)
                    .expect("rank written");
            }
        }

        workbook.save(path).expect("grading workbook saved");
        path.to_path_buf()
    }
}

/// Empty strings leave the cell blank, as the platform does.
fn write_text(sheet: &mut rust_xlsxwriter::Worksheet, row: u32, col: u16, text: &str) {
    if !text.is_empty() {
        sheet.write_string(row, col, text).expect("text written");
    }
}

fn write_value(sheet: &mut rust_xlsxwriter::Worksheet, row: u32, col: u16, value: Value) {
    match value {
        Value::Num(number) => {
            sheet.write_number(row, col, number).expect("number written");
        }
        Value::Text(text) => {
            sheet.write_string(row, col, text).expect("text written");
        }
        Value::Blank => {}
    }
}

pub fn settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default().with_data_dir(dir.path().join("data"));
    settings.default_levels = vec!["6th".to_string(), "5th".to_string()];
    settings
}

pub fn workspace(dir: &TempDir) -> Workspace {
    Workspace::open(settings(dir)).expect("workspace opened")
}

pub fn scope(class: &str, term: Term) -> Scope {
    Scope::new("6th", class, term)
}

pub fn count(workspace: &Workspace, sql: &str) -> i64 {
    let conn = workspace.store().open().expect("store opened");
    conn.query_row(sql, [], |row| row.get(0)).expect("count query")
}
