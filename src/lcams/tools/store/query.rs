//! Read-only projections of the relational store, used by reporting
//! consumers and by ledger reconciliation.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{Connection, params};

use crate::lcams::tools::error::Result;
use crate::lcams::tools::model::{Cell, Scope, Student, Table, TermAverageRecord, TermGradeRecord};
use crate::lcams::tools::normalize::fields;

/// Term averages of every student attached to the scope's class, by rank.
pub fn class_term_averages(
    conn: &Connection,
    scope: &Scope,
    school_year: &str,
) -> Result<Vec<TermAverageRecord>> {
    let sql = format!(
        "SELECT s.id, s.first_name, s.last_name, s.sex, s.birth_date, s.birth_place, s.class_id, s.school_year,
                a.average, a.rank, a.lateness, a.absence, a.discipline_council, a.remarks, a.observation, a.school_year
         FROM {averages} a
         JOIN students s ON s.id = a.student_id
         JOIN classes c ON s.class_id = c.id
         JOIN levels l ON c.level_id = l.id
         WHERE l.label = ? AND c.label = ? AND a.school_year = ?
         ORDER BY a.rank, s.id",
        averages = scope.term.averages_table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params![scope.level, scope.class, school_year], |row| {
            Ok(TermAverageRecord {
                student: Student {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    sex: row.get(3)?,
                    birth_date: row.get(4)?,
                    birth_place: row.get(5)?,
                    class_id: row.get(6)?,
                    school_year: row.get(7)?,
                },
                average: row.get(8)?,
                rank: row.get(9)?,
                lateness: row.get(10)?,
                absence: row.get(11)?,
                discipline_council: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
                remarks: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
                observation: row.get::<_, Option<String>>(14)?.unwrap_or_default(),
                school_year: row.get(15)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

/// Discipline results of every student attached to the scope's class.
pub fn class_term_grades(
    conn: &Connection,
    scope: &Scope,
    school_year: &str,
) -> Result<Vec<TermGradeRecord>> {
    let sql = format!(
        "SELECT g.student_id, d.label, g.continuous_average, g.exam, g.final_average, g.rank, g.school_year
         FROM {grades} g
         JOIN disciplines d ON d.id = g.discipline_id
         JOIN students s ON s.id = g.student_id
         JOIN classes c ON s.class_id = c.id
         JOIN levels l ON c.level_id = l.id
         WHERE l.label = ? AND c.label = ? AND g.school_year = ?
         ORDER BY g.student_id, d.id",
        grades = scope.term.grades_table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params![scope.level, scope.class, school_year], |row| {
            Ok(TermGradeRecord {
                student_id: row.get(0)?,
                discipline: row.get(1)?,
                continuous_average: row.get(2)?,
                exam: row.get(3)?,
                final_average: row.get(4)?,
                rank: row.get(5)?,
                school_year: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

/// Student ids holding a term average in the scope.
pub fn scope_student_ids(
    conn: &Connection,
    scope: &Scope,
    school_year: &str,
) -> Result<BTreeSet<String>> {
    Ok(class_term_averages(conn, scope, school_year)?
        .into_iter()
        .map(|record| record.student.id)
        .collect())
}

/// Rebuilds the ledger summary frame from term averages.
pub fn averages_frame(records: &[TermAverageRecord]) -> Table {
    let mut table = Table::new(
        [
            fields::STUDENT_ID,
            fields::FIRST_NAME,
            fields::LAST_NAME,
            fields::SEX,
            fields::BIRTH_DATE,
            fields::BIRTH_PLACE,
            fields::LATENESS,
            fields::ABSENCE,
            fields::DISCIPLINE_COUNCIL,
            fields::AVERAGE,
            fields::RANK,
            fields::REMARKS,
            fields::COUNCIL_OBSERVATION,
        ]
        .into_iter()
        .map(str::to_string)
        .collect(),
    );
    for record in records {
        let student = &record.student;
        table.push_row(vec![
            Cell::text(student.id.clone()),
            Cell::text(student.first_name.clone()),
            Cell::text(student.last_name.clone()),
            Cell::from(student.sex.clone()),
            Cell::from(student.birth_date.clone()),
            Cell::from(student.birth_place.clone()),
            Cell::from(record.lateness),
            Cell::from(record.absence),
            Cell::text(record.discipline_council.clone()),
            Cell::from(record.average),
            Cell::from(record.rank),
            Cell::text(record.remarks.clone()),
            Cell::text(record.observation.clone()),
        ]);
    }
    table
}

/// Rebuilds the ledger detail frame: identity columns, then one final-average
/// column per discipline in order of first appearance.
pub fn grades_frame(averages: &[TermAverageRecord], grades: &[TermGradeRecord]) -> Table {
    let mut disciplines: Vec<String> = Vec::new();
    let mut by_student: BTreeMap<&str, BTreeMap<&str, Option<f64>>> = BTreeMap::new();
    for grade in grades {
        if !disciplines.contains(&grade.discipline) {
            disciplines.push(grade.discipline.clone());
        }
        by_student
            .entry(grade.student_id.as_str())
            .or_default()
            .insert(grade.discipline.as_str(), grade.final_average);
    }

    let mut columns: Vec<String> = fields::PIVOT_IDENTITY.iter().map(|f| f.to_string()).collect();
    columns.extend(disciplines.iter().cloned());
    let mut table = Table::new(columns);

    for record in averages {
        let student = &record.student;
        let results = by_student.get(student.id.as_str());
        let mut row = vec![
            Cell::text(student.id.clone()),
            Cell::text(student.first_name.clone()),
            Cell::text(student.last_name.clone()),
            Cell::from(student.sex.clone()),
        ];
        row.extend(disciplines.iter().map(|discipline| {
            results
                .and_then(|by_discipline| by_discipline.get(discipline.as_str()).copied())
                .map(Cell::from)
                .unwrap_or_default()
        }));
        table.push_row(row);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn average(id: &str) -> TermAverageRecord {
        TermAverageRecord {
            student: Student {
                id: id.to_string(),
                first_name: "Awa".into(),
                last_name: "Diop".into(),
                sex: None,
                birth_date: None,
                birth_place: None,
                class_id: Some(1),
                school_year: Some("2023-2024".into()),
            },
            average: 12.0,
            rank: 1,
            lateness: 0,
            absence: 0,
            discipline_council: String::new(),
            remarks: String::new(),
            observation: String::new(),
            school_year: "2023-2024".into(),
        }
    }

    fn grade(id: &str, discipline: &str, value: f64) -> TermGradeRecord {
        TermGradeRecord {
            student_id: id.to_string(),
            discipline: discipline.to_string(),
            continuous_average: None,
            exam: None,
            final_average: Some(value),
            rank: None,
            school_year: "2023-2024".into(),
        }
    }

    #[test]
    fn grades_are_pivoted_one_column_per_discipline() {
        let averages = [average("S1"), average("S2")];
        let grades = [grade("S1", "Math", 16.0), grade("S1", "French", 11.0), grade("S2", "Math", 7.0)];

        let frame = grades_frame(&averages, &grades);

        assert_eq!(
            frame.columns,
            ["student_id", "first_name", "last_name", "sex", "Math", "French"]
        );
        assert_eq!(frame.rows[1][4], Cell::Number(7.0));
        assert_eq!(frame.rows[1][5], Cell::Empty);
    }
}
