//! Relational half of the cascading deletions. Each scope is deleted through
//! the next smaller one: level → class → student.

use rusqlite::Transaction;
use tracing::debug;

use crate::lcams::tools::error::Result;
use crate::lcams::tools::model::Term;
use crate::lcams::tools::store::FINAL_DECISIONS_TABLE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionCounts {
    pub students: usize,
    pub classes: usize,
    pub levels: usize,
    /// Term averages, term grades and final decisions removed.
    pub facts: usize,
}

impl std::ops::AddAssign for DeletionCounts {
    fn add_assign(&mut self, other: Self) {
        self.students += other.students;
        self.classes += other.classes;
        self.levels += other.levels;
        self.facts += other.facts;
    }
}

/// Deletes a student and every fact row referencing it, for both terms.
pub fn delete_student(tx: &Transaction<'_>, student_id: &str) -> Result<DeletionCounts> {
    let mut counts = DeletionCounts::default();
    for term in Term::ALL {
        for table in [term.averages_table(), term.grades_table()] {
            counts.facts += tx.execute(
                &format!("DELETE FROM {table} WHERE student_id = ?"),
                [student_id],
            )?;
        }
    }
    counts.facts += tx.execute(
        &format!("DELETE FROM {FINAL_DECISIONS_TABLE} WHERE student_id = ?"),
        [student_id],
    )?;
    counts.students += tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    debug!(student_id, facts = counts.facts, "student deleted");
    Ok(counts)
}

/// Deletes every student of the class, then the class itself.
pub fn delete_class(tx: &Transaction<'_>, level: &str, class: &str) -> Result<DeletionCounts> {
    let mut counts = DeletionCounts::default();
    let class_ids: Vec<i64> = {
        let mut stmt = tx.prepare(
            "SELECT c.id FROM classes c
             JOIN levels l ON c.level_id = l.id
             WHERE l.label = ? AND c.label = ?",
        )?;
        let ids = stmt
            .query_map([level, class], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids
    };

    for class_id in class_ids {
        let student_ids: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM students WHERE class_id = ?")?;
            let ids = stmt
                .query_map([class_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        for student_id in &student_ids {
            counts += delete_student(tx, student_id)?;
        }
        counts.classes += tx.execute("DELETE FROM classes WHERE id = ?", [class_id])?;
    }
    debug!(level, class, students = counts.students, "class deleted");
    Ok(counts)
}

/// Deletes every class of the level, then the level itself.
pub fn delete_level(tx: &Transaction<'_>, level: &str) -> Result<DeletionCounts> {
    let mut counts = DeletionCounts::default();
    let classes: Vec<String> = {
        let mut stmt = tx.prepare(
            "SELECT c.label FROM classes c
             JOIN levels l ON c.level_id = l.id
             WHERE l.label = ?",
        )?;
        let labels = stmt
            .query_map([level], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        labels
    };
    for class in &classes {
        counts += delete_class(tx, level, class)?;
    }
    counts.levels += tx.execute("DELETE FROM levels WHERE label = ?", [level])?;
    debug!(level, classes = counts.classes, "level deleted");
    Ok(counts)
}

/// Removes every term fact of `term` recorded under `school_year`.
pub fn purge_term(tx: &Transaction<'_>, term: Term, school_year: &str) -> Result<usize> {
    let mut removed = 0;
    for table in [term.grades_table(), term.averages_table()] {
        removed += tx.execute(
            &format!("DELETE FROM {table} WHERE school_year = ?"),
            [school_year],
        )?;
    }
    Ok(removed)
}
