use rusqlite::Connection;

use crate::lcams::tools::error::Result;
use crate::lcams::tools::model::Term;

pub const FINAL_DECISIONS_TABLE: &str = "final_decisions";

pub(super) fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS configuration(
            id INTEGER PRIMARY KEY CHECK (id = 1),
            name TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            academy_inspection TEXT NOT NULL DEFAULT '',
            education_inspection TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    // The single-active-year rule is enforced by admin::activate_school_year.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_years(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'inactive',
            start_date TEXT,
            end_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS levels(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL UNIQUE,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            level_id INTEGER NOT NULL,
            label TEXT NOT NULL,
            headcount INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1,
            UNIQUE(level_id, label),
            FOREIGN KEY(level_id) REFERENCES levels(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_level ON classes(level_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            sex TEXT,
            birth_date TEXT,
            birth_place TEXT,
            class_id INTEGER,
            school_year TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS disciplines(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL UNIQUE,
            coefficient REAL NOT NULL DEFAULT 1,
            category TEXT NOT NULL DEFAULT 'main',
            parent_id INTEGER,
            FOREIGN KEY(parent_id) REFERENCES disciplines(id)
        )",
        [],
    )?;

    for term in Term::ALL {
        create_term_tables(conn, term)?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS final_decisions(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id TEXT NOT NULL,
            decision TEXT,
            annual_average REAL,
            annual_rank INTEGER,
            school_year TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    Ok(())
}

fn create_term_tables(conn: &Connection, term: Term) -> Result<()> {
    let grades = term.grades_table();
    let averages = term.averages_table();

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {grades}(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id TEXT NOT NULL,
                discipline_id INTEGER NOT NULL,
                continuous_average REAL,
                exam REAL,
                final_average REAL,
                rank INTEGER,
                school_year TEXT NOT NULL,
                UNIQUE(student_id, discipline_id, school_year),
                FOREIGN KEY(student_id) REFERENCES students(id),
                FOREIGN KEY(discipline_id) REFERENCES disciplines(id)
            )"
        ),
        [],
    )?;
    conn.execute(
        &format!("CREATE INDEX IF NOT EXISTS idx_{grades}_student ON {grades}(student_id)"),
        [],
    )?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {averages}(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id TEXT NOT NULL,
                average REAL NOT NULL DEFAULT 0,
                rank INTEGER NOT NULL DEFAULT 0,
                lateness INTEGER NOT NULL DEFAULT 0,
                absence INTEGER NOT NULL DEFAULT 0,
                discipline_council TEXT,
                remarks TEXT,
                observation TEXT,
                school_year TEXT NOT NULL,
                UNIQUE(student_id, school_year),
                FOREIGN KEY(student_id) REFERENCES students(id)
            )"
        ),
        [],
    )?;
    Ok(())
}
