//! Master data and lifecycle operations: school years, levels, classes,
//! disciplines and the establishment profile.

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{info, instrument};

use crate::lcams::tools::error::{Result, ToolError};
use crate::lcams::tools::model::{
    Class, Discipline, Establishment, Level, SchoolYear, UNKNOWN_SCHOOL_YEAR, YearState,
};

fn school_year_from_row(row: &Row<'_>) -> rusqlite::Result<SchoolYear> {
    let state: String = row.get(2)?;
    Ok(SchoolYear {
        id: row.get(0)?,
        label: row.get(1)?,
        state: if state == YearState::Active.as_str() {
            YearState::Active
        } else {
            YearState::Inactive
        },
        start_date: row.get(3)?,
        end_date: row.get(4)?,
    })
}

pub fn active_school_year(conn: &Connection) -> Result<Option<SchoolYear>> {
    Ok(conn
        .query_row(
            "SELECT id, label, state, start_date, end_date
             FROM school_years WHERE state = 'active'
             ORDER BY id LIMIT 1",
            [],
            school_year_from_row,
        )
        .optional()?)
}

/// Label of the active school year, or [`UNKNOWN_SCHOOL_YEAR`] when none is.
pub fn active_school_year_label(conn: &Connection) -> Result<String> {
    Ok(active_school_year(conn)?
        .map(|year| year.label)
        .unwrap_or_else(|| UNKNOWN_SCHOOL_YEAR.to_string()))
}

pub fn list_school_years(conn: &Connection) -> Result<Vec<SchoolYear>> {
    let mut stmt = conn.prepare(
        "SELECT id, label, state, start_date, end_date FROM school_years ORDER BY id DESC",
    )?;
    let years = stmt
        .query_map([], school_year_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(years)
}

/// Registers a new, inactive school year and returns its id.
pub fn add_school_year(
    conn: &Connection,
    label: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO school_years(label, state, start_date, end_date) VALUES(?, 'inactive', ?, ?)",
        params![label.trim(), start_date, end_date],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Makes `id` the only active school year. Deactivation of the others and
/// activation happen in one transaction.
#[instrument(level = "info", skip(conn))]
pub fn activate_school_year(conn: &mut Connection, id: i64) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE school_years SET state = 'inactive' WHERE id != ?",
        [id],
    )?;
    let updated = tx.execute("UPDATE school_years SET state = 'active' WHERE id = ?", [id])?;
    if updated == 0 {
        return Err(ToolError::UnknownSchoolYear(id));
    }
    tx.commit()?;
    info!("school year activated");
    Ok(())
}

pub fn list_levels(conn: &Connection) -> Result<Vec<Level>> {
    let mut stmt = conn.prepare("SELECT id, label, active FROM levels ORDER BY id")?;
    let levels = stmt
        .query_map([], |row| {
            Ok(Level {
                id: row.get(0)?,
                label: row.get(1)?,
                active: row.get::<_, i64>(2)? != 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(levels)
}

pub fn find_level_id(conn: &Connection, label: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row("SELECT id FROM levels WHERE label = ?", [label], |r| r.get(0))
        .optional()?)
}

pub fn add_level(conn: &Connection, label: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO levels(label, active) VALUES(?, 1)",
        [label.trim()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_level_active(conn: &Connection, label: &str, active: bool) -> Result<()> {
    let updated = conn.execute(
        "UPDATE levels SET active = ? WHERE label = ?",
        params![active as i64, label],
    )?;
    if updated == 0 {
        return Err(ToolError::UnknownLevel(label.to_string()));
    }
    Ok(())
}

pub fn find_class_id(conn: &Connection, level: &str, class: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT c.id FROM classes c
             JOIN levels l ON c.level_id = l.id
             WHERE l.label = ? AND c.label = ?",
            [level, class],
            |r| r.get(0),
        )
        .optional()?)
}

/// Creates a class under `level`. An unknown level is an error: a class
/// cannot exist without its anchor.
pub fn add_class(conn: &Connection, level: &str, label: &str, headcount: i64) -> Result<i64> {
    let level_id =
        find_level_id(conn, level)?.ok_or_else(|| ToolError::UnknownLevel(level.to_string()))?;
    conn.execute(
        "INSERT INTO classes(level_id, label, headcount, active) VALUES(?, ?, ?, 1)",
        params![level_id, label.trim(), headcount],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Returns the class id for (level, class), creating the class on demand.
pub fn resolve_or_create_class(
    conn: &Connection,
    level: &str,
    class: &str,
    headcount: i64,
) -> Result<i64> {
    match find_class_id(conn, level, class)? {
        Some(id) => Ok(id),
        None => {
            let id = add_class(conn, level, class, headcount)?;
            info!(level, class, headcount, "class created on demand");
            Ok(id)
        }
    }
}

pub fn list_classes(conn: &Connection, level: &str) -> Result<Vec<Class>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.level_id, c.label, c.headcount, c.active
         FROM classes c
         JOIN levels l ON c.level_id = l.id
         WHERE l.label = ?
         ORDER BY c.label",
    )?;
    let classes = stmt
        .query_map([level], |row| {
            Ok(Class {
                id: row.get(0)?,
                level_id: row.get(1)?,
                label: row.get(2)?,
                headcount: row.get(3)?,
                active: row.get::<_, i64>(4)? != 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(classes)
}

/// Returns the discipline id for `label`, creating it with default
/// coefficient and category when unknown. Labels are compared exactly.
pub fn resolve_or_create_discipline(conn: &Connection, label: &str) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM disciplines WHERE label = ?", [label], |r| {
            r.get(0)
        })
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute("INSERT INTO disciplines(label) VALUES(?)", [label])?;
    Ok(conn.last_insert_rowid())
}

pub fn list_disciplines(conn: &Connection) -> Result<Vec<Discipline>> {
    let mut stmt = conn.prepare(
        "SELECT id, label, coefficient, category, parent_id FROM disciplines ORDER BY label",
    )?;
    let disciplines = stmt
        .query_map([], |row| {
            Ok(Discipline {
                id: row.get(0)?,
                label: row.get(1)?,
                coefficient: row.get(2)?,
                category: row.get(3)?,
                parent_id: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(disciplines)
}

/// Updates the editable attributes of a discipline, including its optional
/// parent group.
pub fn update_discipline(
    conn: &Connection,
    id: i64,
    coefficient: f64,
    category: &str,
    parent_id: Option<i64>,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE disciplines SET coefficient = ?, category = ?, parent_id = ? WHERE id = ?",
        params![coefficient, category, parent_id, id],
    )?;
    Ok(updated > 0)
}

pub fn establishment(conn: &Connection) -> Result<Establishment> {
    Ok(conn
        .query_row(
            "SELECT name, address, phone, academy_inspection, education_inspection
             FROM configuration WHERE id = 1",
            [],
            |row| {
                Ok(Establishment {
                    name: row.get(0)?,
                    address: row.get(1)?,
                    phone: row.get(2)?,
                    academy_inspection: row.get(3)?,
                    education_inspection: row.get(4)?,
                })
            },
        )
        .optional()?
        .unwrap_or_default())
}

pub fn save_establishment(conn: &Connection, profile: &Establishment) -> Result<()> {
    conn.execute(
        "INSERT INTO configuration(id, name, address, phone, academy_inspection, education_inspection)
         VALUES(1, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           address = excluded.address,
           phone = excluded.phone,
           academy_inspection = excluded.academy_inspection,
           education_inspection = excluded.education_inspection",
        params![
            profile.name,
            profile.address,
            profile.phone,
            profile.academy_inspection,
            profile.education_inspection
        ],
    )?;
    Ok(())
}
