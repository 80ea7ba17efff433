//! The normalized relational store.
//!
//! Every operation opens its own connection through [`Store::open`], does
//! its work inside one transaction and drops the connection; nothing holds a
//! connection across operations.

pub mod admin;
pub mod backup;
pub mod delete;
pub mod loader;
pub mod query;
mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::lcams::tools::error::Result;

pub use schema::FINAL_DECISIONS_TABLE;

#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a fresh connection with foreign keys enforced.
    pub fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(conn)
    }

    /// Creates missing tables, then seeds `levels` and an active school year
    /// when the corresponding tables are still empty. Safe to call on every
    /// start.
    #[instrument(level = "info", skip_all, fields(db = %self.path.display()))]
    pub fn init(&self, levels: &[String], school_year: &str) -> Result<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        schema::create_tables(&tx)?;

        let level_count: i64 = tx.query_row("SELECT COUNT(*) FROM levels", [], |r| r.get(0))?;
        if level_count == 0 {
            for label in levels {
                tx.execute("INSERT INTO levels(label, active) VALUES(?, 1)", [label])?;
            }
            info!(levels = levels.len(), "seeded default levels");
        }

        let year_count: i64 =
            tx.query_row("SELECT COUNT(*) FROM school_years", [], |r| r.get(0))?;
        if year_count == 0 {
            tx.execute(
                "INSERT INTO school_years(label, state) VALUES(?, 'active')",
                [school_year],
            )?;
            info!(school_year, "seeded active school year");
        }

        tx.commit()?;
        Ok(())
    }
}
