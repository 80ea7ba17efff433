//! File-level copies of the relational store: timestamped backups, restore
//! and full reset. Restore and reset first copy the current database aside,
//! so both can be undone by restoring that copy.
//!
//! No connection may be open on the database while these run; the store
//! opens one connection per operation, so callers only need to avoid holding
//! one across the call.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, instrument, warn};

use crate::lcams::tools::error::{Result, ToolError};

pub const BACKUP_PREFIX: &str = "lcams_backup_";
pub const PRE_RESTORE_PREFIX: &str = "lcams_pre_restore_";
pub const PRE_RESET_PREFIX: &str = "lcams_pre_reset_";
const EXTENSION: &str = "db";

/// Copies `database` to `<backups_dir>/lcams_backup_<YYYYmmdd_HHMMSS>.db`.
#[instrument(level = "info", skip_all, fields(db = %database.display()))]
pub fn backup(database: &Path, backups_dir: &Path) -> Result<PathBuf> {
    copy_aside(database, backups_dir, BACKUP_PREFIX)
}

/// Regular backups in `backups_dir`, newest first. Safety copies taken by
/// restore and reset are not listed.
pub fn list_backups(backups_dir: &Path) -> Result<Vec<PathBuf>> {
    if !backups_dir.exists() {
        return Ok(Vec::new());
    }
    let mut backups = Vec::new();
    for entry in fs::read_dir(backups_dir)? {
        let path = entry?.path();
        let is_backup = path.file_name().and_then(|name| name.to_str()).is_some_and(|name| {
            name.starts_with(BACKUP_PREFIX) && name.ends_with(&format!(".{EXTENSION}"))
        });
        if is_backup && path.is_file() {
            backups.push(path);
        }
    }
    // Timestamps sort lexically.
    backups.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(backups)
}

/// Replaces `database` with `source`, after copying the current database to a
/// `lcams_pre_restore_*` file. Returns that safety copy, if a database existed.
#[instrument(level = "info", skip_all, fields(db = %database.display(), source = %source.display()))]
pub fn restore(database: &Path, backups_dir: &Path, source: &Path) -> Result<Option<PathBuf>> {
    if !source.is_file() {
        return Err(ToolError::MissingInput(source.to_path_buf()));
    }
    let safety = if database.exists() {
        Some(copy_aside(database, backups_dir, PRE_RESTORE_PREFIX)?)
    } else {
        None
    };
    if let Some(parent) = database.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, database)?;
    info!("database restored");
    Ok(safety)
}

/// Deletes `database` after copying it to a `lcams_pre_reset_*` file. The
/// next [`super::Store::init`] recreates and reseeds an empty store.
#[instrument(level = "info", skip_all, fields(db = %database.display()))]
pub fn reset(database: &Path, backups_dir: &Path) -> Result<Option<PathBuf>> {
    if !database.exists() {
        warn!("no database to reset");
        return Ok(None);
    }
    let safety = copy_aside(database, backups_dir, PRE_RESET_PREFIX)?;
    fs::remove_file(database)?;
    info!(safety = %safety.display(), "database removed");
    Ok(Some(safety))
}

fn copy_aside(database: &Path, backups_dir: &Path, prefix: &str) -> Result<PathBuf> {
    if !database.is_file() {
        return Err(ToolError::MissingInput(database.to_path_buf()));
    }
    fs::create_dir_all(backups_dir)?;
    let target = unique_target(backups_dir, prefix, &Local::now().format("%Y%m%d_%H%M%S").to_string());
    fs::copy(database, &target)?;
    info!(target = %target.display(), "database copied");
    Ok(target)
}

/// Two copies taken within the same second get `_1`, `_2`, ... suffixes.
fn unique_target(dir: &Path, prefix: &str, stamp: &str) -> PathBuf {
    let mut target = dir.join(format!("{prefix}{stamp}.{EXTENSION}"));
    let mut suffix = 1;
    while target.exists() {
        target = dir.join(format!("{prefix}{stamp}_{suffix}.{EXTENSION}"));
        suffix += 1;
    }
    target
}
