//! Runtime settings: where the store and the ledger live, and the seed data
//! used the first time the store is initialised.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::lcams::tools::error::{Result, ToolError};

pub const DATA_DIR_ENV: &str = "LCAMS_DATA_DIR";
pub const SCHOOL_YEAR_ENV: &str = "LCAMS_SCHOOL_YEAR";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub database_file: String,
    pub ledger_file: String,
    pub default_levels: Vec<String>,
    pub default_school_year: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database_file: "lcams.db".to_string(),
            ledger_file: "fichier_central.xlsx".to_string(),
            default_levels: ["6ème", "5ème", "4ème", "3ème", "Seconde", "Première", "Terminale"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            default_school_year: "2023-2024".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, overlaid with the optional JSON file, then the environment.
    pub fn load(config: Option<&Path>) -> Result<Self> {
        let settings = match config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(settings.with_env_overrides(|key| env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&raw)
            .map_err(|err| ToolError::Config(format!("{}: {err}", path.display())))?;
        settings.validate()?;
        debug!(config = %path.display(), "settings file loaded");
        Ok(settings)
    }

    /// Applies `LCAMS_DATA_DIR` and `LCAMS_SCHOOL_YEAR` through `lookup`, so
    /// tests can inject values without touching the process environment.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir.trim());
        }
        if let Some(year) = lookup(SCHOOL_YEAR_ENV).filter(|v| !v.trim().is_empty()) {
            self.default_school_year = year.trim().to_string();
        }
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.database_file.trim().is_empty() {
            return Err(ToolError::Config("database_file must not be empty".into()));
        }
        if self.ledger_file.trim().is_empty() {
            return Err(ToolError::Config("ledger_file must not be empty".into()));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_file)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}
