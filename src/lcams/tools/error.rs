use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the failures that abort an import, a deletion, or an
/// administrative command. Row-level data-quality problems are logged, not
/// raised, and therefore have no variant here.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Errors bubbled up from the relational store.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Raised when an external grading workbook cannot be flattened.
    #[error("failed to load the Excel workbook: {0}")]
    Parse(String),

    /// Raised when mandatory columns are absent from a sheet.
    #[error("sheet '{sheet}' is missing required columns: {}", columns.join(", "))]
    MissingColumns { sheet: String, columns: Vec<String> },

    /// Raised when a class cannot be anchored because its level is unknown.
    #[error("level '{0}' not found in the database")]
    UnknownLevel(String),

    /// Raised when a school year identifier does not exist.
    #[error("school year {0} not found in the database")]
    UnknownSchoolYear(i64),

    /// Raised when a term other than 1 or 2 is requested.
    #[error("invalid term '{0}', expected 1 or 2")]
    InvalidTerm(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when a destructive command is run without its confirmation word.
    #[error("{command} not confirmed: pass --confirm {expected}")]
    NotConfirmed {
        command: &'static str,
        expected: &'static str,
    },

    /// Raised when the settings file or environment overrides are invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
