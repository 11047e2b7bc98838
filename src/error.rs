use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Error type covering the failure cases that abort a compilation run.
///
/// Per-file and per-row problems are deliberately not represented here: they
/// are recoverable, become [`RejectionEntry`](crate::model::RejectionEntry)
/// values, and never stop the run.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Wrapper for IO failures such as reading source files or writing the
    /// compiled workbook.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when the JSON configuration file cannot be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Raised when a configuration value fails validation before any file is
    /// processed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the configured sheet name pattern is not a valid regex.
    #[error("invalid sheet name pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Raised when the user provides an input directory that does not exist.
    #[error("input directory not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// File-level parse failure. Recoverable at the run level: the file is
/// recorded as rejected and the run continues with the next file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The file identifier does not carry a supported workbook extension.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The bytes could not be opened as a workbook archive.
    #[error("unreadable workbook: {0}")]
    Unreadable(String),

    /// No sheet contained a recognisable header row within the scan window.
    #[error("no header row found within the first {window} rows")]
    NoHeaderFound { window: usize },
}
