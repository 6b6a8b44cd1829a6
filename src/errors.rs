//! Error types and handling for the license report tool

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main result type for the report pipeline
pub type Result<T> = std::result::Result<T, ReportError>;

/// Error hierarchy for every failure mode of a report run
#[derive(Error, Debug)]
pub enum ReportError {
    /// I/O related errors without a known path
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader/writer errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File processing errors with the offending path attached
    #[error("File processing error: {file_path} - {cause}")]
    FileProcessing { file_path: PathBuf, cause: String },

    /// A field of an input row could not be parsed
    #[error("Parse error: row {row}, column {field}: {message} (value: {value:?})")]
    Parse {
        row: usize,
        field: String,
        value: String,
        message: String,
    },

    /// Template anchor errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Validation errors on computed or loaded data
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// CLI argument errors
    #[error("CLI argument error: {0}")]
    CliArgument(String),

    /// Notification channel errors (never fatal for the caller)
    #[error("Notification error: {channel} - {message}")]
    Notification { channel: String, message: String },
}

/// Region-replacement failures. All of them abort the render.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Anchor element does not occur in the document
    #[error("anchor for region '{region}' not found (expected {anchor})")]
    RegionNotFound { region: String, anchor: String },

    /// Anchor element occurs more than once
    #[error("anchor for region '{region}' is ambiguous: {count} matches of {anchor}")]
    AmbiguousRegion {
        region: String,
        anchor: String,
        count: usize,
    },

    /// Anchor start tag has no matching end tag
    #[error("region '{region}' has no matching closing tag for {anchor}")]
    UnbalancedRegion { region: String, anchor: String },

    /// Anchor cannot be expressed as a CSS selector
    #[error("region '{region}' has an invalid selector: {selector}")]
    InvalidSelector { region: String, selector: String },

    /// Raw tag scan and DOM parse disagree on the anchor count
    #[error("region '{region}': DOM reports {dom} element(s) but markup scan found {scanned}")]
    StructureMismatch {
        region: String,
        dom: usize,
        scanned: usize,
    },
}

impl From<toml::de::Error> for ReportError {
    fn from(err: toml::de::Error) -> Self {
        ReportError::Configuration(format!("invalid TOML: {}", err))
    }
}

impl From<toml::ser::Error> for ReportError {
    fn from(err: toml::ser::Error) -> Self {
        ReportError::Configuration(format!("cannot serialize configuration: {}", err))
    }
}

impl From<reqwest::Error> for ReportError {
    fn from(err: reqwest::Error) -> Self {
        ReportError::Notification {
            channel: "webhook".to_string(),
            message: err.to_string(),
        }
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add context with file path
    fn with_file_context(self, path: &Path) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<ReportError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| match e.into() {
            ReportError::Io(io_err) => ReportError::Configuration(format!("{}: {}", f(), io_err)),
            other => other,
        })
    }

    fn with_file_context(self, path: &Path) -> Result<T> {
        self.map_err(|e| match e.into() {
            ReportError::Io(io_err) => ReportError::FileProcessing {
                file_path: path.to_path_buf(),
                cause: io_err.to_string(),
            },
            ReportError::Csv(csv_err) => ReportError::FileProcessing {
                file_path: path.to_path_buf(),
                cause: csv_err.to_string(),
            },
            ReportError::Json(json_err) => ReportError::FileProcessing {
                file_path: path.to_path_buf(),
                cause: json_err.to_string(),
            },
            other => other,
        })
    }
}
