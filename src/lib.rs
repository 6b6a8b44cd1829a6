//! m365-license-report - normalizes Microsoft 365 user license exports and
//! builds utilization reports
//!
//! The pipeline reads a raw per-user export, sorts and relabels it, combines
//! it with seat statistics from a configurable data source, and renders a
//! self-contained HTML report next to the cleaned and statistics CSVs.

pub mod cli;
pub mod config;
pub mod errors;
pub mod format;
pub mod html;
pub mod logging;
pub mod normalizer;
pub mod notify;
pub mod orchestrator;
pub mod output;
pub mod statistics;
pub mod types;

// Re-export commonly used types
pub use errors::{ReportError, Result, TemplateError};
pub use types::{EfficiencyLevel, LicenseStatistics, PlanStatistics, TierPolicy, UserLicenseRecord};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        errors::{ReportError, Result},
        types::{LicenseStatistics, UserLicenseRecord},
    };
}
