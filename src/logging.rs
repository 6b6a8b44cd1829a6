//! Structured logging setup
//!
//! Logs go to stderr; stdout carries the console summary of a run.

use crate::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing_subscriber::{
    filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Logging configuration for the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of the compact human format
    pub json_format: bool,
    /// Per-target level overrides, e.g. `reqwest = "warn"`
    pub targets: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
            targets: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Same configuration with the level raised to `debug`
    pub fn verbose(mut self) -> Self {
        self.level = "debug".to_string();
        self
    }

    /// Filter built from `RUST_LOG` when set, else from this configuration
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.level).map_err(|e| {
                ReportError::Configuration(format!("invalid log level '{}': {}", self.level, e))
            })?,
        };

        for (target, level) in &self.targets {
            let directive = format!("{}={}", target, level);
            filter = filter.add_directive(directive.parse::<Directive>().map_err(|e| {
                ReportError::Configuration(format!("invalid log directive '{}': {}", directive, e))
            })?);
        }

        Ok(filter)
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let registry = Registry::default().with(config.env_filter()?);

    let installed = if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    installed.map_err(|e| ReportError::Configuration(format!("cannot install logger: {}", e)))?;
    tracing::debug!(level = %config.level, json = config.json_format, "logging initialized");
    Ok(())
}
