//! Configuration management for the license report tool

use crate::errors::ErrorContext;
use crate::logging::LoggingConfig;
use crate::output::{write_file, OutputConfig};
use crate::prelude::*;
use crate::types::{EfficiencyThresholds, TierPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Full configuration file layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub paths: PathsConfig,
    pub tiers: TierPolicy,
    pub data_source: DataSourceConfig,
    pub thresholds: EfficiencyThresholds,
    pub notification: NotificationConfig,
    pub logging: LoggingConfig,
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// External HTML template; the embedded skeleton is used when unset
    pub template: Option<PathBuf>,
    /// Directory receiving the timestamped artifacts
    pub output_dir: PathBuf,
    /// File name stem shared by the artifacts
    pub output_stem: String,
    /// Plans that always appear in the statistics, even with zero seats
    pub expected_plans: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            template: None,
            output_dir: PathBuf::from("reports"),
            output_stem: "license_report".to_string(),
            expected_plans: Vec::new(),
        }
    }
}

/// Where aggregate seat counts come from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSourceConfig {
    /// Built-in reference numbers
    #[default]
    Fixture,
    /// JSON export of a tenant's subscription counts
    Snapshot { path: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub email_outbox: Option<PathBuf>,
    pub email_to: Vec<String>,
    pub email_from: Option<String>,
}

impl ReportConfig {
    /// Reject settings that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        let thresholds = &self.thresholds;
        if !(0.0..=100.0).contains(&thresholds.fair) || !(0.0..=100.0).contains(&thresholds.good) {
            return Err(ReportError::Configuration(
                "efficiency thresholds must lie between 0 and 100".to_string(),
            ));
        }
        if thresholds.fair > thresholds.good {
            return Err(ReportError::Configuration(format!(
                "fair threshold {} is above good threshold {}",
                thresholds.fair, thresholds.good
            )));
        }

        let stem = self.paths.output_stem.trim();
        if stem.is_empty() || stem.contains(['/', '\\']) {
            return Err(ReportError::Configuration(format!(
                "invalid output stem '{}'",
                self.paths.output_stem
            )));
        }

        if self.tiers.primary_keyword.trim().is_empty() {
            return Err(ReportError::Configuration(
                "tiers.primary_keyword must not be empty".to_string(),
            ));
        }

        if let DataSourceConfig::Snapshot { path } = &self.data_source {
            if path.as_os_str().is_empty() {
                return Err(ReportError::Configuration(
                    "data_source.path must not be empty".to_string(),
                ));
            }
        }

        let notification = &self.notification;
        if notification.enabled {
            if let Some(url) = &notification.webhook_url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ReportError::Configuration(format!(
                        "webhook url must be http(s): {}",
                        url
                    )));
                }
            }
            if notification.email_outbox.is_some() && notification.email_to.is_empty() {
                return Err(ReportError::Configuration(
                    "notification.email_to is required when email_outbox is set".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Configuration file manager
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn default_config_path() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(".config").join("m365-report").join("config.toml"),
            None => PathBuf::from("m365-report.toml"),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration, falling back to defaults if the file doesn't exist
    pub fn load_config(&self) -> Result<ReportConfig> {
        if !self.config_path.exists() {
            return Ok(ReportConfig::default());
        }

        let content =
            std::fs::read_to_string(&self.config_path).with_file_context(&self.config_path)?;
        let config: ReportConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write `config` as TOML, creating the parent directory when missing
    pub fn save_config(&self, config: &ReportConfig) -> Result<()> {
        let content = toml::to_string_pretty(config)?;
        write_file(&self.config_path, content.as_bytes(), &OutputConfig::default())?;
        debug!(path = %self.config_path.display(), "configuration saved");
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
