//! License statistics aggregation and the data sources that feed it

use crate::config::DataSourceConfig;
use crate::errors::ErrorContext;
use crate::format::percentage;
use crate::prelude::*;
use crate::types::{EfficiencyLevel, EfficiencyThresholds, LicenseStatistics, PlanStatistics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Raw seat counts of one plan as delivered by a data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCounts {
    pub name: String,
    pub total: u32,
    pub assigned: u32,
}

impl PlanCounts {
    pub fn new(name: impl Into<String>, total: u32, assigned: u32) -> Self {
        Self {
            name: name.into(),
            total,
            assigned,
        }
    }
}

impl PlanStatistics {
    /// Derive available seats and utilization from raw counts
    pub fn from_counts(total: u32, assigned: u32) -> Result<Self> {
        if assigned > total {
            return Err(ReportError::Validation {
                field: "assigned".to_string(),
                message: format!("{} assigned seats exceed {} purchased", assigned, total),
            });
        }
        Ok(Self {
            total,
            assigned,
            available: total - assigned,
            utilization_rate: percentage(u64::from(assigned), u64::from(total)),
        })
    }
}

/// Computes per-plan and aggregate license statistics
#[derive(Debug, Clone, Default)]
pub struct StatisticsAggregator {
    expected_plans: Vec<String>,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans that must appear in every result; missing ones become all-zero rows
    pub fn with_expected_plans<I, S>(mut self, plans: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_plans = plans.into_iter().map(Into::into).collect();
        self
    }

    pub fn aggregate(&self, counts: &[PlanCounts]) -> Result<LicenseStatistics> {
        let mut plans = BTreeMap::new();

        for entry in counts {
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(ReportError::Validation {
                    field: "name".to_string(),
                    message: "plan name must not be empty".to_string(),
                });
            }
            let stats = PlanStatistics::from_counts(entry.total, entry.assigned).map_err(|e| {
                match e {
                    ReportError::Validation { field, message } => ReportError::Validation {
                        field: format!("{}.{}", name, field),
                        message,
                    },
                    other => other,
                }
            })?;
            if plans.insert(name.to_string(), stats).is_some() {
                return Err(ReportError::Validation {
                    field: name.to_string(),
                    message: "plan listed more than once in breakdown".to_string(),
                });
            }
        }

        for expected in &self.expected_plans {
            plans.entry(expected.clone()).or_default();
        }

        let statistics = LicenseStatistics::from_plans(plans);
        debug!(
            plans = statistics.plan_count(),
            purchased = statistics.total_purchased(),
            assigned = statistics.total_assigned(),
            "aggregated license statistics"
        );
        Ok(statistics)
    }
}

/// Overall utilization with its efficiency band
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UtilizationSummary {
    pub rate: f64,
    pub level: EfficiencyLevel,
}

pub fn overall_utilization(stats: &LicenseStatistics) -> f64 {
    percentage(stats.total_assigned(), stats.total_purchased())
}

pub fn summarize_utilization(
    stats: &LicenseStatistics,
    thresholds: &EfficiencyThresholds,
) -> UtilizationSummary {
    let rate = overall_utilization(stats);
    UtilizationSummary {
        rate,
        level: EfficiencyLevel::classify(rate, thresholds),
    }
}

/// Supplies license statistics for a report run
pub trait LicenseDataSource {
    /// Short name used in logs and console output
    fn name(&self) -> &str;

    fn fetch_license_statistics(&self) -> Result<LicenseStatistics>;
}

/// Fixed development payload
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    aggregator: StatisticsAggregator,
}

impl FixtureSource {
    pub fn new(aggregator: StatisticsAggregator) -> Self {
        Self { aggregator }
    }

    pub fn counts() -> Vec<PlanCounts> {
        vec![
            PlanCounts::new("Microsoft 365 E3", 200, 80),
            PlanCounts::new("Exchange Online Plan 2", 108, 45),
            PlanCounts::new("Microsoft 365 Business Basic", 200, 32),
        ]
    }
}

impl LicenseDataSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    fn fetch_license_statistics(&self) -> Result<LicenseStatistics> {
        self.aggregator.aggregate(&Self::counts())
    }
}

/// JSON export of the tenant's subscribed plans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseSnapshot {
    #[serde(default)]
    pub captured_at: Option<String>,
    pub plans: Vec<PlanCounts>,
}

/// Reads a snapshot previously exported from the live service
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
    aggregator: StatisticsAggregator,
}

impl SnapshotSource {
    pub fn new(path: impl AsRef<Path>, aggregator: StatisticsAggregator) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            aggregator,
        }
    }

    pub fn load_snapshot(&self) -> Result<LicenseSnapshot> {
        let content = std::fs::read_to_string(&self.path).with_file_context(&self.path)?;
        let snapshot: LicenseSnapshot = serde_json::from_str(content.trim_start_matches('\u{feff}'))
            .with_file_context(&self.path)?;
        Ok(snapshot)
    }
}

impl LicenseDataSource for SnapshotSource {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn fetch_license_statistics(&self) -> Result<LicenseStatistics> {
        let snapshot = self.load_snapshot()?;
        debug!(
            path = %self.path.display(),
            captured_at = snapshot.captured_at.as_deref().unwrap_or("unknown"),
            "loaded license snapshot"
        );
        self.aggregator.aggregate(&snapshot.plans)
    }
}

/// Pick the data source named by configuration
pub fn data_source_from_config(
    config: &DataSourceConfig,
    aggregator: StatisticsAggregator,
) -> Box<dyn LicenseDataSource> {
    match config {
        DataSourceConfig::Fixture => Box::new(FixtureSource::new(aggregator)),
        DataSourceConfig::Snapshot { path } => Box::new(SnapshotSource::new(path, aggregator)),
    }
}
