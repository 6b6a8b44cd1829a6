//! Core data types shared by the normalizer, aggregator and renderer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Keyword policy used for sort tiers and row styling.
///
/// Matching is a case-insensitive substring test against the license label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierPolicy {
    /// Keyword of the first-priority plan (premium suite)
    pub primary_keyword: String,
    /// Keyword of the second-priority plan (mail-only plan)
    pub secondary_keyword: String,
    /// Keyword of the basic plan
    pub basic_keyword: String,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            primary_keyword: "E3".to_string(),
            secondary_keyword: "Exchange".to_string(),
            basic_keyword: "Basic".to_string(),
        }
    }
}

impl TierPolicy {
    /// Sort tier of a license label
    pub fn tier_of(&self, license_label: &str) -> LicenseTier {
        if contains_keyword(license_label, &self.primary_keyword) {
            LicenseTier::Primary
        } else if contains_keyword(license_label, &self.secondary_keyword) {
            LicenseTier::Secondary
        } else {
            LicenseTier::Other
        }
    }

    /// Row styling for a license label. First matching rule wins.
    pub fn row_class(&self, license_label: &str) -> RowClass {
        if contains_keyword(license_label, &self.secondary_keyword) {
            RowClass::Attention
        } else if contains_keyword(license_label, &self.basic_keyword) {
            RowClass::Info
        } else {
            RowClass::Normal
        }
    }
}

fn contains_keyword(label: &str, keyword: &str) -> bool {
    !keyword.is_empty() && label.to_lowercase().contains(&keyword.to_lowercase())
}

/// Sort tier; the derived ordering is the sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LicenseTier {
    Primary,
    Secondary,
    Other,
}

/// Visual classification of a table row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowClass {
    Attention,
    Info,
    Normal,
}

impl RowClass {
    pub fn css_class(self) -> &'static str {
        match self {
            RowClass::Attention => "attention",
            RowClass::Info => "info",
            RowClass::Normal => "normal",
        }
    }
}

/// One user row after normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLicenseRecord {
    /// Dense 1-based position in the final sorted order
    pub sequence_no: usize,
    pub display_name: String,
    /// Empty when the export had no department or the `-` placeholder
    pub department_code: String,
    /// Number of plans listed in the assigned-licenses label
    pub license_count: usize,
    pub license_type: String,
    /// Monthly cost in yen
    pub monthly_cost: u64,
    pub last_signin: Option<String>,
    pub utilization_status: String,
    pub optimization_status: String,
    pub email: String,
    pub created_at: String,
    pub analyzed_at: String,
}

/// Seat counts of a single plan. `assigned + available == total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanStatistics {
    pub total: u32,
    pub assigned: u32,
    pub available: u32,
    /// Percentage rounded to one decimal place, 0 for plans with no seats
    pub utilization_rate: f64,
}

/// Per-plan statistics plus aggregate totals for one report run.
///
/// Only built through [`LicenseStatistics::from_plans`], so the totals always
/// match the plans. It serializes for output but is never read back.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LicenseStatistics {
    plans: BTreeMap<String, PlanStatistics>,
    total_purchased: u64,
    total_assigned: u64,
    total_unused: u64,
}

impl LicenseStatistics {
    /// Build from per-plan entries; aggregates are exact integer sums.
    pub(crate) fn from_plans(plans: BTreeMap<String, PlanStatistics>) -> Self {
        let total_purchased = plans.values().map(|p| u64::from(p.total)).sum();
        let total_assigned = plans.values().map(|p| u64::from(p.assigned)).sum();
        let total_unused = plans.values().map(|p| u64::from(p.available)).sum();
        Self {
            plans,
            total_purchased,
            total_assigned,
            total_unused,
        }
    }

    /// Statistics of a plan; an absent plan reads as all zero
    pub fn plan(&self, name: &str) -> PlanStatistics {
        self.plans.get(name).copied().unwrap_or_default()
    }

    pub fn plans(&self) -> impl Iterator<Item = (&str, &PlanStatistics)> {
        self.plans.iter().map(|(name, stats)| (name.as_str(), stats))
    }

    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    pub fn total_purchased(&self) -> u64 {
        self.total_purchased
    }

    pub fn total_assigned(&self) -> u64 {
        self.total_assigned
    }

    pub fn total_unused(&self) -> u64 {
        self.total_unused
    }
}

/// Overall license efficiency band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EfficiencyLevel {
    Good,
    Fair,
    Poor,
}

impl EfficiencyLevel {
    /// Classify an overall utilization percentage
    pub fn classify(rate: f64, thresholds: &EfficiencyThresholds) -> Self {
        if rate >= thresholds.good {
            EfficiencyLevel::Good
        } else if rate >= thresholds.fair {
            EfficiencyLevel::Fair
        } else {
            EfficiencyLevel::Poor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EfficiencyLevel::Good => "良好",
            EfficiencyLevel::Fair => "改善余地あり",
            EfficiencyLevel::Poor => "大幅改善必要",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            EfficiencyLevel::Good => "efficiency-high",
            EfficiencyLevel::Fair => "efficiency-medium",
            EfficiencyLevel::Poor => "efficiency-low",
        }
    }
}

impl fmt::Display for EfficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Utilization thresholds (percent) for the efficiency bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyThresholds {
    pub good: f64,
    pub fair: f64,
}

impl Default for EfficiencyThresholds {
    fn default() -> Self {
        Self {
            good: 80.0,
            fair: 50.0,
        }
    }
}

/// Kind of file produced by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    HtmlReport,
    CleanedCsv,
    StatisticsCsv,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::HtmlReport => "HTMLレポート",
            ArtifactKind::CleanedCsv => "整形済みCSV",
            ArtifactKind::StatisticsCsv => "統計情報CSV",
        };
        f.write_str(name)
    }
}

/// A written output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}
