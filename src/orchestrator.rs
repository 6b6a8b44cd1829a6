//! End-to-end report runs
//!
//! One run fetches seat statistics, normalizes the user export, renders the
//! HTML report and writes all three artifacts. Everything is rendered in
//! memory first; the writes go through one [`BatchWriter`] so a failed run
//! leaves no partial artifact set behind.

use crate::config::ReportConfig;
use crate::format::{artifact_timestamp, format_yen, group_thousands};
use crate::html::{ReportView, TemplateRenderer};
use crate::normalizer::{CsvNormalizer, NormalizationSummary, STATISTICS_SUFFIX};
use crate::output::{BatchWriter, OutputConfig};
use crate::prelude::*;
use crate::statistics::{
    data_source_from_config, summarize_utilization, LicenseDataSource, StatisticsAggregator,
    UtilizationSummary,
};
use crate::types::{ArtifactKind, EfficiencyThresholds, LicenseStatistics, ReportArtifact};
use chrono::NaiveDateTime;
use std::path::PathBuf;
use tracing::{debug, info};

/// Inputs of one report run
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub source_csv: PathBuf,
    pub template: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub output_stem: String,
    pub generated_at: NaiveDateTime,
}

impl ReportRequest {
    pub fn artifact_path(&self, kind: ArtifactKind) -> PathBuf {
        let ts = artifact_timestamp(&self.generated_at);
        let name = match kind {
            ArtifactKind::HtmlReport => format!("{}_{}.html", self.output_stem, ts),
            ArtifactKind::CleanedCsv => format!("{}_{}.csv", self.output_stem, ts),
            ArtifactKind::StatisticsCsv => {
                format!("{}_{}{}.csv", self.output_stem, ts, STATISTICS_SUFFIX)
            }
        };
        self.output_dir.join(name)
    }
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub artifacts: Vec<ReportArtifact>,
    pub statistics: LicenseStatistics,
    pub utilization: UtilizationSummary,
    pub summary: NormalizationSummary,
}

impl ReportOutcome {
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&ReportArtifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Lines printed to the console after a successful run
    pub fn console_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .artifacts
            .iter()
            .map(|a| format!("✅ {}: {}", a.kind, a.path.display()))
            .collect();

        lines.push(format!(
            "📊 ライセンス: 購入 {} / 割り当て {} / 未使用 {}",
            group_thousands(self.statistics.total_purchased()),
            group_thousands(self.statistics.total_assigned()),
            group_thousands(self.statistics.total_unused()),
        ));
        lines.push(format!(
            "👥 対象ユーザー数: {}名",
            group_thousands(self.summary.total_users as u64)
        ));
        lines.push(format!(
            "📈 利用率: {:.1}% ({})",
            self.utilization.rate,
            self.utilization.level.label()
        ));
        lines.push(format!(
            "💰 月額コスト合計: {} (平均 {})",
            format_yen(self.summary.total_monthly_cost),
            format_yen(self.summary.average_monthly_cost)
        ));
        lines
    }
}

/// Runs the full pipeline against one data source
pub struct ReportOrchestrator {
    normalizer: CsvNormalizer,
    renderer: TemplateRenderer,
    source: Box<dyn LicenseDataSource>,
    thresholds: EfficiencyThresholds,
}

impl ReportOrchestrator {
    pub fn new(
        normalizer: CsvNormalizer,
        source: Box<dyn LicenseDataSource>,
        thresholds: EfficiencyThresholds,
    ) -> Self {
        Self {
            normalizer,
            renderer: TemplateRenderer::new(),
            source,
            thresholds,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        let aggregator = StatisticsAggregator::new()
            .with_expected_plans(config.paths.expected_plans.iter().cloned());
        Self::new(
            CsvNormalizer::new(config.tiers.clone()),
            data_source_from_config(&config.data_source, aggregator),
            config.thresholds,
        )
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn run(&self, request: &ReportRequest) -> Result<ReportOutcome> {
        if request.output_stem.trim().is_empty() {
            return Err(ReportError::Validation {
                field: "output_stem".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let statistics = self.source.fetch_license_statistics()?;
        let utilization = summarize_utilization(&statistics, &self.thresholds);
        debug!(source = self.source.name(), rate = utilization.rate, "fetched license statistics");

        let records = self.normalizer.read_records(&request.source_csv)?;
        let summary = NormalizationSummary::from_records(&records);

        let view = ReportView {
            statistics: &statistics,
            utilization,
            records: &records,
            summary: &summary,
            policy: self.normalizer.policy(),
            generated_at: request.generated_at,
        };
        let html = match &request.template {
            Some(path) => {
                let template = self.renderer.load_template(path)?;
                self.renderer.render(&template, &view)?
            }
            None => self.renderer.render_skeleton(&view)?,
        };
        let cleaned = self.normalizer.render_cleaned_csv(&records)?;
        let statistics_csv = self.normalizer.render_statistics_csv(&summary)?;

        let artifacts = vec![
            ReportArtifact {
                kind: ArtifactKind::HtmlReport,
                path: request.artifact_path(ArtifactKind::HtmlReport),
            },
            ReportArtifact {
                kind: ArtifactKind::CleanedCsv,
                path: request.artifact_path(ArtifactKind::CleanedCsv),
            },
            ReportArtifact {
                kind: ArtifactKind::StatisticsCsv,
                path: request.artifact_path(ArtifactKind::StatisticsCsv),
            },
        ];

        let mut batch = BatchWriter::new(OutputConfig::write_once());
        batch
            .stage(&artifacts[0].path, html.into_bytes())
            .stage(&artifacts[1].path, cleaned)
            .stage(&artifacts[2].path, statistics_csv);
        batch.commit()?;

        info!(
            output_dir = %request.output_dir.display(),
            users = summary.total_users,
            utilization = utilization.rate,
            "report artifacts written"
        );

        Ok(ReportOutcome {
            artifacts,
            statistics,
            utilization,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::FixtureSource;
    use crate::types::{EfficiencyLevel, TierPolicy};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const EXPORT: &str = "DisplayName,Department,AssignedLicenses,TotalMonthlyCost\n\
        Carol,SALES,Microsoft 365 Business Basic,\"¥1,000\"\n\
        Bob,IT,Exchange Online Plan 2,¥960\n\
        Alice,IT,Microsoft 365 E3,\"¥2,840\"\n";

    fn request(dir: &TempDir) -> ReportRequest {
        let source_csv = dir.path().join("users.csv");
        std::fs::write(&source_csv, EXPORT).unwrap();
        ReportRequest {
            source_csv,
            template: None,
            output_dir: dir.path().join("out"),
            output_stem: "license_report".to_string(),
            generated_at: NaiveDate::from_ymd_opt(2024, 7, 1)
                .unwrap()
                .and_hms_opt(9, 5, 30)
                .unwrap(),
        }
    }

    fn orchestrator() -> ReportOrchestrator {
        ReportOrchestrator::new(
            CsvNormalizer::new(TierPolicy::default()),
            Box::new(FixtureSource::default()),
            EfficiencyThresholds::default(),
        )
    }

    #[test]
    fn test_artifact_names() {
        let dir = TempDir::new().unwrap();
        let request = request(&dir);
        assert_eq!(
            request.artifact_path(ArtifactKind::StatisticsCsv),
            dir.path().join("out").join("license_report_20240701_090530_統計情報.csv")
        );
        assert_eq!(
            request.artifact_path(ArtifactKind::HtmlReport),
            dir.path().join("out").join("license_report_20240701_090530.html")
        );
    }

    #[test]
    fn test_run_writes_three_artifacts() {
        let dir = TempDir::new().unwrap();
        let outcome = orchestrator().run(&request(&dir)).unwrap();

        assert_eq!(outcome.artifacts.len(), 3);
        for artifact in &outcome.artifacts {
            assert!(artifact.path.exists(), "{} missing", artifact.path.display());
        }
        assert_eq!(outcome.summary.total_monthly_cost, 4800);
        assert_eq!(outcome.utilization.level, EfficiencyLevel::Poor);

        let html_path = &outcome.artifact(ArtifactKind::HtmlReport).unwrap().path;
        let html = std::fs::read_to_string(html_path).unwrap();
        assert!(html.contains("対象ユーザー数: 3名"));
        let alice = html.find("<td>Alice</td>").unwrap();
        let bob = html.find("<td>Bob</td>").unwrap();
        let carol = html.find("<td>Carol</td>").unwrap();
        assert!(alice < bob && bob < carol);

        let lines = outcome.console_lines();
        assert!(lines.iter().any(|l| l.contains("30.9% (大幅改善必要)")));
        assert!(lines.iter().any(|l| l.contains("¥4,800 (平均 ¥1,600)")));
    }

    #[test]
    fn test_second_run_with_same_timestamp_keeps_first_artifacts() {
        let dir = TempDir::new().unwrap();
        let request = request(&dir);
        let first = orchestrator().run(&request).unwrap();
        let html_path = first.artifact(ArtifactKind::HtmlReport).unwrap().path.clone();
        let before = std::fs::read(&html_path).unwrap();

        assert!(orchestrator().run(&request).is_err());
        assert_eq!(std::fs::read(&html_path).unwrap(), before);
    }

    #[test]
    fn test_drifted_template_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.html");
        std::fs::write(&template, "<html><body><p>no anchors</p></body></html>").unwrap();
        let mut request = request(&dir);
        request.template = Some(template);

        assert!(orchestrator().run(&request).is_err());
        assert!(
            !request.output_dir.exists()
                || std::fs::read_dir(&request.output_dir).unwrap().next().is_none()
        );
    }

    #[test]
    fn test_from_config_uses_configured_source() {
        let config = ReportConfig::default();
        assert_eq!(ReportOrchestrator::from_config(&config).source_name(), "fixture");
    }
}
