//! Command-line interface for the license report tool

use crate::config::{ConfigManager, ReportConfig};
use crate::format::{format_yen, group_thousands};
use crate::normalizer::CsvNormalizer;
use crate::notify::{Notification, Notifier, Urgency};
use crate::orchestrator::{ReportOrchestrator, ReportOutcome, ReportRequest};
use crate::prelude::*;
use crate::statistics::{
    data_source_from_config, summarize_utilization, LicenseDataSource, StatisticsAggregator,
};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Microsoft 365 license report tool: normalizes user license exports and
/// renders utilization reports
#[derive(Parser, Debug)]
#[command(name = "m365-report")]
#[command(about = "Normalize Microsoft 365 user license exports and build utilization reports")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Raw user license export (CSV)
    #[arg(value_name = "INPUT_CSV")]
    pub input: Option<PathBuf>,

    /// Destination of the cleaned CSV
    #[arg(value_name = "OUTPUT_CSV")]
    pub output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the HTML report plus cleaned and statistics CSVs
    Report {
        /// Raw user license export (CSV)
        #[arg(short, long, value_name = "FILE")]
        source: PathBuf,

        /// HTML template; the built-in layout is used when omitted
        #[arg(short, long, value_name = "FILE")]
        template: Option<PathBuf>,

        /// Directory receiving the artifacts
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// File name stem of the artifacts
        #[arg(long, value_name = "STEM")]
        stem: Option<String>,

        /// Send a notification through the configured channels
        #[arg(long)]
        notify: bool,
    },
    /// Show license statistics from the configured data source
    Stats {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Write the default configuration file
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments, returning clap's error instead of exiting
    pub fn try_parse() -> std::result::Result<Self, clap::Error> {
        <Self as Parser>::try_parse()
    }

    fn config_manager(&self) -> ConfigManager {
        match &self.config {
            Some(path) => ConfigManager::with_path(path.clone()),
            None => ConfigManager::new(),
        }
    }

    /// Configuration selected by `--config`, or the default file
    pub fn load_config(&self) -> Result<ReportConfig> {
        let manager = self.config_manager();
        if self.config.is_some() && !manager.config_path().exists() {
            return Err(ReportError::CliArgument(format!(
                "configuration file does not exist: {}",
                manager.config_path().display()
            )));
        }
        manager.load_config()
    }

    /// Run the CLI application
    pub async fn run(self, config: ReportConfig) -> Result<()> {
        if let Some(command) = self.command.clone() {
            return self.run_subcommand(command, config).await;
        }

        let (input, output) = self.validate_args()?;
        self.run_normalize(&input, &output, &config)
    }

    fn validate_args(&self) -> Result<(PathBuf, PathBuf)> {
        let (input, output) = match (&self.input, &self.output) {
            (Some(input), Some(output)) => (input.clone(), output.clone()),
            _ => {
                return Err(ReportError::CliArgument(
                    "usage: m365-report <INPUT_CSV> <OUTPUT_CSV>".to_string(),
                ))
            }
        };

        if !input.is_file() {
            return Err(ReportError::CliArgument(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        Ok((input, output))
    }

    fn run_normalize(&self, input: &Path, output: &Path, config: &ReportConfig) -> Result<()> {
        if self.verbose {
            println!("Input: {}", input.display());
            println!("Output: {}", output.display());
        }

        let normalizer = CsvNormalizer::new(config.tiers.clone());
        let outcome = normalizer.normalize(input, output)?;

        println!("✅ 整形済みCSV: {}", outcome.cleaned_csv.display());
        println!("✅ 統計情報CSV: {}", outcome.statistics_csv.display());
        println!(
            "👥 対象ユーザー数: {}名",
            group_thousands(outcome.summary.total_users as u64)
        );
        for (license, count) in &outcome.summary.license_breakdown {
            println!("   {}: {}名", license, count);
        }
        println!(
            "💰 月額コスト合計: {} (平均 {})",
            format_yen(outcome.summary.total_monthly_cost),
            format_yen(outcome.summary.average_monthly_cost)
        );
        Ok(())
    }

    async fn run_subcommand(&self, command: Commands, config: ReportConfig) -> Result<()> {
        match command {
            Commands::Report {
                source,
                template,
                output_dir,
                stem,
                notify,
            } => {
                let request = ReportRequest {
                    source_csv: source,
                    template: template.or_else(|| config.paths.template.clone()),
                    output_dir: output_dir.unwrap_or_else(|| config.paths.output_dir.clone()),
                    output_stem: stem.unwrap_or_else(|| config.paths.output_stem.clone()),
                    generated_at: Local::now().naive_local(),
                };
                self.run_report(&request, &config, notify).await
            }
            Commands::Stats { json } => self.run_stats(&config, json),
            Commands::InitConfig { output, force } => {
                let path = output
                    .unwrap_or_else(|| self.config_manager().config_path().to_path_buf());
                self.run_init_config(path, force)
            }
        }
    }

    async fn run_report(
        &self,
        request: &ReportRequest,
        config: &ReportConfig,
        notify: bool,
    ) -> Result<()> {
        let orchestrator = ReportOrchestrator::from_config(config);
        if self.verbose {
            println!("Data source: {}", orchestrator.source_name());
            println!("Source CSV: {}", request.source_csv.display());
            println!("Output directory: {}", request.output_dir.display());
        }

        let result = orchestrator.run(request);

        if notify {
            let notifier = Notifier::from_config(&config.notification).unwrap_or_else(|e| {
                warn!(error = %e, "notification channels unavailable");
                Notifier::new()
            });
            if notifier.is_empty() {
                println!("⚠️  通知チャネルが設定されていません");
            } else {
                let notification = run_notification(&result, request.generated_at);
                let summary = notifier.dispatch(&notification).await;
                debug!(
                    delivered = summary.delivered.len(),
                    failed = summary.failed.len(),
                    "notification dispatch finished"
                );
                for (channel, error) in &summary.failed {
                    println!("⚠️  通知失敗 ({}): {}", channel, error);
                }
            }
        }

        let outcome = result?;
        for line in outcome.console_lines() {
            println!("{}", line);
        }
        Ok(())
    }

    fn run_stats(&self, config: &ReportConfig, json: bool) -> Result<()> {
        let aggregator = StatisticsAggregator::new()
            .with_expected_plans(config.paths.expected_plans.iter().cloned());
        let source = data_source_from_config(&config.data_source, aggregator);
        let statistics = source.fetch_license_statistics()?;
        let utilization = summarize_utilization(&statistics, &config.thresholds);

        if json {
            let value = serde_json::json!({
                "source": source.name(),
                "statistics": statistics,
                "utilization": utilization,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }

        println!("📊 ライセンス統計 ({})", source.name());
        println!("{:<36} {:>8} {:>8} {:>8} {:>8}", "プラン", "購入", "割当", "未使用", "利用率");
        for (name, plan) in statistics.plans() {
            println!(
                "{:<36} {:>8} {:>8} {:>8} {:>7.1}%",
                name, plan.total, plan.assigned, plan.available, plan.utilization_rate
            );
        }
        println!(
            "{:<36} {:>8} {:>8} {:>8} {:>7.1}%",
            "合計",
            statistics.total_purchased(),
            statistics.total_assigned(),
            statistics.total_unused(),
            utilization.rate
        );
        println!("📈 効率: {}", utilization.level.label());
        Ok(())
    }

    fn run_init_config(&self, path: PathBuf, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(ReportError::CliArgument(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }

        ConfigManager::with_path(path.clone()).save_config(&ReportConfig::default())?;
        println!("✅ 設定ファイルを作成しました: {}", path.display());
        Ok(())
    }
}

fn run_notification(result: &Result<ReportOutcome>, at: NaiveDateTime) -> Notification {
    match result {
        Ok(outcome) => {
            let mut notification = Notification::new(
                "ライセンスレポート作成完了",
                format!(
                    "利用率 {:.1}% ({})",
                    outcome.utilization.rate,
                    outcome.utilization.level.label()
                ),
                Urgency::for_efficiency(outcome.utilization.level),
                at,
            )
            .with_fact("対象ユーザー数", format!("{}名", outcome.summary.total_users))
            .with_fact("未使用ライセンス", group_thousands(outcome.statistics.total_unused()))
            .with_fact("月額コスト合計", format_yen(outcome.summary.total_monthly_cost));
            for artifact in &outcome.artifacts {
                notification = notification
                    .with_fact(artifact.kind.to_string(), artifact.path.display().to_string());
            }
            notification
        }
        Err(e) => {
            Notification::new("ライセンスレポート作成失敗", e.to_string(), Urgency::Critical, at)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        <Cli as Parser>::try_parse_from(args)
    }

    #[test]
    fn test_positional_normalize_args() {
        let cli = parse(&["m365-report", "in.csv", "out.csv"]).unwrap();
        assert_eq!(cli.input, Some(PathBuf::from("in.csv")));
        assert_eq!(cli.output, Some(PathBuf::from("out.csv")));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_extra_positional_is_usage_error() {
        assert!(parse(&["m365-report", "a.csv", "b.csv", "c.csv"]).is_err());
    }

    #[test]
    fn test_missing_output_fails_validation() {
        let cli = parse(&["m365-report", "in.csv"]).unwrap();
        assert!(matches!(cli.validate_args(), Err(ReportError::CliArgument(_))));
    }

    #[test]
    fn test_report_subcommand() {
        let cli = parse(&[
            "m365-report",
            "report",
            "--source",
            "users.csv",
            "--stem",
            "monthly",
            "--notify",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Report { source, stem, notify, template, .. }) => {
                assert_eq!(source, PathBuf::from("users.csv"));
                assert_eq!(stem.as_deref(), Some("monthly"));
                assert!(notify);
                assert!(template.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_init_config_writes_loadable_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let cli = parse(&["m365-report", "init-config"]).unwrap();

        cli.run_init_config(path.clone(), false).unwrap();
        let loaded = ConfigManager::with_path(path.clone()).load_config().unwrap();
        assert_eq!(loaded, ReportConfig::default());

        let err = cli.run_init_config(path.clone(), false).unwrap_err();
        assert!(matches!(err, ReportError::CliArgument(_)));
        cli.run_init_config(path, true).unwrap();
    }

    #[test]
    fn test_failure_notification_is_critical() {
        let at = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let result: Result<ReportOutcome> = Err(ReportError::Configuration("broken".to_string()));
        let notification = run_notification(&result, at);
        assert_eq!(notification.urgency, Urgency::Critical);
        assert!(notification.body.contains("broken"));
    }
}
