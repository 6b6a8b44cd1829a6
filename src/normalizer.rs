//! Normalization of raw user/license CSV exports
//!
//! Reads the raw export, sorts rows by license tier then display name,
//! relabels columns and produces the cleaned CSV plus a statistics CSV.

use crate::errors::ErrorContext;
use crate::format::{average_yen, format_yen, parse_yen};
use crate::output::{BatchWriter, OutputConfig};
use crate::prelude::*;
use crate::types::{TierPolicy, UserLicenseRecord};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const UTF8_BOM: &str = "\u{feff}";

/// Columns that must be present in the raw export
pub const REQUIRED_COLUMNS: [&str; 2] = ["DisplayName", "TotalMonthlyCost"];

/// Header of the cleaned CSV
pub const CLEANED_HEADERS: [&str; 10] = [
    "No",
    "ユーザー名",
    "部署コード",
    "ライセンス種別",
    "月額コスト（円）",
    "利用状況",
    "最適化状況",
    "メールアドレス",
    "作成日時",
    "分析日時",
];

/// Header of the statistics CSV
pub const STATISTICS_HEADERS: [&str; 3] = ["項目", "数量", "備考"];

/// Suffix of the companion statistics file
pub const STATISTICS_SUFFIX: &str = "_統計情報";

const UNASSIGNED_LABEL: &str = "(未割り当て)";

/// One row of the raw export
#[derive(Debug, Deserialize)]
struct RawUserRow {
    #[serde(rename = "DisplayName")]
    display_name: String,
    #[serde(rename = "Department", default)]
    department: Option<String>,
    #[serde(rename = "AssignedLicenses", default)]
    assigned_licenses: Option<String>,
    #[serde(rename = "TotalMonthlyCost")]
    total_monthly_cost: String,
    #[serde(rename = "UtilizationStatus", default)]
    utilization_status: Option<String>,
    #[serde(rename = "OptimizationRecommendations", default)]
    optimization_recommendations: Option<String>,
    #[serde(rename = "UserPrincipalName", default)]
    user_principal_name: Option<String>,
    #[serde(rename = "CreatedDateTime", default)]
    created_date_time: Option<String>,
    #[serde(rename = "AnalysisTimestamp", default)]
    analysis_timestamp: Option<String>,
    #[serde(rename = "LastSignInDateTime", default)]
    last_sign_in_date_time: Option<String>,
}

/// Counts and costs derived from the normalized rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationSummary {
    pub total_users: usize,
    /// Users per license label, in sorted-row order of first appearance
    pub license_breakdown: Vec<(String, usize)>,
    pub total_monthly_cost: u64,
    pub average_monthly_cost: u64,
}

impl NormalizationSummary {
    pub fn from_records(records: &[UserLicenseRecord]) -> Self {
        let mut license_breakdown: Vec<(String, usize)> = Vec::new();
        for record in records {
            let label = if record.license_type.is_empty() {
                UNASSIGNED_LABEL
            } else {
                record.license_type.as_str()
            };
            match license_breakdown.iter_mut().find(|(name, _)| name == label) {
                Some((_, count)) => *count += 1,
                None => license_breakdown.push((label.to_string(), 1)),
            }
        }

        let total_monthly_cost = records.iter().map(|r| r.monthly_cost).sum();
        Self {
            total_users: records.len(),
            license_breakdown,
            total_monthly_cost,
            average_monthly_cost: average_yen(total_monthly_cost, records.len()),
        }
    }
}

/// Paths and summary of a completed normalization
#[derive(Debug, Clone)]
pub struct NormalizationOutcome {
    pub cleaned_csv: PathBuf,
    pub statistics_csv: PathBuf,
    pub summary: NormalizationSummary,
}

/// Reads, sorts and relabels user license exports
#[derive(Debug, Clone, Default)]
pub struct CsvNormalizer {
    policy: TierPolicy,
}

impl CsvNormalizer {
    pub fn new(policy: TierPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TierPolicy {
        &self.policy
    }

    /// Parse, sort and number every row of the export at `path`
    pub fn read_records(&self, path: &Path) -> Result<Vec<UserLicenseRecord>> {
        let content = std::fs::read_to_string(path).with_file_context(path)?;
        let records = self.parse_records(&content).map_err(|e| match e {
            ReportError::Csv(csv_err) => ReportError::FileProcessing {
                file_path: path.to_path_buf(),
                cause: csv_err.to_string(),
            },
            other => other,
        })?;
        debug!(path = %path.display(), rows = records.len(), "read user license export");
        Ok(records)
    }

    /// Parse export text (a leading BOM is ignored)
    pub fn parse_records(&self, content: &str) -> Result<Vec<UserLicenseRecord>> {
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
        let mut reader = csv::ReaderBuilder::new()
            .flexible(false)
            .from_reader(content.as_bytes());

        let headers = reader.headers()?.clone();
        for required in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h.trim() == required) {
                return Err(ReportError::Validation {
                    field: required.to_string(),
                    message: "required column missing from CSV header".to_string(),
                });
            }
        }

        let mut records = Vec::new();
        for (index, row) in reader.deserialize::<RawUserRow>().enumerate() {
            let row = row?;
            records.push(self.convert_row(index + 1, row)?);
        }

        self.sort_records(&mut records);
        Ok(records)
    }

    fn convert_row(&self, row_number: usize, row: RawUserRow) -> Result<UserLicenseRecord> {
        let monthly_cost =
            parse_yen(&row.total_monthly_cost).ok_or_else(|| ReportError::Parse {
                row: row_number,
                field: "TotalMonthlyCost".to_string(),
                value: row.total_monthly_cost.clone(),
                message: "monthly cost must be a non-negative integer".to_string(),
            })?;

        let license_type = clean(row.assigned_licenses);
        Ok(UserLicenseRecord {
            sequence_no: 0,
            display_name: row.display_name.trim().to_string(),
            department_code: normalize_department(row.department.as_deref()),
            license_count: count_licenses(&license_type),
            license_type,
            monthly_cost,
            last_signin: row
                .last_sign_in_date_time
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            utilization_status: clean(row.utilization_status),
            optimization_status: clean(row.optimization_recommendations),
            email: clean(row.user_principal_name),
            created_at: clean(row.created_date_time),
            analyzed_at: clean(row.analysis_timestamp),
        })
    }

    /// Stable sort by license tier, then display name; renumbers 1..N
    pub fn sort_records(&self, records: &mut [UserLicenseRecord]) {
        records.sort_by(|a, b| {
            self.policy
                .tier_of(&a.license_type)
                .cmp(&self.policy.tier_of(&b.license_type))
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        for (index, record) in records.iter_mut().enumerate() {
            record.sequence_no = index + 1;
        }
    }

    /// Cleaned CSV bytes (UTF-8 with BOM)
    pub fn render_cleaned_csv(&self, records: &[UserLicenseRecord]) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(UTF8_BOM.as_bytes().to_vec());
        writer.write_record(CLEANED_HEADERS)?;
        for record in records {
            writer.write_record([
                record.sequence_no.to_string(),
                record.display_name.clone(),
                record.department_code.clone(),
                record.license_type.clone(),
                format_yen(record.monthly_cost),
                record.utilization_status.clone(),
                record.optimization_status.clone(),
                record.email.clone(),
                record.created_at.clone(),
                record.analyzed_at.clone(),
            ])?;
        }
        finish(writer)
    }

    /// Statistics CSV bytes (UTF-8 with BOM)
    pub fn render_statistics_csv(&self, summary: &NormalizationSummary) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(UTF8_BOM.as_bytes().to_vec());
        writer.write_record(STATISTICS_HEADERS)?;
        writer.write_record([
            "総ユーザー数".to_string(),
            summary.total_users.to_string(),
            "正規化後の全ユーザー".to_string(),
        ])?;
        for (license, count) in &summary.license_breakdown {
            writer.write_record([
                format!("ライセンス: {}", license),
                count.to_string(),
                "ユーザー数".to_string(),
            ])?;
        }
        writer.write_record([
            "総月額コスト".to_string(),
            format_yen(summary.total_monthly_cost),
            "全ユーザー合計".to_string(),
        ])?;
        let average_note = if summary.total_users == 0 {
            "対象ユーザーなし"
        } else {
            "1ユーザーあたり"
        };
        writer.write_record([
            "平均月額コスト".to_string(),
            format_yen(summary.average_monthly_cost),
            average_note.to_string(),
        ])?;
        finish(writer)
    }

    /// Normalize `input` into `output` and its companion statistics file.
    /// Both files are written, or neither.
    pub fn normalize(&self, input: &Path, output: &Path) -> Result<NormalizationOutcome> {
        let records = self.read_records(input)?;
        let summary = NormalizationSummary::from_records(&records);

        let cleaned = self.render_cleaned_csv(&records)?;
        let statistics = self.render_statistics_csv(&summary)?;
        let statistics_path = statistics_path_for(output);

        let mut batch = BatchWriter::new(OutputConfig::default());
        batch
            .stage(output, cleaned)
            .stage(&statistics_path, statistics);
        batch.commit()?;

        info!(
            input = %input.display(),
            output = %output.display(),
            rows = summary.total_users,
            "normalized user license export"
        );

        Ok(NormalizationOutcome {
            cleaned_csv: output.to_path_buf(),
            statistics_csv: statistics_path,
            summary,
        })
    }
}

/// `out/users.csv` -> `out/users_統計情報.csv`
pub fn statistics_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let extension = output
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    output.with_file_name(format!("{}{}.{}", stem, STATISTICS_SUFFIX, extension))
}

fn normalize_department(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        None | Some("") | Some("-") => String::new(),
        Some(value) => value.to_string(),
    }
}

fn count_licenses(label: &str) -> usize {
    label
        .split([',', ';', '+'])
        .filter(|part| !part.trim().is_empty())
        .count()
}

fn clean(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| ReportError::Io(e.into_error()))
}
