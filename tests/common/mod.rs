//! Shared fixtures for the integration tests

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::OnceLock;
use tempfile::TempDir;

/// Header of a raw user license export
pub const EXPORT_HEADER: &str = concat!(
    "DisplayName,Department,AssignedLicenses,TotalMonthlyCost,UtilizationStatus,",
    "OptimizationRecommendations,UserPrincipalName,CreatedDateTime,AnalysisTimestamp,",
    "LastSignInDateTime"
);

/// Three users, one per license tier, deliberately out of order
pub fn scenario_export() -> String {
    [
        EXPORT_HEADER,
        concat!(
            "Carol Basic,SALES,Microsoft 365 Business Basic,\"¥1,000\",利用中,最適,",
            "carol@example.com,2023-04-01,2024-07-01,2024-06-30"
        ),
        concat!(
            "Bob Exchange,-,Exchange Online Plan 2,¥960,低利用,見直し推奨,",
            "bob@example.com,2023-04-01,2024-07-01,"
        ),
        concat!(
            "Alice E3,IT,Microsoft 365 E3,\"¥2,840\",利用中,最適,",
            "alice@example.com,2023-04-01,2024-07-01,2024-06-29"
        ),
    ]
    .join("\n")
        + "\n"
}

/// A few hundred generated users, built once per test binary
pub fn large_export() -> &'static str {
    static EXPORT: OnceLock<String> = OnceLock::new();
    EXPORT.get_or_init(|| {
        let licenses = [
            "Microsoft 365 Business Basic",
            "Exchange Online Plan 2",
            "Microsoft 365 E3",
            "Power BI Pro",
        ];
        let mut export = String::from(EXPORT_HEADER);
        export.push('\n');
        for i in 0..400u32 {
            let license = licenses[(i % 4) as usize];
            let _ = writeln!(
                export,
                "User {:03},D{:02},{},¥{},利用中,最適,user{}@example.com,2023-01-01,2024-07-01,",
                (i * 37) % 400,
                i % 12,
                license,
                500 + (i % 7) * 100,
                i
            );
        }
        export
    })
}

pub fn report_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, 1)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .expect("valid fixture timestamp")
}

/// Scratch directory holding a raw export
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    pub fn read(&self, name: &str) -> String {
        let content = std::fs::read_to_string(self.dir.path().join(name)).expect("read output");
        content.trim_start_matches('\u{feff}').to_string()
    }
}
