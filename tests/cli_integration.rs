//! Tests of the `m365-report` binary

mod common;

use assert_cmd::Command;
use common::{scenario_export, Workspace};

fn m365_report(ws: &Workspace) -> Command {
    let mut cmd = Command::cargo_bin("m365-report").expect("binary exists");
    cmd.current_dir(ws.path()).env("HOME", ws.path()).env_remove("RUST_LOG");
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn no_arguments_is_a_usage_error() {
    let ws = Workspace::new();
    let output = m365_report(&ws).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("usage"));
}

#[test]
fn extra_arguments_are_a_usage_error() {
    let ws = Workspace::new();
    m365_report(&ws)
        .args(["a.csv", "b.csv", "c.csv"])
        .assert()
        .code(1);
}

#[test]
fn help_exits_successfully() {
    let ws = Workspace::new();
    m365_report(&ws).arg("--help").assert().success();
}

#[test]
fn missing_input_reports_error() {
    let ws = Workspace::new();
    let output = m365_report(&ws).args(["missing.csv", "out.csv"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("❌"));
}

#[test]
fn normalizes_scenario_export() {
    let ws = Workspace::new();
    ws.write("users.csv", &scenario_export());

    let output = m365_report(&ws).args(["users.csv", "cleaned.csv"]).output().unwrap();
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("✅"));
    assert!(stdout.contains("対象ユーザー数: 3名"));
    assert!(stdout.contains("¥4,800"));
    assert!(ws.path().join("cleaned.csv").exists());
    assert!(ws.path().join("cleaned_統計情報.csv").exists());
}

#[test]
fn bad_cost_fails_with_diagnostic() {
    let ws = Workspace::new();
    ws.write("users.csv", "DisplayName,TotalMonthlyCost\nAlice,about 3000\n");

    let output = m365_report(&ws).args(["users.csv", "cleaned.csv"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("TotalMonthlyCost"));
    assert!(!ws.path().join("cleaned.csv").exists());
}

#[test]
fn report_subcommand_writes_artifacts() {
    let ws = Workspace::new();
    ws.write("users.csv", &scenario_export());

    let output = m365_report(&ws)
        .args(["report", "--source", "users.csv", "--output-dir", "out", "--stem", "july"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("30.9% (大幅改善必要)"));

    let names: Vec<String> = std::fs::read_dir(ws.path().join("out"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.iter().any(|n| n.starts_with("july_") && n.ends_with(".html")));
    assert!(names.iter().any(|n| n.ends_with("_統計情報.csv")));
}

#[test]
fn stats_json_reports_fixture_totals() {
    let ws = Workspace::new();
    let output = m365_report(&ws).args(["stats", "--json"]).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["source"], "fixture");
    assert_eq!(value["statistics"]["total_purchased"], 508);
    assert_eq!(value["statistics"]["total_assigned"], 157);
    assert_eq!(value["utilization"]["rate"], 30.9);
}

#[test]
fn init_config_refuses_to_overwrite() {
    let ws = Workspace::new();
    m365_report(&ws)
        .args(["init-config", "--output", "m365.toml"])
        .assert()
        .success();
    let written = std::fs::read_to_string(ws.path().join("m365.toml")).unwrap();
    assert!(written.contains("[tiers]"));

    m365_report(&ws)
        .args(["init-config", "--output", "m365.toml"])
        .assert()
        .code(1);
    m365_report(&ws)
        .args(["init-config", "--output", "m365.toml", "--force"])
        .assert()
        .success();

    m365_report(&ws)
        .args(["--config", "m365.toml", "stats"])
        .assert()
        .success();
}
