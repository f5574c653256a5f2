mod common;

use assert_cmd::Command;
use common::{TestWorkspace, fixture_path};
use predicates::str::contains;

fn csv_insight() -> Command {
    Command::cargo_bin("csv-insight").expect("binary exists")
}

#[test]
fn profile_json_reports_every_section() {
    let output = csv_insight()
        .args([
            "profile",
            "-i",
            fixture_path("people.csv").to_str().unwrap(),
            "--format",
            "json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let profile: serde_json::Value = serde_json::from_slice(&output).expect("profile json");
    assert!(profile.get("quality").is_some());
    assert!(profile.get("anomalies").is_some());
    assert_eq!(profile["statistics"].as_array().map(Vec::len), Some(4));
}

#[test]
fn profile_table_lists_columns() {
    csv_insight()
        .args([
            "profile",
            "-i",
            fixture_path("people.csv").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("salary"));
}

#[test]
fn apply_writes_transformed_csv() {
    let workspace = TestWorkspace::new();
    let plan = workspace.write(
        "plan.json",
        r#"{"type": "chain", "steps": [
            {"type": "operation", "name": "remove_duplicates"},
            {"type": "operation", "name": "standardize"}
        ]}"#,
    );
    let output = workspace.path().join("clean.csv");
    csv_insight()
        .args([
            "apply",
            "-i",
            fixture_path("people.csv").to_str().unwrap(),
            "-p",
            plan.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--explain",
        ])
        .assert()
        .success()
        .stderr(contains("repeated an earlier row"));

    let written = workspace.read("clean.csv");
    let lines = written.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "name,age,city,salary");
    assert_eq!(lines.len(), 6);
    assert!(lines.iter().any(|line| line.contains(",bergen,")));
}

#[test]
fn apply_reads_csv_from_stdin() {
    let workspace = TestWorkspace::new();
    let plan = workspace.write(
        "plan.yaml",
        "type: operation\nname: filter_rows\nparameters:\n  conditions:\n    - age > 40\n",
    );
    let assert = csv_insight()
        .args(["apply", "-i", "-", "-p", plan.to_str().unwrap()])
        .write_stdin("name,age\nAnn,34\nBob,71\nDan,45\n")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["name,age", "Ann,34"]);
}

#[test]
fn apply_preview_prints_table_instead_of_csv() {
    let workspace = TestWorkspace::new();
    let plan = workspace.write("plan.json", r#"{"type": "operation", "name": "dedupe"}"#);
    let output = workspace.path().join("skipped.csv");
    let assert = csv_insight()
        .args([
            "apply",
            "-i",
            fixture_path("people.csv").to_str().unwrap(),
            "-p",
            plan.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--preview",
            "2",
        ])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("name"));
    assert!(lines[2].contains("Ann") && lines[3].contains("Bob"));
    assert!(!stdout.contains("Cara"));
    assert!(!output.exists());
}

#[test]
fn apply_unknown_operation_fails_without_output() {
    let workspace = TestWorkspace::new();
    let plan = workspace.write("plan.json", r#"{"type": "operation", "name": "explode"}"#);
    let output = workspace.path().join("never.csv");
    csv_insight()
        .args([
            "apply",
            "-i",
            fixture_path("people.csv").to_str().unwrap(),
            "-p",
            plan.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("Unknown operation"));
    assert!(!output.exists());
}

#[test]
fn apply_rejects_denied_code() {
    let workspace = TestWorkspace::new();
    let plan = workspace.write(
        "plan.json",
        r#"{"type": "code", "snippet": "keep require(\"fs\")"}"#,
    );
    csv_insight()
        .args([
            "apply",
            "-i",
            fixture_path("people.csv").to_str().unwrap(),
            "-p",
            plan.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("Code rejected"));
}

#[test]
fn operations_lists_names_and_aliases() {
    csv_insight()
        .arg("operations")
        .assert()
        .success()
        .stdout(contains("remove_duplicates"))
        .stdout(contains("dedupe"));
}
