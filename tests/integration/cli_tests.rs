//! Integration tests for the CLI binary.
//!
//! Verifies that the `odo` binary responds to basic flags and drives a
//! record/edit/check flow against a temporary data directory.
//!
//! This test is registered as a [[test]] in the odometer-continuity-cli crate
//! so that CARGO_BIN_EXE_odo is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `odo` binary.
fn odo_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_odo"))
}

/// Run `odo` against `data_dir` with the given arguments.
fn odo(data_dir: &Path, args: &[&str]) -> Output {
    odo_binary()
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .output()
        .expect("failed to execute odo")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "odo should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn add_trip(data_dir: &Path, started_at: &str, start: u64, end: u64) -> String {
    let output = odo(
        data_dir,
        &[
            "--json",
            "trip",
            "add",
            "--vehicle",
            "KA-01-1234",
            "--started-at",
            started_at,
            "--start-km",
            &start.to_string(),
            "--end-km",
            &end.to_string(),
        ],
    );
    let value = stdout_json(&output);
    value["trip"]["id"]
        .as_str()
        .expect("trip id in output")
        .to_string()
}

#[test]
fn cli_responds_to_help() {
    let output = odo_binary()
        .arg("--help")
        .output()
        .expect("failed to execute odo --help");

    assert!(
        output.status.success(),
        "odo --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("odo") || stdout.contains("Usage"),
        "odo --help output should contain usage information, got: {stdout}"
    );
}

#[test]
fn cli_responds_to_version() {
    let output = odo_binary()
        .arg("--version")
        .output()
        .expect("failed to execute odo --version");

    assert!(
        output.status.success(),
        "odo --version should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("0.3") || stdout.contains("odo"),
        "odo --version should contain version info, got: {stdout}"
    );
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = odo_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute odo");

    assert!(
        !output.status.success(),
        "odo with an unknown flag should exit with failure"
    );
}

#[test]
fn cli_rejects_bad_start_time() {
    let tmp = tempfile::tempdir().unwrap();
    let output = odo(
        tmp.path(),
        &[
            "trip",
            "add",
            "--vehicle",
            "KA-01-1234",
            "--started-at",
            "yesterday",
            "--start-km",
            "0",
            "--end-km",
            "10",
        ],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("error"));
}

#[test]
fn cli_edit_preview_then_apply() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();

    let first = add_trip(dir, "2024-03-01T08:00:00Z", 1_000, 1_100);
    let _second = add_trip(dir, "2024-03-01T12:00:00Z", 1_100, 1_150);
    let _third = add_trip(dir, "2024-03-02T09:00:00Z", 1_150, 1_175);

    // Preview only: nothing is written.
    let preview = stdout_json(&odo(
        dir,
        &[
            "--json", "edit", "--vehicle", "KA-01-1234", "--trip", &first, "--end-km", "1110",
        ],
    ));
    assert_eq!(preview["delta_km"], 10);
    assert_eq!(preview["rows"].as_array().unwrap().len(), 3);

    let listed = stdout_json(&odo(
        dir,
        &["--json", "trip", "list", "--vehicle", "KA-01-1234"],
    ));
    assert_eq!(listed[0]["end_km"], 1_100);

    // Confirmed: the whole cascade lands.
    let applied = odo(
        dir,
        &[
            "edit", "--vehicle", "KA-01-1234", "--trip", &first, "--end-km", "1110", "--yes",
        ],
    );
    assert!(
        applied.status.success(),
        "edit --yes failed: {}",
        String::from_utf8_lossy(&applied.stderr)
    );
    assert!(String::from_utf8_lossy(&applied.stdout).contains("3 trips updated"));

    let listed = stdout_json(&odo(
        dir,
        &["--json", "trip", "list", "--vehicle", "KA-01-1234"],
    ));
    assert_eq!(listed[0]["end_km"], 1_110);
    assert_eq!(listed[1]["start_km"], 1_110);
    assert_eq!(listed[2]["end_km"], 1_185);

    let report = stdout_json(&odo(dir, &["--json", "check", "--vehicle", "KA-01-1234"]));
    assert_eq!(report["result"], "Continuous");
}

#[test]
fn cli_edit_out_of_range_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();

    let first = add_trip(dir, "2024-03-01T08:00:00Z", 100, 300);
    add_trip(dir, "2024-03-01T12:00:00Z", 150, 180);

    let output = odo(
        dir,
        &[
            "edit", "--vehicle", "KA-01-1234", "--trip", &first, "--end-km", "120", "--yes",
        ],
    );
    assert!(!output.status.success());

    let listed = stdout_json(&odo(
        dir,
        &["--json", "trip", "list", "--vehicle", "KA-01-1234"],
    ));
    assert_eq!(listed[0]["end_km"], 300);
}

#[test]
fn cli_vehicles_lists_recorded_vehicles() {
    let tmp = tempfile::tempdir().unwrap();
    add_trip(tmp.path(), "2024-03-01T08:00:00Z", 0, 40);

    let vehicles = stdout_json(&odo(tmp.path(), &["--json", "vehicles"]));
    assert_eq!(vehicles[0]["vehicle_id"], "KA-01-1234");
    assert_eq!(vehicles[0]["trips"], 1);
}
