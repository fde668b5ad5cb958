//! End-to-end tests for the `muxguard` binary.
//!
//! Covers:
//! - `classify` output format
//! - `validate` exit status and `--json` report when test isolation is missing
//! - `validate` plain-text report

use std::process::{Command, Output};

use muxguard::config::{ENV_SESSION_PREFIX, ENV_TEST_MODE, ENV_TEST_SOCKET};

fn muxguard(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_muxguard"));
    cmd.args(args)
        .env_remove(ENV_TEST_MODE)
        .env_remove(ENV_TEST_SOCKET)
        .env_remove(ENV_SESSION_PREFIX)
        .env_remove("MUXGUARD_CONFIG")
        .env("RUST_LOG", "off");
    cmd
}

/// Run `validate` in test mode with neither a transport nor a prefix set.
fn validate_unisolated(extra: &[&str]) -> Output {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("absent.sock");
    let socket = socket.to_str().unwrap();
    let mut args = vec!["validate", "--socket", socket];
    args.extend_from_slice(extra);
    muxguard(&args)
        .env(ENV_TEST_MODE, "1")
        .output()
        .expect("failed to run muxguard")
}

#[test]
fn classify_prints_class_per_name() {
    let output = muxguard(&["classify", "test-a", "prod-b", "scratch"])
        .output()
        .expect("failed to run muxguard");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec!["test\ttest-a", "production\tprod-b", "unclassified\tscratch"]
    );
}

#[test]
fn validate_without_isolation_exits_nonzero_with_json_report() {
    let output = validate_unisolated(&["--json"]);
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let checks = report.as_array().unwrap();
    assert_eq!(checks.len(), 3);

    let consistency = checks
        .iter()
        .find(|c| c["check"] == "environment_consistency")
        .unwrap();
    assert_eq!(consistency["ok"], false);
    assert_eq!(consistency["code"], "isolation_misconfigured");
    let message = consistency["message"].as_str().unwrap();
    assert!(message.contains(ENV_SESSION_PREFIX), "{message}");

    let isolation = checks.iter().find(|c| c["check"] == "isolation").unwrap();
    assert_eq!(isolation["ok"], false);
    assert_eq!(isolation["code"], "isolation_misconfigured");
}

#[test]
fn validate_without_isolation_reports_failures_as_text() {
    let output = validate_unisolated(&[]);
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let first = stdout.lines().next().unwrap();
    assert!(first.starts_with("environment_consistency"), "{stdout}");
    assert!(first.ends_with("FAIL"), "{stdout}");
}
