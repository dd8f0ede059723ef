//! CLI integration tests

use std::io::Write;
use std::process::{Command, Output};

fn opi(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "opi-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = opi(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("StatefulSets"), "Should show about text");
    for command in [
        "desire",
        "update",
        "list",
        "get",
        "stop",
        "stop-instance",
        "instances",
    ] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = opi(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("opi"), "Should show binary name");
}

/// Test global options
#[test]
fn test_global_options() {
    let output = opi(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--namespace"), "Should show namespace option");
    assert!(
        stdout.contains("--rootfs-version"),
        "Should show rootfs-version option"
    );
    assert!(stdout.contains("--kubeconfig"), "Should show kubeconfig option");
    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
}

/// Test stop-instance argument help
#[test]
fn test_stop_instance_help() {
    let output = opi(&["stop-instance", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stop-instance help should succeed");
    assert!(stdout.contains("<GUID>"), "Should show guid argument");
    assert!(stdout.contains("<VERSION>"), "Should show version argument");
    assert!(stdout.contains("<INDEX>"), "Should show index argument");
}

/// Test that a non-numeric instance index is rejected
#[test]
fn test_stop_instance_rejects_bad_index() {
    let output = opi(&["stop-instance", "guid", "version", "first"]);
    assert!(!output.status.success(), "Bad index should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid"), "Should explain the bad value");
}

/// Test that a malformed LRP file fails before contacting the cluster
#[test]
fn test_desire_rejects_malformed_file() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(b"{\"guid\": 42").expect("Failed to write temp file");
    let path = file.path().to_string_lossy().to_string();

    let output = opi(&["desire", &path]);
    assert!(!output.status.success(), "Malformed LRP should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid LRP definition"),
        "Should report the invalid definition"
    );
}

/// Test that a missing LRP file is reported
#[test]
fn test_update_missing_file() {
    let output = opi(&["update", "/nonexistent/lrp.json"]);
    assert!(!output.status.success(), "Missing file should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read"), "Should report the unreadable file");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = opi(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = opi(&["get", "guid_1234"]);
    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}
