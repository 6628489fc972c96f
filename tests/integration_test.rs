// tests/integration_test.rs
use std::process::Command;
use tempfile::TempDir;

fn npm_flow() -> Command {
    Command::new(env!("CARGO_BIN_EXE_npm-flow"))
}

#[test]
fn test_npm_flow_help() {
    let output = npm_flow().arg("--help").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("npm-flow"));
    for command in [
        "feature-start",
        "feature-finish",
        "bugfix-start",
        "bugfix-finish",
        "release-start",
        "release-finish",
        "hotfix-start",
        "hotfix-finish",
        "update-lock-file",
        "check-dependencies",
    ] {
        assert!(stdout.contains(command), "missing {}", command);
    }
}

#[test]
fn test_npm_flow_version() {
    let output = npm_flow().arg("--version").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_update_lock_file_requires_a_scope() {
    let output = npm_flow()
        .arg("update-lock-file")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unknown_branch_type_is_rejected() {
    let output = npm_flow()
        .args(["check-dependencies", "--branch-type", "trunk"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("trunk"));
}

#[test]
fn test_outside_a_repository_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let output = npm_flow()
        .arg("hotfix-start")
        .current_dir(dir.path())
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    assert!(!output.stderr.is_empty());
}
