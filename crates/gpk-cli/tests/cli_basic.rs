//! Integration tests for the gpk binary.
//!
//! These cover command plumbing and error surfacing; nothing here
//! touches a git remote.

use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn gpk() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "gpk-cli", "--bin", "gpk", "--"]);
    cmd
}

#[test]
fn test_init_then_install_empty() {
    let dir = tempdir().unwrap();

    let output = gpk()
        .args(["--cwd"])
        .arg(dir.path())
        .arg("init")
        .output()
        .expect("failed to run gpk init");
    assert!(output.status.success(), "init should succeed");
    assert!(dir.path().join("package.json").exists());

    // No dependencies declared: install is a no-op.
    let output = gpk()
        .args(["--cwd"])
        .arg(dir.path())
        .arg("install")
        .output()
        .expect("failed to run gpk install");
    assert!(output.status.success(), "empty install should succeed");
}

#[test]
fn test_init_refuses_existing_manifest() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("package.json"), "{}").unwrap();

    let output = gpk()
        .args(["--cwd"])
        .arg(dir.path())
        .arg("init")
        .output()
        .expect("failed to run gpk init");
    assert!(!output.status.success());
}

#[test]
fn test_install_without_manifest_fails() {
    let dir = tempdir().unwrap();
    // tempdir has no package.json anywhere up to / in CI containers;
    // guard against a manifest in a parent by nesting.
    let nested = dir.path().join("empty");
    fs::create_dir(&nested).unwrap();

    let output = gpk()
        .args(["--cwd"])
        .arg(&nested)
        .arg("install")
        .output()
        .expect("failed to run gpk install");

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(
            stderr.contains("package.json"),
            "error should mention package.json: {stderr}"
        );
    }
}

#[test]
fn test_install_bare_version_dependency_fails() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"name":"app","version":"1.0.0","dependencies":{"legacy":"~1.1.7"}}"#,
    )
    .unwrap();

    let output = gpk()
        .args(["--cwd"])
        .arg(dir.path())
        .arg("install")
        .output()
        .expect("failed to run gpk install");

    assert!(!output.status.success(), "bare version source must fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("legacy"),
        "error should name the dependency: {stderr}"
    );
}

#[test]
fn test_run_unknown_script_fails() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"name":"app","version":"1.0.0"}"#,
    )
    .unwrap();

    let output = gpk()
        .args(["--cwd"])
        .arg(dir.path())
        .args(["run", "nope"])
        .output()
        .expect("failed to run gpk run");
    assert!(!output.status.success());
}

#[cfg(unix)]
#[test]
fn test_run_script_executes() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"name":"app","version":"1.0.0","scripts":{"touchit":"touch ran.txt"}}"#,
    )
    .unwrap();

    let output = gpk()
        .args(["--cwd"])
        .arg(dir.path())
        .args(["run", "touchit"])
        .output()
        .expect("failed to run gpk run");
    assert!(output.status.success());
    assert!(dir.path().join("ran.txt").exists());
}

#[test]
fn test_uninstall_prunes_orphan() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"name":"app","version":"1.0.0","dependencies":{"b":"gh:b#semver:^1.0.0"},"remotes":{"gh":"https://github.com/org"}}"#,
    )
    .unwrap();
    let site = dir.path().join("node_modules/b");
    fs::create_dir_all(&site).unwrap();
    fs::write(
        site.join("package.json"),
        r#"{"name":"b","version":"1.2.0"}"#,
    )
    .unwrap();

    let output = gpk()
        .args(["--cwd"])
        .arg(dir.path())
        .args(["uninstall", "b"])
        .output()
        .expect("failed to run gpk uninstall");
    assert!(output.status.success());
    assert!(!site.exists(), "uninstalled module should be pruned");
}
