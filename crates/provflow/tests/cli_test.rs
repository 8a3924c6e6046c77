#![allow(deprecated)] // cargo_bin is deprecated in newer assert_cmd releases

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};

/// Command isolated from any settings file on this machine
fn provflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("provflow").unwrap();
    cmd.current_dir(dir)
        .env_remove("PROVFLOW_CONFIG")
        .env_remove("PROVFLOW_BACKEND")
        .env_remove("PROVFLOW_INTERVAL")
        .env_remove("PROVFLOW_STACK_ID")
        .env_remove("PROVFLOW_TERRAFORM_DIR")
        .env("XDG_CONFIG_HOME", dir)
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("provflow").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Keep applying until the instance exists"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("classify"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("provflow").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("provflow"));
}

#[test]
fn test_apply_help() {
    let mut cmd = Command::cargo_bin("provflow").unwrap();
    cmd.args(["apply", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--interval"))
        .stdout(predicate::str::contains("--backend"))
        .stdout(predicate::str::contains("--report"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("provflow").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

#[test]
fn test_classify_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("apply.log");
    std::fs::write(
        &log,
        "oci_core_instance.free: Creating...\nError: 500-InternalError, Out of host capacity.\n",
    )
    .unwrap();

    provflow(dir.path())
        .arg("classify")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("capacity-exhausted"))
        .stdout(predicate::str::contains("retryable: yes"))
        .stdout(predicate::str::contains("Out of host capacity"));
}

#[test]
fn test_classify_stdin() {
    let dir = tempfile::tempdir().unwrap();

    provflow(dir.path())
        .arg("classify")
        .write_stdin("Error: 401-NotAuthenticated, The required information to complete authentication was not provided.\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth-failure"))
        .stdout(predicate::str::contains("no (fatal)"));
}

#[test]
fn test_classify_missing_file() {
    let dir = tempfile::tempdir().unwrap();

    provflow(dir.path())
        .args(["classify", "does-not-exist.log"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does-not-exist.log"));
}

#[test]
fn test_apply_missing_settings_file() {
    let dir = tempfile::tempdir().unwrap();

    provflow(dir.path())
        .args(["apply", "--config", "missing.yaml"])
        .assert()
        .code(1);
}

#[test]
fn test_apply_job_backend_requires_endpoint() {
    let dir = tempfile::tempdir().unwrap();

    provflow(dir.path())
        .args(["apply", "--backend", "job", "--stack-id", "ocid1.ormstack.test"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("job_api.endpoint"));
}

#[test]
fn test_apply_zero_interval_rejected() {
    let dir = tempfile::tempdir().unwrap();

    provflow(dir.path())
        .args(["apply", "--interval", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("interval"));
}

#[cfg(unix)]
mod apply_with_fake_terraform {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const FAKE_TERRAFORM: &str = r#"#!/bin/sh
case "$1" in
  version) echo "Terraform v1.9.8" ;;
  init) mkdir -p .terraform ;;
  validate) echo "Success!" ;;
  apply)
    if [ -f succeed ]; then
      echo '{"@level":"info","@message":"Apply complete! Resources: 1 added"}'
      exit 0
    fi
    echo '{"@level":"error","@message":"Error: Unsupported argument","diagnostic":{"detail":"An argument named \"shapee\" is not expected here."}}'
    exit 1
    ;;
  output) echo '{"public_ip":{"sensitive":false,"type":"string","value":"203.0.113.9"}}' ;;
esac
"#;

    fn setup(succeed: bool) -> tempfile::TempDir {
        setup_with(FAKE_TERRAFORM, succeed)
    }

    fn setup_with(script: &str, succeed: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("terraform-fake");
        std::fs::write(&bin, script).unwrap();
        let mut perms = std::fs::metadata(&bin).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&bin, perms).unwrap();

        let work = dir.path().join("infra");
        std::fs::create_dir(&work).unwrap();
        if succeed {
            std::fs::write(work.join("succeed"), "").unwrap();
        }

        let settings = format!(
            "terraform:\n  binary: {}\n  config_dir: {}\nconnection:\n  ssh_user: ubuntu\n",
            bin.display(),
            work.display()
        );
        std::fs::write(dir.path().join("provflow.yaml"), settings).unwrap();
        dir
    }

    #[test]
    fn test_apply_success_prints_connection() {
        let dir = setup(true);
        let report = dir.path().join("report.json");

        provflow(dir.path())
            .arg("apply")
            .arg("--report")
            .arg(&report)
            .assert()
            .success()
            .stdout(predicate::str::contains("Provisioned on attempt #1"))
            .stdout(predicate::str::contains("Public address: 203.0.113.9"))
            .stdout(predicate::str::contains("ssh ubuntu@203.0.113.9"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(json["attempt_count"], 1);
        assert_eq!(json["state"], "succeeded");
    }

    #[test]
    fn test_apply_malformed_request_is_fatal() {
        let dir = setup(false);

        provflow(dir.path())
            .arg("apply")
            .assert()
            .code(2)
            .stdout(predicate::str::contains("malformed-request"))
            .stdout(predicate::str::contains("Unsupported argument"));
    }

    #[test]
    fn test_apply_missing_binary_fails_preparation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("provflow.yaml"),
            "terraform:\n  binary: /nonexistent/terraform\n  config_dir: .\n",
        )
        .unwrap();

        provflow(dir.path())
            .arg("apply")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Preparation failed"));
    }

    const SLOW_TERRAFORM: &str = r#"#!/bin/sh
case "$1" in
  version) echo "Terraform v1.9.8" ;;
  init) mkdir -p .terraform ;;
  validate) echo "Success!" ;;
  apply)
    trap 'touch interrupted' INT
    touch started
    sleep 3
    touch finished
    echo "Error: 500-InternalError, Out of host capacity."
    exit 1
    ;;
esac
"#;

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        done()
    }

    #[test]
    fn test_terminal_interrupt_lets_running_apply_finish() {
        use std::os::unix::process::CommandExt;
        use std::process::Stdio;

        let dir = setup_with(SLOW_TERRAFORM, false);
        let work = dir.path().join("infra");

        // provflow leads its own group, like a foreground job in a terminal
        let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_provflow"))
            .arg("apply")
            .current_dir(dir.path())
            .env_remove("PROVFLOW_CONFIG")
            .env_remove("PROVFLOW_BACKEND")
            .env_remove("PROVFLOW_INTERVAL")
            .env_remove("PROVFLOW_STACK_ID")
            .env_remove("PROVFLOW_TERRAFORM_DIR")
            .env("XDG_CONFIG_HOME", dir.path())
            .env("NO_COLOR", "1")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .unwrap();

        assert!(
            wait_until(Duration::from_secs(20), || work.join("started").exists()),
            "apply never started"
        );

        let group = format!("-{}", child.id());
        let sent = std::process::Command::new("kill")
            .args(["-s", "INT", "--", &group])
            .status()
            .unwrap();
        assert!(sent.success());

        let mut status = None;
        let exited = wait_until(Duration::from_secs(20), || {
            status = child.try_wait().unwrap();
            status.is_some()
        });
        if !exited {
            let _ = child.kill();
            panic!("provflow did not stop after the apply finished");
        }

        assert_eq!(status.unwrap().code(), Some(130));
        assert!(work.join("finished").exists());
        assert!(!work.join("interrupted").exists());
    }
}
