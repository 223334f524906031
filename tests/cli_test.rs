//! Integration tests for the bootkit binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_project(plan: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("bootkit.yml"), plan).unwrap();
    temp
}

fn bootkit(temp: &TempDir) -> Command {
    let mut cmd = Command::new(cargo_bin("bootkit"));
    cmd.current_dir(temp.path()).env_remove("BOOTKIT_PLAN");
    cmd
}

const SIMPLE_PLAN: &str = r#"
app_name: Test
steps:
  - name: hello
    command: echo hello
"#;

#[test]
fn cli_no_args_runs_plan() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SIMPLE_PLAN);
    bootkit(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("Bootstrap complete"));
    Ok(())
}

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("bootkit"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Dependency-ordered"))
        .stdout(predicate::str::contains("lint"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("bootkit"));
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_unknown_subcommand_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("bootkit"));
    cmd.arg("deploy");
    cmd.assert().failure();
    Ok(())
}

#[test]
fn cli_missing_plan_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    bootkit(&temp)
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No plan found"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_run_honors_dependencies() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"
steps:
  - name: root
    command: echo root >> order.txt
    depends_on: [a, b, c]
  - name: a
    command: echo a >> order.txt
  - name: b
    command: echo b >> order.txt
  - name: c
    command: echo c >> order.txt
"#,
    );

    bootkit(&temp).args(["run", "--quiet"]).assert().success();

    let order = fs::read_to_string(temp.path().join("order.txt"))?;
    assert_eq!(order, "a\nb\nc\nroot\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_failing_step_stops_run() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"
steps:
  - name: broken
    command: exit 3
  - name: after
    command: touch after.txt
    depends_on: [broken]
"#,
    );

    bootkit(&temp)
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("broken"));
    assert!(!temp.path().join("after.txt").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_retries_flaky_command() -> Result<(), Box<dyn std::error::Error>> {
    // Fails until the marker exists, creating it on the first call.
    let temp = setup_project(
        r#"
steps:
  - name: flaky
    command: "test -f marker || { touch marker; exit 1; }"
    retry:
      count: 2
      initial_delay: 10ms
      backoff: constant
      jitter: false
"#,
    );

    bootkit(&temp).args(["run", "--quiet"]).assert().success();
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_no_retry_gives_one_attempt() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"
steps:
  - name: flaky
    command: "test -f marker || { touch marker; exit 1; }"
    retry:
      count: 2
      initial_delay: 10ms
"#,
    );

    bootkit(&temp).args(["run", "--no-retry"]).assert().code(1);
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_run_json_report() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SIMPLE_PLAN);
    let output = bootkit(&temp).args(["run", "--json"]).output()?;
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["steps"][0]["name"], "hello");
    assert_eq!(report["steps"][0]["attempts"], 1);
    Ok(())
}

#[test]
fn cli_list_json_is_in_execution_order() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"
steps:
  - name: migrate
    command: bin/migrate
    depends_on: [deps]
  - name: deps
    description: Install dependencies
    command: bin/deps
"#,
    );

    let output = bootkit(&temp).args(["list", "--json"]).output()?;
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(rows[0]["name"], "deps");
    assert_eq!(rows[0]["description"], "Install dependencies");
    assert_eq!(rows[1]["name"], "migrate");
    assert_eq!(rows[1]["depends_on"][0], "deps");
    Ok(())
}

#[test]
fn cli_lint_accepts_valid_plan() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SIMPLE_PLAN);
    bootkit(&temp)
        .arg("lint")
        .assert()
        .success()
        .stdout(predicate::str::contains("Plan is valid"));
    Ok(())
}

#[test]
fn cli_lint_reports_cycle() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"
steps:
  - name: a
    command: "true"
    depends_on: [b]
  - name: b
    command: "true"
    depends_on: [a]
"#,
    );

    bootkit(&temp)
        .arg("lint")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("circular-dependency"));
    Ok(())
}

#[test]
fn cli_plan_flag_overrides_discovery() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let plan = temp.path().join("custom.yml");
    fs::write(&plan, SIMPLE_PLAN)?;

    bootkit(&temp)
        .args(["lint", "--plan"])
        .arg(&plan)
        .assert()
        .success();
    Ok(())
}

#[test]
fn cli_completions_bash() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("bootkit"));
    cmd.args(["completions", "bash"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("bootkit"));
    Ok(())
}
