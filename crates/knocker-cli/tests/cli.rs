//! Command-line behaviour of the `knocker-watch` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn knocker_watch() -> Command {
    let mut cmd = Command::cargo_bin("knocker-watch").expect("binary built");
    cmd.env_remove("KNOCKER_CONFIG").env_remove("KNOCKER_UNIT");
    cmd
}

#[test]
fn help_lists_subcommands() {
    knocker_watch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("service"));
}

#[test]
fn unknown_service_action_is_rejected() {
    knocker_watch()
        .args(["service", "restart"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn missing_config_file_fails() {
    knocker_watch()
        .args(["--config", "/nonexistent/knocker-monitor.json", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn unit_from_environment_is_validated() {
    knocker_watch()
        .env("KNOCKER_UNIT", " ")
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unit cannot be empty"));
}

#[test]
fn unknown_event_kind_filter_is_rejected() {
    knocker_watch()
        .args(["watch", "--kind", "Reboot"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected one of"));
}
