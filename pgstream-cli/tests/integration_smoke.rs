//! Smoke tests for the pgstream binary

use assert_cmd::Command;
use predicates::prelude::*;

fn pgstream() -> Command {
    let mut cmd = Command::cargo_bin("pgstream").unwrap();
    cmd.env_remove("POSTGRES_URI").env_remove("DATABASE_URL");
    cmd
}

#[test]
fn test_serve_help() {
    pgstream()
        .arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database connection string"))
        .stdout(predicate::str::contains("--row-delay-ms"));
}

#[test]
fn test_version() {
    pgstream()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pgstream"));
}

#[test]
fn test_serve_without_database_url_fails() {
    let dir = tempfile::tempdir().unwrap();

    pgstream()
        .current_dir(dir.path())
        .arg("serve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Database URL not set"));
}

#[test]
fn test_unknown_subcommand_fails() {
    pgstream().arg("explode").assert().failure();
}
