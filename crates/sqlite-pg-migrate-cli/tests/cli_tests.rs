//! CLI integration tests for sqlite-pg-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! configuration errors, and exit codes. None of them need a running
//! PostgreSQL server.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;

const ENV_VARS: &[&str] = &[
    "SQLITE_PATH",
    "DB_HOST",
    "DB_PORT",
    "DB_NAME",
    "DB_USER",
    "DB_PASSWORD",
    "DB_SCHEMA",
    "DB_SSL_MODE",
    "BATCH_SIZE",
    "LOG_FILE",
];

/// Get a command for the sqlite-pg-migrate binary with a clean environment.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("sqlite-pg-migrate").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Command with a complete target configuration, running inside `dir`.
fn configured_cmd(dir: &Path) -> Command {
    let mut cmd = cmd();
    cmd.current_dir(dir)
        .env("DB_HOST", "127.0.0.1")
        .env("DB_NAME", "movies_database")
        .env("DB_USER", "app")
        .env("DB_PASSWORD", "secret")
        .env("LOG_FILE", dir.join("load_data.log"));
    cmd
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--target-schema"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sqlite-pg-migrate"));
}

#[test]
fn test_log_defaults_in_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_unknown_subcommand_fails() {
    cmd().arg("resume").assert().failure();
}

// =============================================================================
// Configuration Error Tests
// =============================================================================

#[test]
fn test_missing_database_name_exits_with_config_error() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .env("DB_USER", "app")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"))
        .stderr(predicate::str::contains("DB_NAME"));
}

#[test]
fn test_missing_config_file() {
    cmd()
        .args(["--config", "/nonexistent/path/config.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "target: [this is not: valid yaml").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("YAML error"));
}

#[test]
fn test_invalid_port_in_environment() {
    let dir = tempfile::tempdir().unwrap();
    configured_cmd(dir.path())
        .env("DB_PORT", "not-a-port")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DB_PORT"));
}

#[test]
fn test_invalid_ssl_mode() {
    let dir = tempfile::tempdir().unwrap();
    configured_cmd(dir.path())
        .env("DB_SSL_MODE", "sometimes")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid ssl_mode"));
}

#[test]
fn test_zero_batch_size_rejected() {
    let dir = tempfile::tempdir().unwrap();
    configured_cmd(dir.path())
        .args(["run", "--batch-size", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("batch_size"));
}

#[test]
fn test_non_numeric_batch_size_rejected_by_parser() {
    cmd()
        .args(["run", "--batch-size", "many"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_batch_size_flag_overrides_invalid_environment_value() {
    let dir = tempfile::tempdir().unwrap();
    configured_cmd(dir.path())
        .env("BATCH_SIZE", "0")
        .env("SQLITE_PATH", dir.path().join("absent.sqlite"))
        .args(["run", "--batch-size", "10"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("opening SQLite source"))
        .stderr(predicate::str::contains("batch_size").not());
}

#[test]
fn test_invalid_environment_batch_size_rejected_without_flag() {
    let dir = tempfile::tempdir().unwrap();
    configured_cmd(dir.path())
        .env("BATCH_SIZE", "0")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("batch_size"));
}

// =============================================================================
// Connection Error Tests
// =============================================================================

#[test]
fn test_missing_sqlite_file_exits_before_touching_target() {
    let dir = tempfile::tempdir().unwrap();
    configured_cmd(dir.path())
        .env("SQLITE_PATH", dir.path().join("absent.sqlite"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("absent.sqlite"))
        .stderr(predicate::str::contains("opening SQLite source"));

    // The source is opened read-only and is never created.
    assert!(!dir.path().join("absent.sqlite").exists());
}

#[test]
fn test_log_file_is_created() {
    let dir = tempfile::tempdir().unwrap();
    configured_cmd(dir.path())
        .env("SQLITE_PATH", dir.path().join("absent.sqlite"))
        .assert()
        .code(1);

    assert!(dir.path().join("load_data.log").exists());
}

#[test]
fn test_yaml_file_with_env_override() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        "source:\n  path: from-file.sqlite\ntarget:\n  database: movies\n  user: app\n",
    )
    .unwrap();

    cmd()
        .current_dir(dir.path())
        .env("SQLITE_PATH", dir.path().join("from-env.sqlite"))
        .env("LOG_FILE", dir.path().join("load_data.log"))
        .args(["--config", config_path.to_str().unwrap(), "run"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("from-env.sqlite"))
        .stderr(predicate::str::contains("from-env.sqlite"));
}
