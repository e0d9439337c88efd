//! Config file discovery, parse-error messages, and override integration tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use procdeploy_core::{ConfigError, DeployConfig, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// 1. Discovery
// ---------------------------------------------------------------------------

#[test]
fn missing_file_yields_defaults() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let config = DeployConfig::discover_at(dir.path()).expect("discover");
    assert_eq!(config, DeployConfig::default());
    dir.child(DEFAULT_CONFIG_FILE).assert(predicate::path::missing());
}

#[test]
fn empty_file_yields_defaults() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child(DEFAULT_CONFIG_FILE).write_str("\n").expect("write");
    let config = DeployConfig::discover_at(dir.path()).expect("discover");
    assert_eq!(config, DeployConfig::default());
}

#[test]
fn partial_file_keeps_other_defaults() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child(DEFAULT_CONFIG_FILE)
        .write_str("scripts_dir: db/procs\nretry:\n  max_attempts: 3\n")
        .expect("write");

    let config = DeployConfig::discover_at(dir.path()).expect("discover");
    assert_eq!(config.scripts_dir, PathBuf::from("db/procs"));
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.delay_secs, 5, "unset retry field keeps default");
    assert_eq!(config.extension, "sql");
    assert_eq!(config.batch_separator, "GO");
}

// ---------------------------------------------------------------------------
// 2. Error messages
// ---------------------------------------------------------------------------

#[test]
fn unknown_key_is_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child(DEFAULT_CONFIG_FILE)
        .write_str("scripts_dir: procs\ndry_run: true\n")
        .expect("write");

    let err = DeployConfig::discover_at(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains(DEFAULT_CONFIG_FILE), "path missing from: {msg}");
    assert!(msg.contains("dry_run"), "offending key missing from: {msg}");
}

#[test]
fn invalid_table_name_rejected_on_load() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("custom.yaml");
    file.write_str("metadata_table: \"meta; drop table users\"\n")
        .expect("write");

    let err = DeployConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");
    assert!(err.to_string().contains("metadata_table"));
}

#[test]
fn explicit_missing_file_is_io_error() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = DeployConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("nope.yaml"));
}
