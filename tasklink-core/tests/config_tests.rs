//! Config load errors, init idempotence and on-disk layout.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use std::fs;
use tasklink_core::{config, ConfigError, Options};

#[test]
fn load_missing_config_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".tasklink");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), b"interval_secs: [unclosed").expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn zero_interval_is_rejected() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".tasklink/config.yaml")
        .write_str("interval_secs: 0\n")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "interval_secs", .. }), "got: {err}");
}

#[test]
fn partial_document_fills_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".tasklink/config.yaml")
        .write_str(
            "gemini:\n  url: https://gemini.example.com\n  task_creation:\n    enabled: true\n    creation_type: Bug\n    creation_status: Assigned\n    creation_severity: Normal\nexcluded_users: [build]\n",
        )
        .expect("write");

    let options = config::load_at(home.path()).expect("load");
    assert_eq!(options.interval_secs, 60);
    assert_eq!(options.gemini.url, "https://gemini.example.com");
    assert_eq!(
        options.gemini.task_creation.selectors(),
        Some(("Bug", "Assigned", "Normal"))
    );
    assert!(options.gemini.feature_creation.selectors().is_none());
    assert!(options.is_user_excluded("build"));
    assert!(!options.is_project_excluded("build"));
}

#[test]
fn init_writes_once_and_keeps_existing() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let first = Options { interval_secs: 30, ..Options::default() };
    config::init_at(home.path(), &first).expect("init");

    home.child(".tasklink/config.yaml")
        .assert(predicate::path::exists())
        .assert(predicate::str::contains("interval_secs: 30"));

    let second = Options { interval_secs: 90, ..Options::default() };
    let kept = config::init_at(home.path(), &second).expect("init again");
    assert_eq!(kept.interval_secs, 30);
}

#[test]
fn save_then_load_preserves_options() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut options = Options::default();
    options.gemini.project_creation.enabled = true;
    options.gemini.project_creation.template = Some("Template".into());
    options.excluded_projects.push("Sandbox".into());
    config::save_at(home.path(), &options).expect("save");

    assert_eq!(config::load_at(home.path()).expect("load"), options);
}
