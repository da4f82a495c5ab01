//! Configuration resolution tests
//!
//! Tests that manipulate RLM_DATABASE or RLM_CONFIG are marked #[serial]
//! so they never run in parallel.

use rlm_common::config::{load_toml_config, LedgerConfig, CONFIG_ENV, DATABASE_ENV};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_env_database_overrides_config_file() {
    let file = write_config("database_path = \"/from/toml.db\"\n");
    env::set_var(DATABASE_ENV, "/from/env.db");

    let config = LedgerConfig::resolve(None, Some(file.path()));
    assert_eq!(config.database_path, PathBuf::from("/from/env.db"));

    env::remove_var(DATABASE_ENV);
}

#[test]
#[serial]
fn test_cli_database_overrides_env() {
    env::set_var(DATABASE_ENV, "/from/env.db");

    let config = LedgerConfig::resolve(Some(Path::new("/from/cli.db")), None);
    assert_eq!(config.database_path, PathBuf::from("/from/cli.db"));

    env::remove_var(DATABASE_ENV);
}

#[test]
#[serial]
fn test_config_env_points_at_file() {
    env::remove_var(DATABASE_ENV);
    let file = write_config(
        r#"
database_path = "/from/toml.db"
log_level = "debug"
event_bus_capacity = 8
share_tolerance = 0.001
"#,
    );
    env::set_var(CONFIG_ENV, file.path());

    let config = LedgerConfig::resolve(None, None);
    assert_eq!(config.database_path, PathBuf::from("/from/toml.db"));
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.event_bus_capacity, 8);
    assert_eq!(config.share_tolerance, 0.001);

    env::remove_var(CONFIG_ENV);
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    env::remove_var(DATABASE_ENV);
    env::remove_var(CONFIG_ENV);

    let config = LedgerConfig::resolve(None, Some(Path::new("/nonexistent/rlm/config.toml")));
    assert_eq!(config, LedgerConfig::default());
}

#[test]
#[serial]
fn test_malformed_config_file_falls_back_to_defaults() {
    env::remove_var(DATABASE_ENV);
    let file = write_config("database_path = [not toml");

    let config = LedgerConfig::resolve(None, Some(file.path()));
    assert_eq!(config.log_level, "info");
    assert!(load_toml_config(file.path()).is_err());
}

#[test]
fn test_partial_toml_leaves_other_keys_unset() {
    let file = write_config("log_level = \"warn\"\n");
    let toml = load_toml_config(file.path()).unwrap();
    assert_eq!(toml.log_level.as_deref(), Some("warn"));
    assert!(toml.database_path.is_none());
    assert!(toml.share_tolerance.is_none());
}
