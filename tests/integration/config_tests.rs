use clap::Parser;
use dupetree::cli::Cli;
use dupetree::config::{Config, ConfigError};
use figment::providers::Serialized;
use std::fs;
use tempfile::tempdir;

use crate::{clear_env, env_lock};

#[test]
fn test_config_defaults_through_figment() {
    let figment = figment::Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_load_from_toml() {
    let _lock = env_lock();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
scan_workers = 4
hash_workers = 32
follow_symlinks = true
min_size = 4096
"#;
    fs::write(&config_path, toml_content).unwrap();

    let config = Config::load_from_path(&config_path).unwrap();

    assert_eq!(config.scan_workers, 4);
    assert_eq!(config.hash_workers, 32);
    assert!(config.follow_symlinks);
    assert_eq!(config.min_size, Some(4096));
    assert!(!config.strict);
}

#[test]
fn test_env_overrides_file() {
    let _lock = env_lock();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "hash_workers = 8\nstrict = false\n").unwrap();

    std::env::set_var("DUPETREE_HASH_WORKERS", "12");
    std::env::set_var("DUPETREE_STRICT", "true");
    let config = Config::load(Some(config_path.as_path()));
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.hash_workers, 12);
    assert!(config.strict);
    assert_eq!(config.scan_workers, 16);
}

#[test]
fn test_cli_overrides_env() {
    let _lock = env_lock();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "scan_workers = 2\n").unwrap();

    std::env::set_var("DUPETREE_SCAN_WORKERS", "3");
    let loaded = Config::load(Some(config_path.as_path()));
    clear_env();

    let cli = Cli::try_parse_from(["dupetree", "--scan-workers", "5"]).unwrap();
    let config = loaded.unwrap().apply_cli(&cli);
    assert_eq!(config.scan_workers, 5);
}

#[test]
fn test_invalid_toml_is_error() {
    let _lock = env_lock();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "scan_workers = \"many\"\n").unwrap();

    let result = Config::load_from_path(&config_path);
    assert!(matches!(result, Err(ConfigError::Extract(_))));
}

#[test]
fn test_zero_workers_rejected_by_validate() {
    let _lock = env_lock();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "hash_workers = 0\n").unwrap();

    let config = Config::load_from_path(&config_path).unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidWorkers { field: "hash_workers", value: 0, .. })
    ));
}

#[test]
fn test_missing_explicit_config_is_error() {
    let temp_dir = tempdir().unwrap();
    let result = Config::load(Some(temp_dir.path().join("nope.toml").as_path()));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}
