use clap::Parser;
use dupetree::cli::Cli;
use dupetree::duplicates::FinderError;
use dupetree::error::ExitCode;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

use crate::{clear_env, env_lock};

fn run(root: &Path, extra: &[&str]) -> anyhow::Result<ExitCode> {
    let config_dir = TempDir::new().unwrap();
    let config_path = config_dir.path().join("config.toml");
    fs::write(&config_path, "scan_workers = 4\nhash_workers = 4\n").unwrap();

    let mut args = vec![
        "dupetree".to_string(),
        root.to_string_lossy().into_owned(),
        "--quiet".to_string(),
        "--no-progress".to_string(),
        "--config".to_string(),
        config_path.to_string_lossy().into_owned(),
    ];
    args.extend(extra.iter().map(|s| (*s).to_string()));

    let _lock = env_lock();
    clear_env();
    dupetree::run_app(Cli::try_parse_from(args).unwrap())
}

#[test]
fn test_exit_code_duplicates_found() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"same").unwrap();
    fs::write(dir.path().join("b"), b"same").unwrap();

    assert_eq!(run(dir.path(), &[]).unwrap(), ExitCode::Success);
}

#[test]
fn test_exit_code_no_duplicates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"one").unwrap();
    fs::write(dir.path().join("b"), b"two!").unwrap();

    assert_eq!(run(dir.path(), &[]).unwrap(), ExitCode::NoDuplicates);
    assert_eq!(
        run(dir.path(), &["--output", "json"]).unwrap(),
        ExitCode::NoDuplicates
    );
}

#[test]
fn test_missing_root_is_general_error() {
    let dir = tempdir().unwrap();
    let err = run(&dir.path().join("absent"), &[]).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<FinderError>(),
        Some(FinderError::PathNotFound(_))
    ));
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
}

#[test]
fn test_invalid_worker_flag_is_error() {
    let dir = tempdir().unwrap();
    let err = run(dir.path(), &["--hash-workers", "0"]).unwrap_err();
    assert!(err.to_string().contains("hash_workers"));
}

#[cfg(unix)]
#[test]
fn test_exit_code_partial_success() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let locked = dir.path().join("locked");
    fs::write(dir.path().join("a"), b"same").unwrap();
    fs::write(dir.path().join("b"), b"same").unwrap();
    fs::write(&locked, b"lock").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    let readable = fs::File::open(&locked).is_ok();
    let result = if readable {
        None
    } else {
        Some(run(dir.path(), &[]))
    };
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    if let Some(result) = result {
        assert_eq!(result.unwrap(), ExitCode::PartialSuccess);
        // Strict mode turns the same failure into an error.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let strict = run(dir.path(), &["--strict"]);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(ExitCode::for_error(&strict.unwrap_err()), ExitCode::GeneralError);
    }
}
