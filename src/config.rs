//! Application configuration management.
//!
//! Settings are layered with figment, lowest precedence first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file (`--config PATH`, else `config.toml` in the platform
//!    config directory, if it exists)
//! 3. Environment variables prefixed `DUPETREE_` (e.g. `DUPETREE_HASH_WORKERS`)
//! 4. CLI flags ([`Config::apply_cli`])
//!
//! # Example
//!
//! ```toml
//! scan_workers = 8
//! hash_workers = 32
//! follow_symlinks = false
//! min_size = 4096
//! strict = false
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::duplicates::FinderConfig;
use crate::scanner::{DEFAULT_WORKERS, MAX_WORKERS};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "DUPETREE_";

/// Errors that can occur while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed into [`Config`].
    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// A pool size is outside `1..=MAX_WORKERS`.
    #[error("{field} must be between 1 and {max}, got {value}")]
    InvalidWorkers {
        /// Name of the offending setting
        field: &'static str,
        /// Value that was rejected
        value: usize,
        /// Upper bound
        max: usize,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of scanner threads.
    pub scan_workers: usize,
    /// Number of hasher threads.
    pub hash_workers: usize,
    /// Follow symbolic links to regular files.
    pub follow_symlinks: bool,
    /// Minimum file size in bytes.
    pub min_size: Option<u64>,
    /// Abort on the first unreadable path.
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_workers: DEFAULT_WORKERS,
            hash_workers: DEFAULT_WORKERS,
            follow_symlinks: false,
            min_size: None,
            strict: false,
        }
    }
}

impl Config {
    /// Build the defaults < file < environment stack.
    ///
    /// A missing file contributes nothing.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load configuration from `path`, or from the default location.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if an explicit `path` does not
    /// exist, and [`ConfigError::Extract`] if any layer is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => {
                let default = Self::default_path();
                if let Some(ref path) = default {
                    log::debug!("Looking for config at {}", path.display());
                }
                Self::extract(Self::figment(default.as_deref()))
            }
        }
    }

    /// Load configuration from an explicit TOML file.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        log::debug!("Loading config from {}", path.display());
        Self::extract(Self::figment(Some(path)))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(|e| ConfigError::Extract(Box::new(e)))
    }

    /// Get the default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dupetree", "dupetree")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply CLI flags, which take precedence over every other layer.
    #[must_use]
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(workers) = cli.scan_workers {
            self.scan_workers = workers;
        }
        if let Some(workers) = cli.hash_workers {
            self.hash_workers = workers;
        }
        if cli.min_size.is_some() {
            self.min_size = cli.min_size;
        }
        self.follow_symlinks |= cli.follow_symlinks;
        self.strict |= cli.strict;
        self
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWorkers`] for a pool size of zero or
    /// above [`MAX_WORKERS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("scan_workers", self.scan_workers),
            ("hash_workers", self.hash_workers),
        ] {
            if value == 0 || value > MAX_WORKERS {
                return Err(ConfigError::InvalidWorkers {
                    field,
                    value,
                    max: MAX_WORKERS,
                });
            }
        }
        Ok(())
    }

    /// Finder configuration carrying these settings.
    #[must_use]
    pub fn finder_config(&self) -> FinderConfig {
        FinderConfig::default()
            .with_scan_workers(self.scan_workers)
            .with_hash_workers(self.hash_workers)
            .with_follow_symlinks(self.follow_symlinks)
            .with_min_size(self.min_size)
            .with_strict(self.strict)
    }
}
