//! Command-line interface definitions for dupetree.
//!
//! This module defines all CLI arguments using the clap derive API. Tuning
//! flags are optional so that, when omitted, the value from the config file
//! or environment applies.
//!
//! # Example
//!
//! ```bash
//! # Scan the current directory
//! dupetree
//!
//! # JSON report with more hasher threads
//! dupetree ~/Downloads --output json --hash-workers 32
//!
//! # Ignore small files, fail on the first unreadable path
//! dupetree ~/Pictures --min-size 1MiB --strict
//! ```

use bytesize::ByteSize;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Concurrent duplicate file finder.
///
/// dupetree walks a directory tree with a pool of scanner threads, discards
/// files whose size is unique, and confirms the rest with BLAKE3 content
/// digests. It never modifies the filesystem.
#[derive(Debug, Parser)]
#[command(name = "dupetree")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to scan for duplicates
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print fatal errors as a JSON object on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Number of scanner threads (default: 16)
    #[arg(long, value_name = "N")]
    pub scan_workers: Option<usize>,

    /// Number of hasher threads (default: 16)
    #[arg(long, value_name = "N")]
    pub hash_workers: Option<usize>,

    /// Minimum file size to consider (e.g., 512, 1KB, 1MiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Follow symbolic links to regular files
    ///
    /// Links to directories are never traversed.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Stop at the first unreadable directory or file
    #[arg(long)]
    pub strict: bool,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Path to a TOML configuration file
    ///
    /// If not specified, a default platform-specific path is used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text, one block per group
    Text,
    /// JSON output for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Decimal (`KB`, `MB`) and binary (`KiB`, `MiB`) units are accepted;
/// a bare number is bytes.
///
/// # Examples
///
/// ```
/// use dupetree::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty or not a valid size.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    s.parse::<ByteSize>()
        .map(|size| size.as_u64())
        .map_err(|e| format!("Invalid size '{s}': {e}"))
}
