//! JSON output formatter for duplicate scan results.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "digest": "ea8f16...",
//!       "size": 5,
//!       "files": ["/tree/a.txt", "/tree/b.txt"]
//!     }
//!   ],
//!   "failures": [
//!     { "kind": "file-open", "path": "/tree/locked", "error": "Permission denied (os error 13)" }
//!   ],
//!   "summary": {
//!     "total_files": 3,
//!     "total_size": 16,
//!     "eliminated_by_size": 1,
//!     "hash_jobs": 2,
//!     "duplicate_groups": 1,
//!     "duplicate_files": 1,
//!     "reclaimable_space": 5,
//!     "scan_duration_ms": 3,
//!     "exit_code": 3,
//!     "exit_code_name": "DT003"
//!   }
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::duplicates::{DuplicateGroup, ScanSummary};
use crate::error::ExitCode;
use crate::scanner::ScanError;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// BLAKE3 digest as lowercase hex (64 characters)
    pub digest: String,
    /// File size in bytes
    pub size: u64,
    /// Member paths, sorted
    pub files: Vec<String>,
}

impl From<&DuplicateGroup> for JsonDuplicateGroup {
    fn from(group: &DuplicateGroup) -> Self {
        Self {
            digest: group.digest.clone(),
            size: group.size,
            files: group
                .files
                .iter()
                .map(|f| f.path.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// A path that could not be scanned or hashed.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFailure {
    /// Failure kind, e.g. `directory-open` or `file-read`
    pub kind: &'static str,
    /// Path the failure refers to
    pub path: String,
    /// Underlying error message
    pub error: String,
}

impl From<&ScanError> for JsonFailure {
    fn from(err: &ScanError) -> Self {
        Self {
            kind: err.kind(),
            path: err.path().to_string_lossy().into_owned(),
            error: std::error::Error::source(err)
                .map_or_else(|| err.to_string(), ToString::to_string),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Total number of regular files discovered
    pub total_files: usize,
    /// Total size of all discovered files in bytes
    pub total_size: u64,
    /// Number of files eliminated by size grouping
    pub eliminated_by_size: usize,
    /// Number of files opened for hashing
    pub hash_jobs: usize,
    /// Number of confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Total number of duplicate files (excluding originals)
    pub duplicate_files: usize,
    /// Total space that can be reclaimed by removing duplicates (bytes)
    pub reclaimable_space: u64,
    /// Duration of the run in milliseconds
    pub scan_duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DT000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from a ScanSummary and an exit code.
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            total_files: summary.total_files,
            total_size: summary.total_size,
            eliminated_by_size: summary.eliminated_by_size,
            hash_jobs: summary.hash_jobs,
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            reclaimable_space: summary.reclaimable_space,
            scan_duration_ms: u64::try_from(summary.scan_duration.as_millis()).unwrap_or(u64::MAX),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Confirmed duplicate groups
    pub groups: Vec<JsonDuplicateGroup>,
    /// Paths that could not be read
    pub failures: Vec<JsonFailure>,
    /// Scan summary statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Create a new JSON output from duplicate groups, summary and exit code.
    ///
    /// # Example
    ///
    /// ```
    /// use dupetree::duplicates::ScanSummary;
    /// use dupetree::error::ExitCode;
    /// use dupetree::output::JsonOutput;
    ///
    /// let output = JsonOutput::new(&[], &ScanSummary::default(), ExitCode::NoDuplicates);
    /// assert!(output.groups.is_empty());
    /// assert_eq!(output.summary.exit_code, 2);
    /// ```
    #[must_use]
    pub fn new(groups: &[DuplicateGroup], summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            groups: groups.iter().map(JsonDuplicateGroup::from).collect(),
            failures: summary.failures.iter().map(JsonFailure::from).collect(),
            summary: JsonSummary::from_scan_summary(summary, exit_code),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
