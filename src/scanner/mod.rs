//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Concurrent directory scanning with a self-expanding work queue
//! - Streaming BLAKE3 content hashing on a bounded worker pool
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: the directory scanner pool, emitting [`ScanEvent`]s
//! - [`hasher`]: the streaming [`Hasher`] and the hasher pool
//!
//! # Example
//!
//! ```no_run
//! use dupetree::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let digest = hasher.full_hash(Path::new("Cargo.toml")).unwrap();
//! assert_eq!(digest.len(), 64);
//! ```

pub mod hasher;
pub mod walker;

use std::fs::Metadata;
use std::path::{Path, PathBuf};

pub use hasher::{hash_to_hex, HashOutcome, Hasher, HasherPool, CHUNK_SIZE};
pub use walker::{DirectoryScanner, ScanEvent};

/// Upper bound for either worker pool.
///
/// Every active worker may hold one open descriptor, so both pools together
/// must stay well below common `ulimit -n` defaults.
pub const MAX_WORKERS: usize = 256;

/// Default number of workers per pool.
pub const DEFAULT_WORKERS: usize = 16;

/// A regular file discovered during the scan.
///
/// Entries are created by the scanner pool and moved through the pipeline
/// by channel sends; `digest` is assigned exactly once by the hasher pool.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path to the file, as discovered below the scan root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Lowercase hex BLAKE3 digest, present after the hash phase
    pub digest: Option<String>,
    /// Raw metadata captured while listing the parent directory
    pub metadata: Option<Metadata>,
}

impl FileEntry {
    /// Create an entry without captured metadata.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            digest: None,
            metadata: None,
        }
    }

    /// Create an entry from metadata observed by the scanner.
    #[must_use]
    pub fn from_metadata(path: PathBuf, metadata: Metadata) -> Self {
        Self {
            path,
            size: metadata.len(),
            digest: None,
            metadata: Some(metadata),
        }
    }

    /// Attach the content digest, consuming the unhashed entry.
    #[must_use]
    pub fn with_digest(self, digest: String) -> Self {
        debug_assert!(self.digest.is_none(), "digest assigned twice");
        Self {
            digest: Some(digest),
            ..self
        }
    }
}

/// Configuration for the directory scanner pool.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Number of scanner worker threads.
    pub workers: usize,

    /// Follow symbolic links that point at regular files.
    /// Links to directories are never traversed.
    pub follow_symlinks: bool,

    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            follow_symlinks: false,
            min_size: None,
        }
    }
}

impl ScannerConfig {
    /// Set the number of scanner workers, clamped to `1..=MAX_WORKERS`.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(1, MAX_WORKERS);
        self
    }

    /// Enable or disable following symlinks to regular files.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Skip files smaller than `min_size` bytes.
    #[must_use]
    pub fn with_min_size(mut self, min_size: Option<u64>) -> Self {
        self.min_size = min_size;
        self
    }
}

/// Errors that can occur while scanning or hashing a single path.
///
/// Each error is tied to one directory or file; the rest of the tree is
/// unaffected unless strict mode is enabled.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// A directory could not be opened for listing.
    #[error("cannot open directory {path}: {source}")]
    DirectoryOpen {
        /// Directory that failed to open
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Listing a directory, or reading one of its entries, failed.
    #[error("cannot list {path}: {source}")]
    DirectoryRead {
        /// Directory or child entry that failed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A candidate file could not be hashed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ScanError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::DirectoryOpen { path, .. } | Self::DirectoryRead { path, .. } => path,
            Self::Hash(err) => err.path(),
        }
    }

    /// Short machine-readable kind, used in reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectoryOpen { .. } => "directory-open",
            Self::DirectoryRead { .. } => "directory-read",
            Self::Hash(HashError::Open { .. }) => "file-open",
            Self::Hash(HashError::Read { .. }) => "file-read",
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        /// File that failed to open
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading the file content failed part way.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that failed to read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Path of the file that failed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Open { path, .. } | Self::Read { path, .. } => path,
        }
    }
}
