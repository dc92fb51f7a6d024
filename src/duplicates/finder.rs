//! Duplicate finder that drives the concurrent pipeline.
//!
//! # Overview
//!
//! [`DuplicateFinder::find_duplicates`] runs two phases back to back:
//!
//! 1. **Scan** - the scanner pool walks the tree while the size indexer
//!    drains its events into size buckets.
//! 2. **Hash** - candidates (files sharing a size) are queued to the hasher
//!    pool while the hash aggregator groups outcomes by digest.
//!
//! Each phase has its own [`OutstandingCounter`]; the driver blocks on it
//! reaching zero before closing the phase's channels. A [`StopSignal`]
//! combining Ctrl+C with strict-mode abort cuts either wait short.
//!
//! # Example
//!
//! ```no_run
//! use dupetree::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::new(FinderConfig::default().with_hash_workers(4));
//! let (groups, summary) = finder.find_duplicates(Path::new(".")).unwrap();
//!
//! println!("Found {} duplicate groups", groups.len());
//! println!("Reclaimable space: {}", summary.reclaimable_display());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytesize::ByteSize;

use super::groups::{select_candidates, DuplicateGroup, HashIndex, SizeIndex};
use crate::coordinator::{Completion, FailurePolicy, OutstandingCounter, StopSignal};
use crate::progress::{ProgressCallback, PHASE_HASH, PHASE_SCAN};
use crate::scanner::{
    DirectoryScanner, FileEntry, HasherPool, ScanError, ScannerConfig, DEFAULT_WORKERS,
    MAX_WORKERS,
};

/// Capacity of the file-event, hash-job and hash-result channels.
pub const CHANNEL_CAPACITY: usize = 100;

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Configuration for the scanner pool.
    pub scanner_config: ScannerConfig,
    /// Number of hasher worker threads.
    pub hash_workers: usize,
    /// Abort on the first scan or hash failure.
    pub strict: bool,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("scanner_config", &self.scanner_config)
            .field("hash_workers", &self.hash_workers)
            .field("strict", &self.strict)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            scanner_config: ScannerConfig::default(),
            hash_workers: DEFAULT_WORKERS,
            strict: false,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the number of scanner workers.
    #[must_use]
    pub fn with_scan_workers(mut self, workers: usize) -> Self {
        self.scanner_config = self.scanner_config.with_workers(workers);
        self
    }

    /// Set the number of hasher workers, clamped to `1..=MAX_WORKERS`.
    #[must_use]
    pub fn with_hash_workers(mut self, workers: usize) -> Self {
        self.hash_workers = workers.clamp(1, MAX_WORKERS);
        self
    }

    /// Enable or disable following symlinks to regular files.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.scanner_config = self.scanner_config.with_follow_symlinks(follow);
        self
    }

    /// Set the minimum file size.
    #[must_use]
    pub fn with_min_size(mut self, min_size: Option<u64>) -> Self {
        self.scanner_config = self.scanner_config.with_min_size(min_size);
        self
    }

    /// Enable strict mode.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// Summary statistics from a duplicate scan.
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Total number of regular files discovered
    pub total_files: usize,
    /// Total size of all discovered files in bytes
    pub total_size: u64,
    /// Number of files eliminated by size grouping (unique sizes)
    pub eliminated_by_size: usize,
    /// Number of files opened for hashing
    pub hash_jobs: usize,
    /// Number of confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Total number of duplicate files (excluding one original per group)
    pub duplicate_files: usize,
    /// Total space that can be reclaimed by removing duplicates
    pub reclaimable_space: u64,
    /// Duration of the entire run
    pub scan_duration: Duration,
    /// Isolated failures, scan failures first
    pub failures: Vec<ScanError>,
}

impl ScanSummary {
    /// Format reclaimable space as human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize(self.reclaimable_space).to_string()
    }

    /// Format total size as human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        ByteSize(self.total_size).to_string()
    }

    /// Whether any path could not be scanned or hashed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Errors that end a run without a report.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A pipeline thread panicked.
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),

    /// The first failure of a strict run.
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Duplicate finder that orchestrates the scan and hash phases.
#[derive(Debug)]
pub struct DuplicateFinder {
    config: FinderConfig,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        Self { config }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Configuration this finder runs with.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    fn stop_signal(&self) -> StopSignal {
        match self.config.shutdown_flag {
            Some(ref flag) => StopSignal::new().with_shutdown_flag(Arc::clone(flag)),
            None => StopSignal::new(),
        }
    }

    /// Find all duplicate files below `root`.
    ///
    /// Returns the confirmed groups, sorted by digest with members sorted by
    /// path, along with summary statistics. Unreadable directories and files
    /// are collected in [`ScanSummary::failures`] unless strict mode is on.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if:
    /// - The path does not exist or is not a directory
    /// - The run is interrupted by the shutdown flag
    /// - Strict mode is on and any path fails
    pub fn find_duplicates(
        &self,
        root: &Path,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let start_time = Instant::now();

        if !root.exists() {
            return Err(FinderError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(FinderError::NotADirectory(root.to_path_buf()));
        }

        let stop = self.stop_signal();
        if stop.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }
        let policy = FailurePolicy::for_run(self.config.strict, &stop);

        log::info!("Starting duplicate scan of {}", root.display());
        let index = self.scan_phase(root, &stop, &policy)?;

        self.hash_phase(index, &stop, &policy, start_time)
    }

    /// Run the candidate and hash phases over files that were collected
    /// elsewhere, skipping the directory scan.
    ///
    /// # Errors
    ///
    /// Same as [`DuplicateFinder::find_duplicates`], minus the path checks.
    pub fn find_duplicates_from_files(
        &self,
        files: Vec<FileEntry>,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let start_time = Instant::now();
        let stop = self.stop_signal();
        if stop.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }
        let policy = FailurePolicy::for_run(self.config.strict, &stop);

        let mut index = SizeIndex::new();
        for file in files {
            index.insert(file);
        }

        self.hash_phase(index, &stop, &policy, start_time)
    }

    fn scan_phase(
        &self,
        root: &Path,
        stop: &StopSignal,
        policy: &FailurePolicy,
    ) -> Result<SizeIndex, FinderError> {
        let callback = self.config.progress_callback.as_ref();
        if let Some(callback) = callback {
            callback.on_phase_start(PHASE_SCAN, 0);
        }

        let mut scanner = DirectoryScanner::new(self.config.scanner_config.clone())
            .with_stop_signal(stop.clone());
        if let Some(callback) = callback {
            scanner = scanner.with_progress_callback(Arc::clone(callback));
        }

        let (event_tx, event_rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
        let (index, completion) = thread::scope(|scope| {
            let indexer = scope.spawn(move || SizeIndex::drain(event_rx, policy));
            let completion = scanner.run(root, event_tx);
            let index = indexer
                .join()
                .map_err(|_| FinderError::WorkerPanicked("size indexer"))?;
            let completion =
                completion.map_err(|_| FinderError::WorkerPanicked("scanner pool"))?;
            Ok::<_, FinderError>((index, completion))
        })?;

        if let Some(callback) = callback {
            callback.on_phase_end(PHASE_SCAN);
        }

        log::info!(
            "Scan {}: {} files ({}) in {} size buckets, {} failures",
            match completion {
                Completion::Drained => "complete",
                Completion::Stopped => "stopped",
            },
            index.total_files(),
            ByteSize(index.total_size()),
            index.bucket_count(),
            index.failures().len()
        );

        Ok(index)
    }

    fn hash_phase(
        &self,
        index: SizeIndex,
        stop: &StopSignal,
        policy: &FailurePolicy,
        start_time: Instant,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let mut summary = ScanSummary {
            total_files: index.total_files(),
            total_size: index.total_size(),
            ..ScanSummary::default()
        };

        let (buckets, mut failures) = index.into_parts();
        check_stopped(stop, &mut failures)?;

        let selection = select_candidates(buckets);
        summary.eliminated_by_size = selection.eliminated;

        log::info!(
            "Hashing {} candidates from {} size buckets ({} eliminated by size)",
            selection.candidates.len(),
            selection.buckets,
            selection.eliminated
        );

        let callback = self.config.progress_callback.as_ref();
        if let Some(callback) = callback {
            callback.on_phase_start(PHASE_HASH, selection.candidates.len());
        }

        let mut pool = HasherPool::new(self.config.hash_workers).with_stop_signal(stop.clone());
        if let Some(callback) = callback {
            pool = pool.with_progress_callback(Arc::clone(callback));
        }

        let counter = OutstandingCounter::new();
        let (job_tx, job_rx) = crossbeam_channel::bounded::<FileEntry>(CHANNEL_CAPACITY);
        let (result_tx, result_rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);

        let hash_index = thread::scope(|scope| {
            let counter = &counter;
            let pool = &pool;
            let aggregator = scope.spawn(move || HashIndex::drain(result_rx, counter, policy));
            let workers = scope.spawn(move || pool.run(job_rx, result_tx));

            for entry in selection.candidates {
                if stop.is_stopped() {
                    break;
                }
                counter.add(1);
                if job_tx.send(entry).is_err() {
                    counter.done();
                    break;
                }
            }

            if counter.wait(stop) == Completion::Stopped {
                log::debug!(
                    "Hashing stopped with {} jobs outstanding",
                    counter.pending()
                );
            }
            // Closing the job channel lets the pool leave its consume loop.
            drop(job_tx);

            workers
                .join()
                .map_err(|_| FinderError::WorkerPanicked("hasher pool"))?
                .map_err(|_| FinderError::WorkerPanicked("hasher pool"))?;
            aggregator
                .join()
                .map_err(|_| FinderError::WorkerPanicked("hash aggregator"))
        })?;

        if let Some(callback) = callback {
            callback.on_phase_end(PHASE_HASH);
        }

        summary.hash_jobs = pool.invocations();
        log::debug!(
            "Aggregated {} hash outcomes into {} distinct digests",
            hash_index.received(),
            hash_index.digest_count()
        );
        let (groups, hash_failures) = hash_index.into_duplicate_groups();

        failures.extend(hash_failures);
        check_stopped(stop, &mut failures)?;

        summary.duplicate_groups = groups.len();
        summary.duplicate_files = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        summary.reclaimable_space = groups.iter().map(DuplicateGroup::wasted_space).sum();
        summary.failures = failures;
        summary.scan_duration = start_time.elapsed();

        log::info!(
            "Found {} duplicate groups ({} duplicate files, {} reclaimable) in {:.2?}",
            summary.duplicate_groups,
            summary.duplicate_files,
            summary.reclaimable_display(),
            summary.scan_duration
        );

        Ok((groups, summary))
    }
}

/// Turn a fired stop signal into the error that ends the run.
///
/// A strict-mode abort surfaces the first recorded failure.
fn check_stopped(stop: &StopSignal, failures: &mut Vec<ScanError>) -> Result<(), FinderError> {
    if stop.is_shutdown_requested() {
        log::info!("Shutdown requested, abandoning run");
        return Err(FinderError::Interrupted);
    }
    if stop.is_aborted() {
        if failures.is_empty() {
            return Err(FinderError::Interrupted);
        }
        return Err(FinderError::Scan(failures.swap_remove(0)));
    }
    Ok(())
}
