//! Directory scanner pool with a self-expanding work queue.
//!
//! # Overview
//!
//! [`DirectoryScanner::run`] seeds a queue with the root directory and
//! starts a fixed number of worker threads. Each worker pulls a directory,
//! lists it, sends every regular file downstream as a [`ScanEvent::File`],
//! and pushes every subdirectory back onto the same queue.
//!
//! Because the queue feeds itself, its total length is unknown until the
//! end. Completion is detected with an [`OutstandingCounter`]: a
//! subdirectory is counted *before* it is enqueued, and a worker retires
//! its own directory only after every child has been registered.
//!
//! Failures are isolated: a directory that cannot be opened or listed is
//! reported as a [`ScanEvent::Failed`] and its siblings keep going. A worker
//! that panics fires the stop signal, and [`DirectoryScanner::run`] reports
//! it as a [`WorkerPanic`].
//!
//! # Example
//!
//! ```no_run
//! use dupetree::scanner::{DirectoryScanner, ScanEvent, ScannerConfig};
//! use std::path::Path;
//!
//! let (tx, rx) = crossbeam_channel::bounded(100);
//! let consumer = std::thread::spawn(move || rx.iter().count());
//!
//! let scanner = DirectoryScanner::new(ScannerConfig::default());
//! scanner.run(Path::new("."), tx).expect("scanner worker panicked");
//! println!("{} events", consumer.join().unwrap());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{select, Receiver, Sender};

use super::{FileEntry, ScanError, ScannerConfig};
use crate::coordinator::{
    join_all, AbortOnPanic, Completion, OutstandingCounter, StopSignal, WorkerPanic,
};
use crate::progress::ProgressCallback;

/// Message sent from scanner workers to the size indexer.
#[derive(Debug)]
pub enum ScanEvent {
    /// A regular file was discovered.
    File(FileEntry),
    /// A directory or entry could not be read.
    Failed(ScanError),
}

/// Bounded pool of directory-listing workers.
pub struct DirectoryScanner {
    config: ScannerConfig,
    stop: StopSignal,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for DirectoryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryScanner")
            .field("config", &self.config)
            .field("stop", &self.stop)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl DirectoryScanner {
    /// Create a scanner pool with the given configuration.
    #[must_use]
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            config,
            stop: StopSignal::new(),
            progress_callback: None,
        }
    }

    /// Stop early when the given signal fires.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Report each discovered file to a progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Scan `root` and everything below it, sending events to `events`.
    ///
    /// Blocks until the outstanding-directory count reaches zero (or the
    /// stop signal fires), then closes the pool and joins every worker.
    /// `events` is consumed: once this returns, every sender clone has been
    /// dropped and the receiving side sees the channel disconnect.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerPanic`] if any worker thread panicked.
    pub fn run(&self, root: &Path, events: Sender<ScanEvent>) -> Result<Completion, WorkerPanic> {
        let counter = OutstandingCounter::new();
        let discovered = AtomicUsize::new(0);
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded::<PathBuf>();
        // Never carries a message; dropping the sender closes the pool.
        let (close_tx, close_rx) = crossbeam_channel::bounded::<()>(0);

        counter.add(1);
        if queue_tx.send(root.to_path_buf()).is_err() {
            counter.done();
        }

        log::debug!(
            "Scanning {} with {} workers",
            root.display(),
            self.config.workers
        );

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.config.workers);
            for _ in 0..self.config.workers {
                let worker = ScanWorker {
                    scanner: self,
                    counter: &counter,
                    discovered: &discovered,
                    queue: queue_rx.clone(),
                    requeue: queue_tx.clone(),
                    closed: close_rx.clone(),
                    events: events.clone(),
                };
                handles.push(scope.spawn(move || worker.run()));
            }
            drop(events);

            let completion = counter.wait(&self.stop);
            if completion == Completion::Stopped {
                log::debug!(
                    "Scan stopped with {} directories outstanding",
                    counter.pending()
                );
            }
            drop(close_tx);
            join_all(handles)?;
            Ok(completion)
        })
    }
}

/// State borrowed by one scanner worker thread.
struct ScanWorker<'a> {
    scanner: &'a DirectoryScanner,
    counter: &'a OutstandingCounter,
    discovered: &'a AtomicUsize,
    queue: Receiver<PathBuf>,
    requeue: Sender<PathBuf>,
    closed: Receiver<()>,
    events: Sender<ScanEvent>,
}

impl ScanWorker<'_> {
    fn run(self) {
        let _guard = AbortOnPanic::new(&self.scanner.stop);
        loop {
            select! {
                recv(self.queue) -> dir => match dir {
                    Ok(dir) => {
                        if !self.scanner.stop.is_stopped() {
                            self.scan_directory(&dir);
                        }
                        // Only now: every child of `dir` is already counted.
                        self.counter.done();
                    }
                    Err(_) => return,
                },
                recv(self.closed) -> _ => return,
            }
        }
    }

    fn scan_directory(&self, dir: &Path) {
        log::trace!("Listing {}", dir.display());

        let listing = match fs::read_dir(dir) {
            Ok(listing) => listing,
            Err(source) => {
                log::warn!("Cannot open directory {}: {}", dir.display(), source);
                self.emit(ScanEvent::Failed(ScanError::DirectoryOpen {
                    path: dir.to_path_buf(),
                    source,
                }));
                return;
            }
        };

        for child in listing {
            if self.scanner.stop.is_stopped() {
                return;
            }

            let child = match child {
                Ok(child) => child,
                Err(source) => {
                    log::warn!("Cannot list {}: {}", dir.display(), source);
                    self.emit(ScanEvent::Failed(ScanError::DirectoryRead {
                        path: dir.to_path_buf(),
                        source,
                    }));
                    break;
                }
            };

            let path = child.path();
            let file_type = match child.file_type() {
                Ok(file_type) => file_type,
                Err(source) => {
                    self.emit(ScanEvent::Failed(ScanError::DirectoryRead { path, source }));
                    continue;
                }
            };

            if file_type.is_dir() {
                self.counter.add(1);
                if self.requeue.send(path).is_err() {
                    self.counter.done();
                }
                continue;
            }

            let metadata = if file_type.is_symlink() {
                if !self.scanner.config.follow_symlinks {
                    log::trace!("Skipping symlink: {}", path.display());
                    continue;
                }
                match fs::metadata(&path) {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        log::debug!("Skipping dangling symlink {}: {}", path.display(), e);
                        continue;
                    }
                }
            } else {
                match child.metadata() {
                    Ok(metadata) => metadata,
                    Err(source) => {
                        self.emit(ScanEvent::Failed(ScanError::DirectoryRead { path, source }));
                        continue;
                    }
                }
            };

            if !metadata.is_file() {
                log::trace!("Skipping non-regular file: {}", path.display());
                continue;
            }

            if self
                .scanner
                .config
                .min_size
                .is_some_and(|min| metadata.len() < min)
            {
                continue;
            }

            let count = self.discovered.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref callback) = self.scanner.progress_callback {
                callback.on_progress(count, path.to_string_lossy().as_ref());
            }

            self.emit(ScanEvent::File(FileEntry::from_metadata(path, metadata)));
        }
    }

    fn emit(&self, event: ScanEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Scan event receiver dropped, discarding event");
        }
    }
}
