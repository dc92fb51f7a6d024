//! Streaming BLAKE3 hashing and the bounded hasher pool.
//!
//! # Overview
//!
//! [`Hasher`] reads a file in fixed-size chunks into a running BLAKE3
//! state, so memory use does not depend on file size. The file handle is
//! owned by the hashing call and closed on every exit path.
//!
//! [`HasherPool`] runs a fixed number of hashing threads over a job
//! channel. Each thread owns one read buffer for its whole lifetime, which
//! also caps the number of files open for hashing at the pool size. A
//! panicking thread fires the pool's stop signal so the producer stops
//! waiting for results that will never arrive.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use super::{FileEntry, HashError, DEFAULT_WORKERS, MAX_WORKERS};
use crate::coordinator::{join_all, AbortOnPanic, StopSignal, WorkerPanic};
use crate::progress::ProgressCallback;

/// Read chunk size for streaming digests (16 KiB).
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Streaming BLAKE3 file hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher reading [`CHUNK_SIZE`] bytes at a time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: CHUNK_SIZE,
        }
    }

    /// Create a hasher with a custom chunk size (at least one byte).
    #[must_use]
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    /// Chunk size used by [`Hasher::full_hash`].
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Compute the lowercase hex digest of a file's entire content.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Open`] if the file cannot be opened and
    /// [`HashError::Read`] if reading fails part way.
    pub fn full_hash(&self, path: &Path) -> Result<String, HashError> {
        let mut buffer = vec![0u8; self.buffer_size];
        self.hash_with_buffer(path, &mut buffer)
    }

    /// Like [`Hasher::full_hash`], reusing a caller-owned read buffer.
    ///
    /// # Errors
    ///
    /// Same as [`Hasher::full_hash`].
    pub fn hash_with_buffer(&self, path: &Path, buffer: &mut [u8]) -> Result<String, HashError> {
        self.hash_counted(path, buffer).map(|(digest, _)| digest)
    }

    /// Like [`Hasher::hash_with_buffer`], also returning how many bytes
    /// went into the digest.
    ///
    /// # Errors
    ///
    /// Same as [`Hasher::full_hash`].
    pub fn hash_counted(
        &self,
        path: &Path,
        buffer: &mut [u8],
    ) -> Result<(String, u64), HashError> {
        let mut file = File::open(path).map_err(|source| HashError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut state = blake3::Hasher::new();
        let mut hashed = 0u64;
        loop {
            match file.read(buffer) {
                Ok(0) => break,
                Ok(n) => {
                    state.update(&buffer[..n]);
                    hashed += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(HashError::Read {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }

        Ok((hash_to_hex(state.finalize().as_bytes()), hashed))
    }
}

/// Format digest bytes as a lowercase hex string.
#[must_use]
pub fn hash_to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Result of one hash job.
#[derive(Debug)]
pub enum HashOutcome {
    /// The entry, now carrying its digest.
    Hashed(FileEntry),
    /// The file could not be read.
    Failed(HashError),
}

/// Fixed-size pool of hashing threads.
pub struct HasherPool {
    workers: usize,
    hasher: Hasher,
    stop: StopSignal,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
    invocations: AtomicUsize,
}

impl std::fmt::Debug for HasherPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HasherPool")
            .field("workers", &self.workers)
            .field("hasher", &self.hasher)
            .field("stop", &self.stop)
            .field("invocations", &self.invocations)
            .finish_non_exhaustive()
    }
}

impl Default for HasherPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl HasherPool {
    /// Create a pool of `workers` threads, clamped to `1..=MAX_WORKERS`.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.clamp(1, MAX_WORKERS),
            hasher: Hasher::new(),
            stop: StopSignal::new(),
            progress_callback: None,
            invocations: AtomicUsize::new(0),
        }
    }

    /// Use a specific hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Discard remaining jobs once the given signal fires.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Report each hashed file to a progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Number of worker threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// How many files this pool has opened for hashing so far.
    #[must_use]
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Hash every job until `jobs` disconnects, sending one outcome per job.
    ///
    /// Blocks until all workers have exited. `results` is consumed, so the
    /// result channel disconnects once this returns.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerPanic`] if any worker thread panicked.
    pub fn run(
        &self,
        jobs: Receiver<FileEntry>,
        results: Sender<HashOutcome>,
    ) -> Result<(), WorkerPanic> {
        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|_| {
                    let jobs = jobs.clone();
                    let results = results.clone();
                    scope.spawn(move || self.work(&jobs, &results))
                })
                .collect();
            // Only workers hold the channel ends, so senders see a
            // disconnect once every worker is gone.
            drop(jobs);
            drop(results);
            join_all(handles)
        })
    }

    fn work(&self, jobs: &Receiver<FileEntry>, results: &Sender<HashOutcome>) {
        let _guard = AbortOnPanic::new(&self.stop);
        let mut buffer = vec![0u8; self.hasher.buffer_size()];

        for entry in jobs.iter() {
            if self.stop.is_stopped() {
                // Drain without hashing so the producer never blocks.
                continue;
            }

            let count = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(count, entry.path.to_string_lossy().as_ref());
            }

            let outcome = match self.hasher.hash_counted(&entry.path, &mut buffer) {
                Ok((digest, hashed)) => {
                    log::trace!("Hashed {}: {}", entry.path.display(), digest);
                    if hashed != entry.size {
                        log::debug!(
                            "{} changed size since scan ({} -> {} bytes)",
                            entry.path.display(),
                            entry.size,
                            hashed
                        );
                    }
                    if let Some(ref callback) = self.progress_callback {
                        callback.on_item_completed(hashed);
                    }
                    // The group size must describe the bytes behind the digest.
                    let mut entry = entry.with_digest(digest);
                    entry.size = hashed;
                    HashOutcome::Hashed(entry)
                }
                Err(e) => {
                    log::warn!("Hashing failed: {}", e);
                    HashOutcome::Failed(e)
                }
            };

            if results.send(outcome).is_err() {
                log::debug!("Hash result receiver dropped, worker exiting");
                return;
            }
        }
    }
}
