//! Size index, candidate selection, and digest aggregation.
//!
//! # Overview
//!
//! Both aggregation maps in the pipeline live here, and each one is owned
//! by exactly one consumer thread for its whole lifetime:
//!
//! - [`SizeIndex`] drains scan events into size buckets. Files with
//!   different sizes cannot be duplicates, so this is the cheap pre-filter.
//! - [`select_candidates`] throws away singleton buckets; only the rest are
//!   ever opened for hashing.
//! - [`HashIndex`] drains hash outcomes into digest groups and produces the
//!   final [`DuplicateGroup`]s. Equal sizes do not imply equal content, so
//!   digest singletons are dropped at this point.
//!
//! # Example
//!
//! ```
//! use dupetree::scanner::FileEntry;
//! use dupetree::duplicates::{select_candidates, SizeIndex};
//! use std::path::PathBuf;
//!
//! let mut index = SizeIndex::new();
//! index.insert(FileEntry::new(PathBuf::from("/a.txt"), 5));
//! index.insert(FileEntry::new(PathBuf::from("/b.txt"), 5));
//! index.insert(FileEntry::new(PathBuf::from("/c.txt"), 6));
//!
//! let (buckets, _failures) = index.into_parts();
//! let selection = select_candidates(buckets);
//!
//! assert_eq!(selection.candidates.len(), 2);
//! assert_eq!(selection.eliminated, 1);
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use crossbeam_channel::Receiver;

use crate::coordinator::{FailurePolicy, OutstandingCounter};
use crate::scanner::{FileEntry, HashOutcome, ScanError, ScanEvent};

/// Files grouped by exact byte length.
pub type SizeBuckets = HashMap<u64, Vec<FileEntry>>;

/// Single-owner index of scanned files by size.
#[derive(Debug, Default)]
pub struct SizeIndex {
    buckets: SizeBuckets,
    failures: Vec<ScanError>,
    total_files: usize,
    total_size: u64,
}

impl SizeIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume scan events until every sender is gone.
    ///
    /// Returns the frozen index. Under [`FailurePolicy::Abort`] the first
    /// failure stops the run, but draining continues so that no scanner
    /// worker blocks on a full channel.
    #[must_use]
    pub fn drain(events: Receiver<ScanEvent>, policy: &FailurePolicy) -> Self {
        let mut index = Self::new();
        for event in events {
            match event {
                ScanEvent::File(entry) => index.insert(entry),
                ScanEvent::Failed(err) => {
                    index.record_failure(err);
                    policy.on_failure();
                }
            }
        }
        index
    }

    /// Add a file to its size bucket.
    pub fn insert(&mut self, entry: FileEntry) {
        self.total_files += 1;
        self.total_size += entry.size;
        self.buckets.entry(entry.size).or_default().push(entry);
    }

    /// Keep a scan failure for the final report.
    pub fn record_failure(&mut self, err: ScanError) {
        self.failures.push(err);
    }

    /// Number of files indexed.
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.total_files
    }

    /// Combined size of every indexed file.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of distinct sizes seen.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Failures recorded so far.
    #[must_use]
    pub fn failures(&self) -> &[ScanError] {
        &self.failures
    }

    /// Split into the size buckets and the recorded failures.
    #[must_use]
    pub fn into_parts(self) -> (SizeBuckets, Vec<ScanError>) {
        (self.buckets, self.failures)
    }
}

/// Hash jobs chosen from a frozen size index.
#[derive(Debug, Default)]
pub struct CandidateSelection {
    /// Every member of every bucket with two or more files
    pub candidates: Vec<FileEntry>,
    /// Files dropped because their size was unique
    pub eliminated: usize,
    /// Number of buckets that contributed candidates
    pub buckets: usize,
}

/// Keep only files whose size is shared with at least one other file.
#[must_use]
pub fn select_candidates(buckets: SizeBuckets) -> CandidateSelection {
    let mut selection = CandidateSelection::default();

    for (size, files) in buckets {
        if files.len() < 2 {
            selection.eliminated += files.len();
            log::trace!("Unique size {} eliminated", size);
            continue;
        }
        log::debug!("Size bucket {} bytes: {} candidates", size, files.len());
        selection.buckets += 1;
        selection.candidates.extend(files);
    }

    selection
}

/// Single-owner index of hashed files by digest.
#[derive(Debug, Default)]
pub struct HashIndex {
    groups: HashMap<String, Vec<FileEntry>>,
    failures: Vec<ScanError>,
    received: usize,
}

impl HashIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume hash outcomes until every sender is gone.
    ///
    /// Each outcome retires one unit on `counter`, whether it succeeded or
    /// not, so the driver's wait ends exactly when the last job is in.
    #[must_use]
    pub fn drain(
        results: Receiver<HashOutcome>,
        counter: &OutstandingCounter,
        policy: &FailurePolicy,
    ) -> Self {
        let mut index = Self::new();
        for outcome in results {
            match outcome {
                HashOutcome::Hashed(entry) => index.insert(entry),
                HashOutcome::Failed(err) => {
                    index.received += 1;
                    index.failures.push(ScanError::Hash(err));
                    policy.on_failure();
                }
            }
            counter.done();
        }
        index
    }

    /// Add a hashed file to its digest group.
    ///
    /// Entries without a digest are ignored.
    pub fn insert(&mut self, entry: FileEntry) {
        self.received += 1;
        match entry.digest.clone() {
            Some(digest) => self.groups.entry(digest).or_default().push(entry),
            None => log::debug!("Ignoring unhashed entry {}", entry.path.display()),
        }
    }

    /// Number of outcomes received, including failures.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Number of distinct digests.
    #[must_use]
    pub fn digest_count(&self) -> usize {
        self.groups.len()
    }

    /// Produce the duplicate groups and the hash failures.
    ///
    /// Only digests shared by two or more files are returned. Groups are
    /// sorted by digest and members by path so reports are reproducible.
    #[must_use]
    pub fn into_duplicate_groups(self) -> (Vec<DuplicateGroup>, Vec<ScanError>) {
        let mut groups: Vec<DuplicateGroup> = self
            .groups
            .into_iter()
            .filter(|(digest, files)| {
                if files.len() < 2 {
                    log::trace!("Digest {} resolved to a single file", digest);
                }
                files.len() >= 2
            })
            .map(|(digest, mut files)| {
                files.sort_by(|a, b| a.path.cmp(&b.path));
                let size = files.first().map_or(0, |f| f.size);
                DuplicateGroup::new(digest, size, files)
            })
            .collect();
        groups.sort_by(|a, b| a.digest.cmp(&b.digest));
        (groups, self.failures)
    }
}

/// Confirmed group of files with identical content.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    /// Lowercase hex BLAKE3 digest shared by every member
    pub digest: String,
    /// File size in bytes
    pub size: u64,
    /// Members of the group (two or more)
    pub files: Vec<FileEntry>,
}

impl DuplicateGroup {
    /// Create a duplicate group.
    #[must_use]
    pub fn new(digest: String, size: u64, files: Vec<FileEntry>) -> Self {
        debug_assert!(files.len() >= 2, "duplicate group needs two members");
        Self {
            digest,
            size,
            files,
        }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of redundant copies (all but one).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Bytes that removing the redundant copies would free.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }

    /// Paths of the members.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}
