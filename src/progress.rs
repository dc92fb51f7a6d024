//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`Progress`] struct which implements
//! [`ProgressCallback`] to draw progress on stderr while the pipeline runs:
//! a spinner counting discovered files during the scan phase, and a bar over
//! the hash jobs during the hash phase.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Phase name reported while the directory tree is scanned.
pub const PHASE_SCAN: &str = "scan";
/// Phase name reported while candidates are hashed.
pub const PHASE_HASH: &str = "hash";

/// Progress callback for the duplicate finding pipeline.
///
/// Callbacks are invoked from worker threads, so implementations must be
/// `Send + Sync` and cheap.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts. `total` is 0 when unknown up front.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Running count of items in this phase (1-based)
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when an item has been hashed, providing its size.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);
}

/// Progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    scan: Mutex<Option<ProgressBar>>,
    hash: Mutex<Option<ProgressBar>>,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    /// Create a progress reporter drawing to stderr.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupetree::progress::Progress;
    ///
    /// let progress = Progress::new();
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
            scan: Mutex::new(None),
            hash: Mutex::new(None),
        }
    }

    /// Create a progress reporter that never draws (useful for tests).
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            scan: Mutex::new(None),
            hash: Mutex::new(None),
        }
    }

    fn scan_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn hash_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn slot(&self, phase: &str) -> Option<&Mutex<Option<ProgressBar>>> {
        match phase {
            PHASE_SCAN => Some(&self.scan),
            PHASE_HASH => Some(&self.hash),
            _ => None,
        }
    }
}

fn lock(slot: &Mutex<Option<ProgressBar>>) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
    slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        let bar = match phase {
            PHASE_SCAN => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::scan_style());
                pb.set_message("Scanning");
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            }
            PHASE_HASH => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::hash_style());
                pb.set_message("Hashing");
                pb
            }
            _ => return,
        };
        if let Some(slot) = self.slot(phase) {
            *lock(slot) = Some(bar);
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        // Whichever phase is active owns the update.
        for slot in [&self.hash, &self.scan] {
            if let Some(ref pb) = *lock(slot) {
                pb.set_position(current as u64);
                pb.set_message(truncate_path(path, 30));
                return;
            }
        }
    }

    fn on_phase_end(&self, phase: &str) {
        let Some(slot) = self.slot(phase) else {
            return;
        };
        if let Some(pb) = lock(slot).take() {
            let message = if phase == PHASE_SCAN {
                "Scan complete"
            } else {
                "Hashing complete"
            };
            pb.finish_with_message(message);
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
