//! Completion detection for work whose total size is only known at the end.
//!
//! A directory scan discovers its own work: every listed directory may add
//! more directories to the queue. [`OutstandingCounter`] tracks units that
//! have been handed off but not finished, and lets the driving thread block
//! until that number reaches zero.
//!
//! # Protocol
//!
//! - Call [`OutstandingCounter::add`] *before* a unit becomes visible to a
//!   worker (before the channel send).
//! - Call [`OutstandingCounter::done`] only after the unit is fully
//!   processed, including registering every child it discovered.
//!
//! Breaking either rule lets the count touch zero while subtrees are still
//! undiscovered, and the scan would end early.
//!
//! # Design Notes
//!
//! Mutex + Condvar rather than a bare atomic: the waiting thread blocks
//! without spinning, and wakeups cannot be lost between the check and the
//! wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// How often a blocked waiter re-checks the stop signal.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of waiting for outstanding work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every registered unit finished.
    Drained,
    /// The stop signal fired first; some units may still be pending.
    Stopped,
}

/// Counter of in-flight work units with a blocking wait for zero.
#[derive(Debug, Default)]
pub struct OutstandingCounter {
    pending: Mutex<usize>,
    drained: Condvar,
}

impl OutstandingCounter {
    /// Create a counter with no outstanding units.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the count, recovering from poisoning.
    ///
    /// A worker that panicked mid-unit must not wedge the coordinator; the
    /// count itself is always left consistent.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register `n` units as handed off.
    pub fn add(&self, n: usize) {
        *self.lock() += n;
    }

    /// Retire one unit. Wakes waiters when the count reaches zero.
    pub fn done(&self) {
        let mut pending = self.lock();
        debug_assert!(*pending > 0, "done() without matching add()");
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }

    /// Snapshot of the outstanding count.
    #[must_use]
    pub fn pending(&self) -> usize {
        *self.lock()
    }

    /// Block until the count reaches zero or `stop` fires.
    pub fn wait(&self, stop: &StopSignal) -> Completion {
        let mut pending = self.lock();
        loop {
            if *pending == 0 {
                return Completion::Drained;
            }
            if stop.is_stopped() {
                return Completion::Stopped;
            }
            pending = match self.drained.wait_timeout(pending, STOP_POLL_INTERVAL) {
                Ok((guard, _)) => guard,
                Err(poison) => poison.into_inner().0,
            };
        }
    }
}

/// Cooperative cancellation shared by every stage of a run.
///
/// Combines the user's shutdown flag (Ctrl+C) with an internal abort flag
/// raised by strict mode on the first failure.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    shutdown: Option<Arc<AtomicBool>>,
    abort: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a signal that only fires on [`StopSignal::abort`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also fire when the given shutdown flag is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// Request that every stage stop as soon as possible.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Whether the run was aborted internally.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Whether the user requested shutdown.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Whether any stage should stop.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.is_aborted() || self.is_shutdown_requested()
    }
}

/// Fires a [`StopSignal`] if dropped while its thread is unwinding.
///
/// Pool workers hold one for their whole lifetime. A worker that panics
/// leaves its unit unfinished, so the counter alone would never reach zero;
/// the abort ends the driver's wait instead.
#[derive(Debug)]
pub struct AbortOnPanic<'a> {
    stop: &'a StopSignal,
}

impl<'a> AbortOnPanic<'a> {
    /// Guard the current thread with `stop`.
    #[must_use]
    pub fn new(stop: &'a StopSignal) -> Self {
        Self { stop }
    }
}

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("Worker thread panicked, stopping the run");
            self.stop.abort();
        }
    }
}

/// One or more threads of a pool panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0} worker thread(s) panicked")]
pub struct WorkerPanic(pub usize);

/// Join every handle, counting the ones that panicked.
///
/// # Errors
///
/// Returns [`WorkerPanic`] if any thread panicked.
pub fn join_all<T>(handles: Vec<thread::ScopedJoinHandle<'_, T>>) -> Result<(), WorkerPanic> {
    let panicked = handles
        .into_iter()
        .map(thread::ScopedJoinHandle::join)
        .filter(Result::is_err)
        .count();
    if panicked == 0 {
        Ok(())
    } else {
        Err(WorkerPanic(panicked))
    }
}

/// What an aggregator does when it receives a failure.
#[derive(Debug, Clone, Default)]
pub enum FailurePolicy {
    /// Record the failure and keep going.
    #[default]
    Isolate,
    /// Record the failure and stop the whole run.
    Abort(StopSignal),
}

impl FailurePolicy {
    /// Build the policy for a run: strict runs abort through `stop`.
    #[must_use]
    pub fn for_run(strict: bool, stop: &StopSignal) -> Self {
        if strict {
            Self::Abort(stop.clone())
        } else {
            Self::Isolate
        }
    }

    /// Apply the policy after a failure has been recorded.
    pub fn on_failure(&self) {
        if let Self::Abort(stop) = self {
            stop.abort();
        }
    }
}
