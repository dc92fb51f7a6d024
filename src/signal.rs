//! Ctrl+C handling for graceful shutdown.
//!
//! The handler sets a shared `AtomicBool`. The finder wraps that flag in its
//! stop signal, so scanner and hasher workers stop taking new work, the
//! driver abandons its wait, and the run ends with exit code 130.
//!
//! ```rust,no_run
//! use dupetree::duplicates::FinderConfig;
//! use dupetree::signal::install_handler;
//!
//! let handler = install_handler().expect("Failed to install signal handler");
//! let config = FinderConfig::default().with_shutdown_flag(handler.get_flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag set by Ctrl+C.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown as if Ctrl+C had been pressed.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clone of the flag, for [`FinderConfig::with_shutdown_flag`].
    ///
    /// [`FinderConfig::with_shutdown_flag`]: crate::duplicates::FinderConfig::with_shutdown_flag
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag so the handler can serve another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler, or reuse the installed one.
///
/// `ctrlc` accepts a single handler per process. Repeated calls (several
/// `run_app` invocations in one test binary) get the existing handler back
/// with its flag cleared. If some other code already owns the signal hook,
/// an unhooked handler is returned that still honors
/// [`ShutdownHandler::request_shutdown`].
///
/// # Errors
///
/// Currently always succeeds; the `Result` is kept so callers handle a
/// future hard failure.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Stopping workers...");
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    });

    match installed {
        Ok(()) => {
            let handler = GLOBAL_HANDLER.get_or_init(|| handler);
            Ok(handler.clone())
        }
        Err(e) => {
            log::debug!("Ctrl+C handler unavailable ({}), using unhooked handler", e);
            let handler = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new);
            handler.reset();
            Ok(handler.clone())
        }
    }
}
