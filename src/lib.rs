//! dupetree - concurrent duplicate file finder
//!
//! Walks a directory tree with a pool of scanner threads, buckets files by
//! size, and hashes only files whose size is shared, on a separate pool of
//! hasher threads. Files with equal BLAKE3 digests are reported as groups.
//! The filesystem is only ever read.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::duplicates::DuplicateFinder;
use crate::error::ExitCode;
use crate::output::{JsonOutput, TextOutput};
use crate::progress::Progress;

/// Run the application for parsed CLI arguments.
///
/// Writes the report to stdout and returns the exit code for a completed
/// run. Fatal errors (bad root, bad config, interruption, strict-mode
/// failures) are returned as `Err`.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the root cannot be
/// scanned, the run is interrupted, or the report cannot be written.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color);
    log::debug!("Log level: {}", logging::current_level_name());

    if cli.no_color {
        yansi::disable();
    }

    let config = Config::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .apply_cli(&cli);
    config.validate()?;
    log::debug!("Effective configuration: {:?}", config);

    let handler = signal::install_handler()?;

    let mut finder_config = config
        .finder_config()
        .with_shutdown_flag(handler.get_flag());
    let show_progress = !cli.quiet && !cli.no_progress && cli.output == OutputFormat::Text;
    if show_progress {
        finder_config = finder_config.with_progress_callback(Arc::new(Progress::new()));
    }

    let finder = DuplicateFinder::new(finder_config);
    let (groups, summary) = finder.find_duplicates(&cli.path)?;

    for failure in &summary.failures {
        log::warn!("Skipped {}: {}", failure.path().display(), failure);
    }

    let exit_code = ExitCode::for_report(groups.len(), summary.failures.len());

    let stdout = std::io::stdout();
    let color = !cli.no_color && stdout.is_terminal();
    let mut out = stdout.lock();
    match cli.output {
        OutputFormat::Text => TextOutput::new(&groups, &summary)
            .with_color(color)
            .write_to(&mut out)
            .context("Failed to write report")?,
        OutputFormat::Json => JsonOutput::new(&groups, &summary, exit_code)
            .write_to(&mut out, true)
            .context("Failed to write report")?,
    }
    out.flush().context("Failed to write report")?;

    log::info!(
        "{} files scanned ({}), {} groups, {} reclaimable",
        summary.total_files,
        summary.total_size_display(),
        summary.duplicate_groups,
        summary.reclaimable_display()
    );

    Ok(exit_code)
}
