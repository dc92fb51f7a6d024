//! Plain text report.
//!
//! ```text
//! Group 1f2d...e9
//! ./a.txt
//! ./b.txt
//!
//! Failed 1
//! file-open: ./locked.bin: Permission denied (os error 13)
//! ```
//!
//! Groups arrive sorted by digest with members sorted by path, so two runs
//! over the same tree print the same report.

use std::io::{self, Write};

use yansi::{Condition, Paint};

use crate::duplicates::{DuplicateGroup, ScanSummary};
use crate::scanner::ScanError;

/// Text formatter over a finished run.
#[derive(Debug)]
pub struct TextOutput<'a> {
    groups: &'a [DuplicateGroup],
    failures: &'a [ScanError],
    color: bool,
}

impl<'a> TextOutput<'a> {
    /// Create a formatter for `groups` and the failures in `summary`.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup], summary: &'a ScanSummary) -> Self {
        Self {
            groups,
            failures: &summary.failures,
            color: false,
        }
    }

    /// Highlight section headers.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn condition(&self) -> Condition {
        if self.color {
            Condition::ALWAYS
        } else {
            Condition::NEVER
        }
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let when = self.condition();

        for group in self.groups {
            writeln!(
                writer,
                "{} {}",
                "Group".green().bold().whenever(when),
                group.digest
            )?;
            for file in &group.files {
                writeln!(writer, "{}", file.path.display())?;
            }
            writeln!(writer)?;
        }

        if !self.failures.is_empty() {
            writeln!(
                writer,
                "{} {}",
                "Failed".red().bold().whenever(when),
                self.failures.len()
            )?;
            for failure in self.failures {
                writeln!(writer, "{}", failure_line(failure))?;
            }
        }

        Ok(())
    }
}

/// `<kind>: <path>: <error>` for one failure.
fn failure_line(failure: &ScanError) -> String {
    let cause = std::error::Error::source(failure)
        .map_or_else(|| failure.to_string(), ToString::to_string);
    format!("{}: {}: {}", failure.kind(), failure.path().display(), cause)
}
