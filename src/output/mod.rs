//! Output formatters for duplicate scan results.
//!
//! - [`TextOutput`]: one block per group, then a failure section
//! - [`JsonOutput`]: machine-readable report for scripting
//!
//! # Example
//!
//! ```no_run
//! use dupetree::duplicates::DuplicateFinder;
//! use dupetree::output::TextOutput;
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (groups, summary) = finder.find_duplicates(Path::new(".")).unwrap();
//!
//! let mut stdout = std::io::stdout().lock();
//! TextOutput::new(&groups, &summary).write_to(&mut stdout).unwrap();
//! ```

pub mod json;
pub mod text;

pub use json::{JsonOutput, JsonOutputError};
pub use text::TextOutput;
