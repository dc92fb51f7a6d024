//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based file grouping and candidate selection
//! - Digest aggregation into confirmed duplicate groups
//! - The finder that drives the scan and hash phases

pub mod finder;
pub mod groups;

pub use finder::{DuplicateFinder, FinderConfig, FinderError, ScanSummary, CHANNEL_CAPACITY};
pub use groups::{
    select_candidates, CandidateSelection, DuplicateGroup, HashIndex, SizeBuckets, SizeIndex,
};
