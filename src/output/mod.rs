//! Output module for looking at harvested data
//!
//! This module handles:
//! - Counting distinct repositories across partition files
//! - Printing the head of a single partition file
//! - Summarizing files on disk together with the ledger's run history

mod inspect;
pub mod stats;

pub use inspect::{count_unique_repositories, inspect_file, print_inspection, FileInspection};
pub use stats::{collect_statistics, print_statistics, FileStatistics, HarvestStatistics};
