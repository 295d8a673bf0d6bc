//! State module for tracking harvest progress in memory
//!
//! # Components
//!
//! - `SeenSet`: repository names already discovered or enriched, seeded from disk
//! - `FailureBudget`: run-wide ceiling on non-recoverable request failures

mod budget;
mod seen;

// Re-export main types
pub use budget::FailureBudget;
pub use seen::SeenSet;
