//! Dead Letter Queue for failed chunk tracking.
//!
//! Failed chunks are written as NDJSON to a configurable directory so the
//! offending byte ranges can be inspected and re-imported.
//!
//! # Components
//!
//! - [`DeadLetterQueue`] - Buffers failure records and writes them out
//! - [`FailureTracker`] - Counts failures and enforces `max_failures`

mod queue;
mod tracker;
mod types;

pub use queue::DeadLetterQueue;
pub use tracker::FailureTracker;
pub use types::{FailedChunk, FailureStats};
