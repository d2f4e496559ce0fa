//! Failure tracking with DLQ integration.

use std::sync::Arc;
use tracing::{error, warn};

use crate::emit;
use crate::error::{MaxFailuresExceededSnafu, PipelineError};
use crate::metrics::events::{ChunkProcessed, ChunkStatus};
use crate::pipeline::ChunkFailure;

use super::DeadLetterQueue;

/// Tracks chunk failures, records them to the DLQ and enforces
/// `max_failures`.
pub struct FailureTracker {
    failures: Vec<ChunkFailure>,
    max_failures: usize,
    dlq: Option<Arc<DeadLetterQueue>>,
}

impl FailureTracker {
    /// Create a new failure tracker. `max_failures` of 0 means unlimited.
    pub fn new(max_failures: usize, dlq: Option<Arc<DeadLetterQueue>>) -> Self {
        Self {
            failures: Vec::new(),
            max_failures,
            dlq,
        }
    }

    /// Record a failure and check the `max_failures` limit.
    ///
    /// Returns `Err` once the limit is reached (after finalizing the DLQ).
    pub async fn record_failure(&mut self, failure: ChunkFailure) -> Result<(), PipelineError> {
        warn!(
            chunk = %failure.chunk,
            line = failure.line,
            kind = failure.kind.as_str(),
            "Chunk failed: {}",
            failure.message
        );
        emit!(ChunkProcessed {
            status: ChunkStatus::Failed
        });

        if let Some(dlq) = &self.dlq {
            dlq.record_failure(&failure).await;
        }
        self.failures.push(failure);

        let count = self.failures.len();
        if self.max_failures > 0 && count >= self.max_failures {
            error!("Max failures ({}) reached, stopping import", count);
            self.finalize_dlq().await;
            let first = Box::new(self.failures[0].clone());
            return MaxFailuresExceededSnafu { count, first }.fail();
        }

        Ok(())
    }

    /// Finalize DLQ, logging any errors.
    pub async fn finalize_dlq(&self) {
        if let Some(dlq) = &self.dlq
            && let Err(e) = dlq.finalize().await
        {
            error!("Failed to finalize DLQ: {}", e);
        }
    }

    /// Returns the failure count.
    pub fn count(&self) -> usize {
        self.failures.len()
    }

    /// Consume the tracker, returning every recorded failure in the order
    /// it was recorded.
    pub fn into_failures(self) -> Vec<ChunkFailure> {
        self.failures
    }
}
