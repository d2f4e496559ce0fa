//! Dead Letter Queue implementation.

use bytes::Bytes;
use chrono::Utc;
use object_store::PutPayload;
use object_store::path::Path;
use snafu::prelude::*;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::ErrorHandlingConfig;
use crate::error::{DlqError, DlqSerializeSnafu, DlqStorageSnafu, DlqWriteSnafu};
use crate::pipeline::ChunkFailure;
use crate::storage::{StorageProvider, StorageProviderRef};

use super::types::{FailedChunk, FailureStats};

/// Records buffered before an automatic flush.
const FLUSH_THRESHOLD: usize = 100;

#[derive(Default)]
struct QueueState {
    pending: Vec<FailedChunk>,
    /// Batches written so far.
    batches: usize,
    stats: FailureStats,
}

/// Dead Letter Queue for recording failed chunks.
///
/// Each flush writes its records to a new `failures-<timestamp>-<batch>.ndjson`
/// object, so earlier batches are never rewritten.
pub struct DeadLetterQueue {
    storage: StorageProviderRef,
    prefix: String,
    state: Mutex<QueueState>,
}

impl DeadLetterQueue {
    /// Create a new DLQ from configuration.
    ///
    /// Returns `None` if no DLQ path is configured.
    pub async fn from_config(config: &ErrorHandlingConfig) -> Result<Option<Self>, DlqError> {
        let Some(dlq_path) = &config.dlq_path else {
            return Ok(None);
        };

        let storage = StorageProvider::for_url(dlq_path)
            .await
            .context(DlqStorageSnafu)?;

        let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
        let prefix = format!("failures-{timestamp}");

        info!("DLQ enabled: {}/{}-*.ndjson", dlq_path, prefix);

        Ok(Some(Self {
            storage: Arc::new(storage),
            prefix,
            state: Mutex::new(QueueState::default()),
        }))
    }

    /// Object name of the `batch`-th flush (0-based).
    pub fn batch_filename(&self, batch: usize) -> String {
        format!("{}-{batch:04}.ndjson", self.prefix)
    }

    /// Record a chunk failure.
    pub async fn record_failure(&self, failure: &ChunkFailure) {
        debug!(
            "Recording DLQ failure: {} ({})",
            failure.chunk,
            failure.kind.as_str()
        );

        let should_flush = {
            let mut state = self.state.lock().await;
            state.stats.increment(failure.kind);
            state.pending.push(FailedChunk::from_failure(failure));
            state.pending.len() >= FLUSH_THRESHOLD
        };

        if should_flush && let Err(e) = self.flush().await {
            error!("Failed to flush DLQ: {}", e);
        }
    }

    /// Flush buffered records to storage.
    pub async fn flush(&self) -> Result<(), DlqError> {
        let mut state = self.state.lock().await;
        if state.pending.is_empty() {
            return Ok(());
        }

        let mut ndjson = Vec::new();
        for record in &state.pending {
            serde_json::to_writer(&mut ndjson, record).context(DlqSerializeSnafu)?;
            ndjson.push(b'\n');
        }

        let filename = self.batch_filename(state.batches);
        let payload = PutPayload::from(Bytes::from(ndjson));
        self.storage
            .put_payload(&Path::from(filename.as_str()), payload)
            .await
            .context(DlqWriteSnafu)?;

        let count = state.pending.len();
        state.pending.clear();
        state.batches += 1;
        debug!("Flushed {} records to DLQ as {}", count, filename);
        Ok(())
    }

    /// Get current failure statistics.
    pub async fn stats(&self) -> FailureStats {
        self.state.lock().await.stats.clone()
    }

    /// Finalize the DLQ, flushing any remaining records.
    pub async fn finalize(&self) -> Result<FailureStats, DlqError> {
        self.flush().await?;
        let stats = self.stats().await;
        if stats.total() > 0 {
            info!("DLQ finalized: {} total failures ({})", stats.total(), stats);
        }
        Ok(stats)
    }
}
