//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in an import job.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! counter or histogram.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when documents are written by a chunk.
pub struct RecordsWritten {
    pub count: u64,
}

impl InternalEvent for RecordsWritten {
    fn emit(self) {
        trace!(count = self.count, "Records written");
        counter!("sleet_records_written_total").increment(self.count);
    }
}

/// Event emitted when rows are dropped by the arity policy.
pub struct RecordsSkipped {
    pub count: u64,
}

impl InternalEvent for RecordsSkipped {
    fn emit(self) {
        trace!(count = self.count, "Records skipped");
        counter!("sleet_records_skipped_total").increment(self.count);
    }
}

/// Event emitted for blank lines ignored by a chunk.
pub struct BlankLines {
    pub count: u64,
}

impl InternalEvent for BlankLines {
    fn emit(self) {
        trace!(count = self.count, "Blank lines ignored");
        counter!("sleet_blank_lines_total").increment(self.count);
    }
}

/// Event emitted when source bytes are loaded.
pub struct BytesRead {
    pub bytes: u64,
}

impl InternalEvent for BytesRead {
    fn emit(self) {
        trace!(bytes = self.bytes, "Bytes read");
        counter!("sleet_bytes_read_total").increment(self.bytes);
    }
}

/// Outcome of a processed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Success,
    Failed,
    Cancelled,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Success => "success",
            ChunkStatus::Failed => "failed",
            ChunkStatus::Cancelled => "cancelled",
        }
    }
}

/// Event emitted when a chunk finishes, whatever the outcome.
pub struct ChunkProcessed {
    pub status: ChunkStatus,
}

impl InternalEvent for ChunkProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Chunk processed");
        counter!("sleet_chunks_processed_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Event emitted when a chunk decode completes.
pub struct ChunkDecodeCompleted {
    pub duration: Duration,
}

impl InternalEvent for ChunkDecodeCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "Chunk decode completed"
        );
        histogram!("sleet_chunk_decode_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when the number of in-flight chunks changes.
pub struct ActiveChunks {
    pub count: usize,
}

impl InternalEvent for ActiveChunks {
    fn emit(self) {
        trace!(count = self.count, "Active chunks");
        gauge!("sleet_active_chunks").set(self.count as f64);
    }
}

/// Event emitted when chunk output waits for an earlier chunk.
pub struct PendingChunkBuffers {
    pub count: usize,
}

impl InternalEvent for PendingChunkBuffers {
    fn emit(self) {
        trace!(count = self.count, "Pending chunk buffers");
        gauge!("sleet_pending_chunk_buffers").set(self.count as f64);
    }
}

// ============================================================================
// Storage request events
// ============================================================================

/// Storage operation type for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    Get,
    Put,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
        }
    }
}

/// Request outcome for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }

    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        }
    }
}

/// Event emitted for every storage request.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "sleet_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted with the latency of a storage request.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request completed"
        );
        histogram!(
            "sleet_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
