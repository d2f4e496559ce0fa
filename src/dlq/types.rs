//! DLQ record and statistics types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ErrorKind;
use crate::pipeline::ChunkFailure;

/// A record representing a failed chunk in the DLQ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedChunk {
    /// Chunk identifier, `<source>#<index>@<start>..<end>`.
    pub chunk: String,
    /// Source the chunk belongs to.
    pub source: String,
    pub kind: ErrorKind,
    /// Error message describing the failure.
    pub message: String,
    /// Physical line of the failing record within the source.
    pub line: u64,
    /// Timestamp when the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl FailedChunk {
    pub fn from_failure(failure: &ChunkFailure) -> Self {
        Self {
            chunk: failure.chunk.to_string(),
            source: failure.chunk.source().to_string(),
            kind: failure.kind,
            message: failure.message.clone(),
            line: failure.line,
            timestamp: Utc::now(),
        }
    }
}

/// Failure counts by kind.
#[derive(Debug, Clone, Default)]
pub struct FailureStats {
    by_kind: HashMap<ErrorKind, usize>,
}

impl FailureStats {
    /// Increment the count for a specific kind.
    pub fn increment(&mut self, kind: ErrorKind) {
        *self.by_kind.entry(kind).or_default() += 1;
    }

    pub fn get(&self, kind: ErrorKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Get total failure count.
    pub fn total(&self) -> usize {
        self.by_kind.values().sum()
    }
}

impl std::fmt::Display for FailureStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.by_kind.iter().collect();
        kinds.sort_by_key(|(kind, _)| kind.as_str());
        for (i, (kind, count)) in kinds.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}={count}")?;
        }
        Ok(())
    }
}
