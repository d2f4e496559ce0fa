//! Job output: the NDJSON destination and the buffer that keeps chunk
//! output in source order.

use snafu::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::{AsyncWrite, BufWriter};

use crate::config::OutputConfig;
use crate::emit;
use crate::error::{OutputWriteSnafu, PipelineError};
use crate::ingest::IngestResult;
use crate::metrics::events::PendingChunkBuffers;

/// Boxed output destination.
pub type OutputWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Open the configured output: a file (created or truncated), or stdout.
pub async fn open_output(config: &OutputConfig) -> Result<OutputWriter, PipelineError> {
    if config.is_stdout() {
        return Ok(Box::new(tokio::io::stdout()));
    }

    let path = config.path.as_str();
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .context(OutputWriteSnafu { path })?;
    }

    let file = tokio::fs::File::create(path)
        .await
        .context(OutputWriteSnafu { path })?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Output of a successfully decoded chunk, not yet written.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ChunkOutput {
    pub(crate) result: IngestResult,
    pub(crate) buf: Vec<u8>,
}

/// Holds finished chunk outputs until every earlier chunk has finished.
///
/// Failed and cancelled chunks are recorded as `None` so they release the
/// chunks behind them without contributing output. A chunk's counters travel
/// with its buffer and only count once the buffer is released.
#[derive(Debug, Default)]
pub(crate) struct ReorderBuffer {
    next: usize,
    pending: BTreeMap<usize, Option<ChunkOutput>>,
}

impl ReorderBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, index: usize, output: Option<ChunkOutput>) {
        self.pending.insert(index, output);
    }

    /// Remove and return the outputs that are now in order.
    pub(crate) fn drain_ready(&mut self) -> Vec<ChunkOutput> {
        let mut ready = Vec::new();
        while let Some(output) = self.pending.remove(&self.next) {
            self.next += 1;
            ready.extend(output);
        }
        emit!(PendingChunkBuffers {
            count: self.pending.len()
        });
        ready
    }

    /// Successful outputs still waiting for an earlier chunk.
    pub(crate) fn waiting_outputs(&self) -> usize {
        self.pending.values().filter(|output| output.is_some()).count()
    }
}
