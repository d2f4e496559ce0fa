//! Import job runner.
//!
//! Reads each source, resolves its header, then decodes its chunks in
//! parallel and writes their output in source order.
//!
//! # Architecture
//!
//! - The header is resolved before any chunk of a source is scheduled. A
//!   header error fails the whole job.
//! - Chunks are decoded on tokio's blocking thread pool (CPU bound), at most
//!   `max_concurrent_chunks` at a time.
//! - Each chunk writes into its own buffer. A failed chunk's buffer is
//!   dropped; successful buffers are written to the output in chunk order.

mod output;
mod signal;

pub use output::{OutputWriter, open_output};

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use snafu::prelude::*;
use std::time::{Duration, Instant};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::csv::{Dialect, Header};
use crate::dlq::{DeadLetterQueue, FailureTracker};
use crate::emit;
use crate::error::{
    ConfigSnafu, DlqSnafu, ErrorKind, HeaderSnafu, IngestError, OutputWriteSnafu, PipelineError,
    SourceReadSnafu, TaskJoinSnafu,
};
use crate::ingest::{ChunkIngester, IngestResult};
use crate::metrics::events::{ActiveChunks, ChunkDecodeCompleted, ChunkProcessed, ChunkStatus};
use crate::source::{Chunk, ChunkId, PreparedSource, load_source};

use output::{ChunkOutput, ReorderBuffer};

/// A chunk that failed to decode.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub chunk: ChunkId,
    pub kind: ErrorKind,
    pub message: String,
    /// Physical line of the failing record within the source.
    pub line: u64,
}

impl ChunkFailure {
    pub fn from_error(chunk: ChunkId, error: &IngestError) -> Self {
        Self {
            chunk,
            kind: error.kind(),
            message: error.to_string(),
            line: error.line(),
        }
    }
}

/// Outcome of an import job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobSummary {
    /// Documents written to the output.
    pub written: u64,
    /// Rows dropped by the arity policy in successful chunks.
    pub skipped: u64,
    /// Sources with a header.
    pub sources: usize,
    /// Sources with no records at all.
    pub empty_sources: usize,
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    /// Chunks abandoned because of a shutdown request.
    pub chunks_cancelled: usize,
    /// NDJSON bytes written to the output.
    pub bytes_written: u64,
    /// Whether the job stopped early on a shutdown request.
    pub cancelled: bool,
    pub failures: Vec<ChunkFailure>,
}

impl JobSummary {
    /// Count a chunk whose output has reached the job output.
    fn add_written_chunk(&mut self, result: IngestResult, bytes: usize) {
        self.written += result.written;
        self.skipped += result.skipped;
        self.bytes_written += bytes as u64;
        self.chunks_succeeded += 1;
    }

    fn add_cancelled_chunks(&mut self, count: usize) {
        for _ in 0..count {
            emit!(ChunkProcessed {
                status: ChunkStatus::Cancelled
            });
        }
        self.chunks_cancelled += count;
        self.cancelled = true;
    }
}

/// Result of decoding one chunk on the blocking pool.
struct ChunkOutcome {
    chunk: Chunk,
    /// `None` if the chunk was cancelled before it started.
    result: Option<Result<(IngestResult, Vec<u8>), IngestError>>,
    duration: Duration,
}

type ChunkTask = JoinHandle<ChunkOutcome>;

/// Decode one chunk on the blocking thread pool.
fn spawn_chunk(
    ingester: ChunkIngester,
    chunk: Chunk,
    bytes: Bytes,
    shutdown: CancellationToken,
) -> ChunkTask {
    tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        if shutdown.is_cancelled() {
            return ChunkOutcome {
                chunk,
                result: None,
                duration: start.elapsed(),
            };
        }

        let mut buf = Vec::with_capacity(bytes.len() + bytes.len() / 2);
        let result = ingester
            .ingest_from_line(bytes.as_ref(), chunk.first_line, &mut buf)
            .map(|result| (result, buf));

        ChunkOutcome {
            chunk,
            result: Some(result),
            duration: start.elapsed(),
        }
    })
}

/// A configured import job.
pub struct ImportJob {
    config: Config,
    dialect: Dialect,
    configured_header: Option<Header>,
    shutdown: CancellationToken,
}

impl ImportJob {
    /// Create a job, resolving the dialect and any out-of-band header.
    pub fn new(config: Config, shutdown: CancellationToken) -> Result<Self, PipelineError> {
        let dialect = config.csv.dialect().context(ConfigSnafu)?;
        let configured_header = config.csv.configured_header().context(ConfigSnafu)?;

        Ok(Self {
            config,
            dialect,
            configured_header,
            shutdown,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read a source, resolve its header and plan its chunks.
    ///
    /// Returns `Ok(None)` for a source with no records.
    pub async fn prepare_source(&self, path: &str) -> Result<Option<PreparedSource>, PipelineError> {
        let data = load_source(path).await.context(SourceReadSnafu { path })?;
        PreparedSource::prepare(
            path,
            data,
            &self.dialect,
            self.configured_header.as_ref(),
            self.config.source.chunk_size_bytes,
        )
        .context(HeaderSnafu { path })
    }

    /// Run the job against the configured output.
    pub async fn run(&self) -> Result<JobSummary, PipelineError> {
        let mut output = open_output(&self.config.output).await?;
        self.run_with_output(&mut output).await
    }

    /// Run the job, writing documents to `output`.
    pub async fn run_with_output<W>(&self, output: &mut W) -> Result<JobSummary, PipelineError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        info!(
            "Starting import of {} sources (policy={}, chunk_size={}, concurrency={})",
            self.config.source.paths.len(),
            self.config.csv.arity_policy,
            self.config.source.chunk_size_bytes,
            self.config.source.max_concurrent_chunks
        );

        let dlq = DeadLetterQueue::from_config(&self.config.error_handling)
            .await
            .context(DlqSnafu)?
            .map(std::sync::Arc::new);
        let mut failures = FailureTracker::new(self.config.error_handling.max_failures, dlq);
        let mut summary = JobSummary::default();

        let result = self
            .import_sources(output, &mut failures, &mut summary)
            .await;

        // Output of chunks that finished before a fatal error is still delivered
        let flushed = output.flush().await.context(OutputWriteSnafu {
            path: self.config.output.path.as_str(),
        });
        let result = result.and(flushed);

        // The tracker finalizes the DLQ itself when it aborts the job
        if !matches!(result, Err(PipelineError::MaxFailuresExceeded { .. })) {
            failures.finalize_dlq().await;
        }
        summary.failures = failures.into_failures();

        if let Err(source) = result {
            error!(
                "Import aborted: {} written, {} skipped, {} chunks ok, {} failed",
                summary.written, summary.skipped, summary.chunks_succeeded, summary.chunks_failed
            );
            return Err(PipelineError::Aborted {
                source: Box::new(source),
                summary: Box::new(summary),
            });
        }

        info!(
            "Import complete: {} written, {} skipped, {} chunks ok, {} failed{}",
            summary.written,
            summary.skipped,
            summary.chunks_succeeded,
            summary.chunks_failed,
            if summary.cancelled { " (cancelled)" } else { "" }
        );
        Ok(summary)
    }

    async fn import_sources<W>(
        &self,
        output: &mut W,
        failures: &mut FailureTracker,
        summary: &mut JobSummary,
    ) -> Result<(), PipelineError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        for path in &self.config.source.paths {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, skipping remaining sources");
                summary.cancelled = true;
                break;
            }

            let Some(source) = self.prepare_source(path).await? else {
                info!("{}: source is empty, nothing to import", path);
                summary.empty_sources += 1;
                continue;
            };
            summary.sources += 1;

            if source.chunks.is_empty() {
                info!("{}: no data rows after the header", path);
                continue;
            }

            let before = (summary.written, summary.skipped);
            self.import_source(&source, output, failures, summary)
                .await?;
            info!(
                "{}: {} written, {} skipped across {} chunks",
                path,
                summary.written - before.0,
                summary.skipped - before.1,
                source.chunks.len()
            );

            if summary.cancelled {
                break;
            }
        }
        Ok(())
    }

    /// Decode every chunk of `source`, writing successful output in order.
    async fn import_source<W>(
        &self,
        source: &PreparedSource,
        output: &mut W,
        failures: &mut FailureTracker,
        summary: &mut JobSummary,
    ) -> Result<(), PipelineError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let ingester = ChunkIngester::new(
            source.header.clone(),
            self.dialect,
            self.config.csv.arity_policy,
        );
        let max_concurrent = self.config.source.max_concurrent_chunks;
        let output_path = self.config.output.path.as_str();

        let mut queued = source.chunks.iter();
        let mut in_flight: FuturesUnordered<ChunkTask> = FuturesUnordered::new();
        let mut reorder = ReorderBuffer::new();

        loop {
            if self.shutdown.is_cancelled() {
                let abandoned = in_flight.len() + queued.len() + reorder.waiting_outputs();
                info!(
                    "Shutdown requested, abandoning {} chunks of {}",
                    abandoned, source.path
                );
                summary.add_cancelled_chunks(abandoned);
                break;
            }

            while in_flight.len() < max_concurrent
                && let Some(chunk) = queued.next()
            {
                in_flight.push(spawn_chunk(
                    ingester.clone(),
                    chunk.clone(),
                    source.chunk_bytes(chunk),
                    self.shutdown.clone(),
                ));
            }
            emit!(ActiveChunks {
                count: in_flight.len()
            });

            if in_flight.is_empty() {
                break;
            }

            // Cancellation is picked up at the top of the loop
            let joined = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => continue,
                Some(joined) = in_flight.next() => joined,
            };

            let ChunkOutcome {
                chunk,
                result,
                duration,
            } = joined.context(TaskJoinSnafu)?;

            let finished = match result {
                Some(Ok((result, buf))) => {
                    emit!(ChunkDecodeCompleted { duration });
                    debug!(
                        "[chunk] {}: {} written, {} skipped in {:?}",
                        chunk.id, result.written, result.skipped, duration
                    );
                    Some(ChunkOutput { result, buf })
                }
                Some(Err(e)) => {
                    summary.chunks_failed += 1;
                    failures
                        .record_failure(ChunkFailure::from_error(chunk.id.clone(), &e))
                        .await?;
                    None
                }
                None => {
                    summary.add_cancelled_chunks(1);
                    None
                }
            };

            reorder.insert(chunk.index(), finished);
            write_ready(&mut reorder, output, output_path, summary).await?;
        }

        Ok(())
    }
}

/// Write the outputs that are now in chunk order and count them.
async fn write_ready<W>(
    reorder: &mut ReorderBuffer,
    output: &mut W,
    path: &str,
    summary: &mut JobSummary,
) -> Result<(), PipelineError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    for ChunkOutput { result, buf } in reorder.drain_ready() {
        output
            .write_all(&buf)
            .await
            .context(OutputWriteSnafu { path })?;
        emit!(ChunkProcessed {
            status: ChunkStatus::Success
        });
        summary.add_written_chunk(result, buf.len());
    }
    Ok(())
}

/// Run an import job with the given configuration.
///
/// SIGINT, SIGTERM and SIGQUIT stop the job: chunks not yet finished are
/// abandoned and the summary is marked cancelled.
pub async fn run_import(config: Config) -> Result<JobSummary, PipelineError> {
    let shutdown = CancellationToken::new();

    // Set up signal handler for graceful shutdown
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match signal::shutdown_signal().await {
                Ok(()) => shutdown.cancel(),
                Err(e) => error!("Failed to install signal handlers: {}", e),
            }
        }
    });

    let job = ImportJob::new(config, shutdown)?;
    job.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv::ArityPolicy;
    use crate::error::ArityMismatch;
    use crate::source::ByteRange;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write_source(dir: &TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn config(paths: Vec<String>, chunk_size: usize, concurrency: usize) -> Config {
        let yaml = format!(
            "source:\n  paths: {paths:?}\n  chunk_size_bytes: {chunk_size}\n  max_concurrent_chunks: {concurrency}\n"
        );
        Config::from_yaml(&yaml, false).unwrap()
    }

    async fn run(config: Config) -> (Result<JobSummary, PipelineError>, String) {
        let job = ImportJob::new(config, CancellationToken::new()).unwrap();
        let mut out = Vec::new();
        let result = job.run_with_output(&mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_chunk_failure_from_error() {
        let chunk = ChunkId::new(Arc::from("in.csv"), 1, ByteRange::new(5, 9));
        let error = IngestError::Assemble {
            source: ArityMismatch {
                expected: 2,
                actual: 3,
            },
            line: 4,
            written: 0,
            skipped: 0,
        };

        let failure = ChunkFailure::from_error(chunk, &error);
        assert_eq!(failure.kind, ErrorKind::ArityMismatch);
        assert_eq!(failure.line, 4);
        assert_eq!(failure.chunk.to_string(), "in.csv#1@5..9");

        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["chunk"], "in.csv#1@5..9");
        assert_eq!(json["kind"], "arity_mismatch");
    }

    #[tokio::test]
    async fn test_parallel_output_matches_sequential() {
        let dir = TempDir::new().unwrap();
        let mut contents = String::from("id,name,note\n");
        for i in 0..200 {
            if i % 17 == 0 {
                contents.push_str(&format!("{i},\"multi\nline {i}\",x\n\n"));
            } else {
                contents.push_str(&format!("{i},name {i},\"a, b\"\n"));
            }
        }
        let path = write_source(&dir, "rows.csv", &contents);

        let (sequential, expected) = run(config(vec![path.clone()], usize::MAX / 2, 1)).await;
        let (parallel, actual) = run(config(vec![path], 64, 8)).await;

        let sequential = sequential.unwrap();
        let parallel = parallel.unwrap();
        assert_eq!(sequential.chunks_succeeded, 1);
        assert!(parallel.chunks_succeeded > 10);
        assert_eq!(parallel.written, 200);
        assert_eq!(sequential.written, parallel.written);
        assert_eq!(expected, actual);
        assert_eq!(parallel.bytes_written, actual.len() as u64);
    }

    #[tokio::test]
    async fn test_failed_chunk_is_isolated() {
        let dir = TempDir::new().unwrap();
        let path = write_source(
            &dir,
            "bad.csv",
            "Code,Country\nGER,Germany\nIRL,Ireland,Extra\nFRA,France\n",
        );

        let (result, out) = run(config(vec![path.clone()], 1, 2)).await;
        let summary = result.unwrap();

        assert_eq!(summary.written, 2);
        assert_eq!(summary.chunks_succeeded, 2);
        assert_eq!(summary.chunks_failed, 1);
        assert_eq!(summary.failures.len(), 1);

        let failure = &summary.failures[0];
        assert_eq!(failure.kind, ErrorKind::ArityMismatch);
        assert_eq!(failure.line, 3);
        assert_eq!(failure.chunk.to_string(), format!("{path}#1@25..43"));

        assert_eq!(
            out,
            "{\"Code\":\"GER\",\"Country\":\"Germany\"}\n{\"Code\":\"FRA\",\"Country\":\"France\"}\n"
        );
    }

    #[tokio::test]
    async fn test_max_failures_aborts() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "bad.csv", "a\n1,2\n3,4\n5,6\n");
        let mut config = config(vec![path], 1, 1);
        config.error_handling.max_failures = 2;

        let (result, _) = run(config).await;
        let err = result.unwrap_err();
        assert!(matches!(
            err.root(),
            PipelineError::MaxFailuresExceeded { count: 2, .. }
        ));
        assert_eq!(err.kind(), Some(ErrorKind::ArityMismatch));
    }

    #[tokio::test]
    async fn test_aborted_job_keeps_written_output_and_counts() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "bad.csv", "a,b\n1,2\n3,4\n5,6,7\n8,9,10\n");
        let output = dir.path().join("out.ndjson");

        let mut config = config(vec![path.clone()], 1, 1);
        config.error_handling.max_failures = 2;
        config.output.path = output.to_str().unwrap().to_string();

        let job = ImportJob::new(config, CancellationToken::new()).unwrap();
        let err = job.run().await.unwrap_err();

        let summary = err.partial_summary().unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(summary.chunks_succeeded, 2);
        assert_eq!(summary.chunks_failed, 2);
        assert_eq!(summary.failures.len(), 2);

        match err.root() {
            PipelineError::MaxFailuresExceeded { count, first } => {
                assert_eq!(*count, 2);
                assert_eq!(first.line, 4);
                assert_eq!(first.kind, ErrorKind::ArityMismatch);
                assert_eq!(first.chunk.source(), path);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("line 4"));

        // Documents of the chunks that succeeded reached the file
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, "{\"a\":\"1\",\"b\":\"2\"}\n{\"a\":\"3\",\"b\":\"4\"}\n");
    }

    #[tokio::test]
    async fn test_header_error_is_fatal() {
        let dir = TempDir::new().unwrap();
        let good = write_source(&dir, "good.csv", "a,b\n1,2\n");
        let bad = write_source(&dir, "bad.csv", "a,,b\n1,2,3\n");

        let (result, out) = run(config(vec![good, bad], 1024, 2)).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::EmptyHeaderField));
        assert!(err.to_string().contains("bad.csv"));

        // The first source was already imported
        assert_eq!(err.partial_summary().unwrap().written, 1);
        assert_eq!(out, "{\"a\":\"1\",\"b\":\"2\"}\n");
    }

    #[tokio::test]
    async fn test_empty_and_header_only_sources_succeed() {
        let dir = TempDir::new().unwrap();
        let empty = write_source(&dir, "empty.csv", "");
        let header_only = write_source(&dir, "header.csv", "Code,Country\n");

        let (result, out) = run(config(vec![empty, header_only], 1024, 2)).await;
        let summary = result.unwrap();
        assert_eq!(summary.written, 0);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.empty_sources, 1);
        assert_eq!(summary.sources, 1);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.csv");
        let (result, _) = run(config(vec![missing.to_str().unwrap().to_string()], 1024, 1)).await;
        assert!(matches!(
            result.unwrap_err().root(),
            PipelineError::SourceRead { .. }
        ));
    }

    #[tokio::test]
    async fn test_import_from_memory_source() {
        let fixtures = crate::storage::StorageProvider::for_url("memory://pipeline-fixtures")
            .await
            .unwrap();
        fixtures
            .put("countries.csv", b"Code,Country\nGER,Germany\nIRL,Ireland\n".to_vec())
            .await
            .unwrap();

        let (result, out) = run(config(
            vec!["memory://pipeline-fixtures/countries.csv".to_string()],
            1,
            2,
        ))
        .await;
        let summary = result.unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(
            out,
            "{\"Code\":\"GER\",\"Country\":\"Germany\"}\n{\"Code\":\"IRL\",\"Country\":\"Ireland\"}\n"
        );
    }

    #[tokio::test]
    async fn test_shutdown_after_prepare_cancels_every_chunk() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "rows.csv", "a\n1\n2\n3\n");

        let shutdown = CancellationToken::new();
        let job = ImportJob::new(config(vec![path.clone()], 1, 2), shutdown.clone()).unwrap();
        let source = job.prepare_source(&path).await.unwrap().unwrap();
        assert_eq!(source.chunks.len(), 3);

        shutdown.cancel();
        let mut failures = FailureTracker::new(0, None);
        let mut summary = JobSummary::default();
        let mut out = Vec::new();
        job.import_source(&source, &mut out, &mut failures, &mut summary)
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.chunks_cancelled, 3);
        assert_eq!(summary.written, 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_waiting_output_is_not_counted_until_written() {
        let mut reorder = ReorderBuffer::new();
        let mut summary = JobSummary::default();
        let mut out = Vec::new();

        reorder.insert(
            1,
            Some(ChunkOutput {
                result: IngestResult {
                    written: 1,
                    skipped: 0,
                },
                buf: b"{\"a\":\"2\"}\n".to_vec(),
            }),
        );
        write_ready(&mut reorder, &mut out, "-", &mut summary)
            .await
            .unwrap();
        assert_eq!(summary.written, 0);
        assert_eq!(summary.chunks_succeeded, 0);
        assert!(out.is_empty());
        assert_eq!(reorder.waiting_outputs(), 1);

        reorder.insert(
            0,
            Some(ChunkOutput {
                result: IngestResult {
                    written: 1,
                    skipped: 0,
                },
                buf: b"{\"a\":\"1\"}\n".to_vec(),
            }),
        );
        write_ready(&mut reorder, &mut out, "-", &mut summary)
            .await
            .unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(summary.chunks_succeeded, 2);
        assert_eq!(summary.bytes_written, out.len() as u64);
        assert_eq!(out, b"{\"a\":\"1\"}\n{\"a\":\"2\"}\n");
    }

    #[tokio::test]
    async fn test_mid_run_cancellation_reports_only_written_output() {
        let dir = TempDir::new().unwrap();
        let mut contents = String::from("id,text\n");
        for i in 0..20_000 {
            contents.push_str(&format!("{i},\"row {i}, with some padding text\"\n"));
        }
        let path = write_source(&dir, "big.csv", &contents);

        let shutdown = CancellationToken::new();
        let job = ImportJob::new(config(vec![path], 4096, 4), shutdown.clone()).unwrap();
        let total_chunks = job
            .prepare_source(&job.config().source.paths[0])
            .await
            .unwrap()
            .unwrap()
            .chunks
            .len();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            shutdown.cancel();
        });

        let mut out = Vec::new();
        let summary = job.run_with_output(&mut out).await.unwrap();

        // Whenever the shutdown lands, the counters describe exactly the output
        let text = String::from_utf8(out).unwrap();
        assert_eq!(summary.written, text.lines().count() as u64);
        assert_eq!(summary.bytes_written, text.len() as u64);
        assert_eq!(summary.chunks_failed, 0);
        assert_eq!(
            summary.chunks_succeeded + summary.chunks_cancelled,
            total_chunks
        );
        if !summary.cancelled {
            assert_eq!(summary.written, 20_000);
        }
    }

    #[tokio::test]
    async fn test_cancelled_job_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "rows.csv", "a\n1\n2\n3\n");

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let job = ImportJob::new(config(vec![path], 1, 2), shutdown).unwrap();

        let mut out = Vec::new();
        let summary = job.run_with_output(&mut out).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.written, 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_configured_header_and_skip_short() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "rows.csv", "GER,Germany\nIRL\nFRA,France\n");

        let mut config = config(vec![path], 1024, 1);
        config.csv.header = Some("Code,Country".to_string());
        config.csv.arity_policy = ArityPolicy::SkipShort;

        let (result, out) = run(config).await;
        let summary = result.unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(out.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_failures_reach_the_dlq() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "bad.csv", "a\n\"open\n");
        let dlq_dir = dir.path().join("dlq");

        let mut config = config(vec![path], 1024, 1);
        config.error_handling.dlq_path = Some(dlq_dir.to_str().unwrap().to_string());

        let (result, _) = run(config).await;
        let summary = result.unwrap();
        assert_eq!(summary.failures[0].kind, ErrorKind::UnterminatedQuote);

        let entries: Vec<_> = std::fs::read_dir(&dlq_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let content = std::fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        assert!(content.contains("unterminated_quote"));
    }

    #[tokio::test]
    async fn test_run_writes_output_file() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "in.csv", "Code,Country\nGER,Germany\n");
        let output = dir.path().join("out.ndjson");

        let mut config = config(vec![path], 1024, 1);
        config.output.path = output.to_str().unwrap().to_string();

        let job = ImportJob::new(config, CancellationToken::new()).unwrap();
        let summary = job.run().await.unwrap();
        assert_eq!(summary.written, 1);
        assert_eq!(
            std::fs::read_to_string(Path::new(&output)).unwrap(),
            "{\"Code\":\"GER\",\"Country\":\"Germany\"}\n"
        );
    }
}
