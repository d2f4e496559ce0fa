//! Error types for sleet using snafu.
//!
//! Each layer of the import pipeline has its own error enum with context
//! selectors. [`ErrorKind`] is the flat taxonomy reported to callers when a
//! chunk or a job fails.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::pipeline::{ChunkFailure, JobSummary};

// ============ Error Kind ============

/// Flat classification of import failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyHeaderField,
    DuplicateHeaderField,
    UnterminatedQuote,
    ArityMismatch,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::EmptyHeaderField => "empty_header_field",
            ErrorKind::DuplicateHeaderField => "duplicate_header_field",
            ErrorKind::UnterminatedQuote => "unterminated_quote",
            ErrorKind::ArityMismatch => "arity_mismatch",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Decode Errors ============

/// Errors raised while splitting raw bytes into CSV records.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    /// Input ended inside a quoted field.
    #[snafu(display(
        "Unterminated quoted field starting at line {line} (byte offset {offset})"
    ))]
    UnterminatedQuote { line: u64, offset: u64 },

    /// Reading from the underlying source failed.
    #[snafu(display("IO error while decoding at line {line}: {source}"))]
    ReadInput { line: u64, source: std::io::Error },
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::UnterminatedQuote { .. } => ErrorKind::UnterminatedQuote,
            DecodeError::ReadInput { .. } => ErrorKind::Io,
        }
    }

    /// Physical line the failing record started on.
    pub fn line(&self) -> u64 {
        match self {
            DecodeError::UnterminatedQuote { line, .. } | DecodeError::ReadInput { line, .. } => {
                *line
            }
        }
    }
}

// ============ Header Errors ============

/// Errors that make a header unusable. These fail the whole job.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HeaderError {
    /// A field name is empty or whitespace-only.
    #[snafu(display("Header field {index} is empty"))]
    EmptyHeaderField { index: usize },

    /// A field name appears more than once.
    #[snafu(display("Header field '{name}' appears more than once"))]
    DuplicateHeaderField { name: String },

    /// The header line itself could not be decoded.
    #[snafu(display("Failed to decode header: {source}"))]
    HeaderDecode { source: DecodeError },
}

impl HeaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeaderError::EmptyHeaderField { .. } => ErrorKind::EmptyHeaderField,
            HeaderError::DuplicateHeaderField { .. } => ErrorKind::DuplicateHeaderField,
            HeaderError::HeaderDecode { source } => source.kind(),
        }
    }
}

// ============ Assembly Errors ============

/// A row's field count cannot be reconciled with the header.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
#[snafu(display("Row has {actual} fields but the header has {expected}"))]
pub struct ArityMismatch {
    pub expected: usize,
    pub actual: usize,
}

// ============ Encode Errors ============

/// Errors that can occur while writing NDJSON documents.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EncodeError {
    /// JSON serialization failed.
    #[snafu(display("Failed to serialize document: {source}"))]
    Serialize { source: serde_json::Error },

    /// Writing to the sink failed.
    #[snafu(display("Failed to write document: {source}"))]
    WriteDocument { source: std::io::Error },
}

// ============ Ingest Errors ============

/// Chunk-fatal errors raised by the chunk ingester.
///
/// Every variant carries the physical line of the failing record and the
/// counters accumulated before it.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    /// The row decoder failed.
    #[snafu(display("{source} ({written} written, {skipped} skipped before failure)"))]
    Decode {
        source: DecodeError,
        written: u64,
        skipped: u64,
    },

    /// A row could not be assembled under the configured arity policy.
    #[snafu(display(
        "Line {line}: {source} ({written} written, {skipped} skipped before failure)"
    ))]
    Assemble {
        source: ArityMismatch,
        line: u64,
        written: u64,
        skipped: u64,
    },

    /// The document could not be written to the sink.
    #[snafu(display(
        "Line {line}: {source} ({written} written, {skipped} skipped before failure)"
    ))]
    Encode {
        source: EncodeError,
        line: u64,
        written: u64,
        skipped: u64,
    },
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Decode { source, .. } => source.kind(),
            IngestError::Assemble { .. } => ErrorKind::ArityMismatch,
            IngestError::Encode { .. } => ErrorKind::Io,
        }
    }

    /// Physical line of the record that failed.
    pub fn line(&self) -> u64 {
        match self {
            IngestError::Decode { source, .. } => source.line(),
            IngestError::Assemble { line, .. } | IngestError::Encode { line, .. } => *line,
        }
    }

    /// Documents written before the failure.
    pub fn written(&self) -> u64 {
        match self {
            IngestError::Decode { written, .. }
            | IngestError::Assemble { written, .. }
            | IngestError::Encode { written, .. } => *written,
        }
    }

    /// Rows skipped before the failure.
    pub fn skipped(&self) -> u64 {
        match self {
            IngestError::Decode { skipped, .. }
            | IngestError::Assemble { skipped, .. }
            | IngestError::Encode { skipped, .. } => *skipped,
        }
    }
}

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition.
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// No source paths configured.
    #[snafu(display("At least one source path is required"))]
    EmptySourcePaths,

    /// A source path is empty.
    #[snafu(display("Source path {index} cannot be empty"))]
    EmptySourcePath { index: usize },

    /// Output path is empty.
    #[snafu(display("Output path cannot be empty"))]
    EmptyOutputPath,

    /// Chunk size must be positive.
    #[snafu(display("chunk_size_bytes must be greater than zero"))]
    ZeroChunkSize,

    /// Concurrency must be positive.
    #[snafu(display("max_concurrent_chunks must be greater than zero"))]
    ZeroConcurrency,

    /// Delimiter or quote is not a single byte.
    #[snafu(display("{name} must be a single ASCII character, got {value:?}"))]
    InvalidDialectChar { name: String, value: String },

    /// Delimiter and quote are the same character.
    #[snafu(display("delimiter and quote must differ (both are {value:?})"))]
    DelimiterEqualsQuote { value: char },

    /// Delimiter or quote is a line terminator.
    #[snafu(display("{name} cannot be a line terminator"))]
    LineTerminatorInDialect { name: String },

    /// The out-of-band header is invalid.
    #[snafu(display("Configured header is invalid: {source}"))]
    InvalidConfiguredHeader { source: HeaderError },

    /// The out-of-band header holds more than one record.
    #[snafu(display("Configured header must be a single record, found {records}"))]
    MultiRecordHeader { records: usize },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },
}

// ============ DLQ Errors ============

/// Errors that can occur during failure log operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
// Prefix avoids snafu selector conflicts with other enums
#[allow(clippy::enum_variant_names)]
pub enum DlqError {
    /// Failed to write to the DLQ.
    #[snafu(display("Failed to write to DLQ: {source}"))]
    DlqWrite { source: StorageError },

    /// Failed to serialize a failure record.
    #[snafu(display("Failed to serialize DLQ record: {source}"))]
    DlqSerialize { source: serde_json::Error },

    /// Failed to create DLQ storage provider.
    #[snafu(display("Failed to create DLQ storage: {source}"))]
    DlqStorage { source: StorageError },
}

// ============ Pipeline Error (top-level) ============

/// Top-level errors surfaced by an import job.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Reading a source failed.
    #[snafu(display("Failed to read source {path}: {source}"))]
    SourceRead { path: String, source: StorageError },

    /// A source header is invalid. Fatal for the job.
    #[snafu(display("Invalid header in {path}: {source}"))]
    Header { path: String, source: HeaderError },

    /// Writing the job output failed.
    #[snafu(display("Failed to write output {path}: {source}"))]
    OutputWrite { path: String, source: std::io::Error },

    /// DLQ error.
    #[snafu(display("DLQ error: {source}"))]
    Dlq { source: DlqError },

    /// Task join error.
    #[snafu(display("Task join error: {source}"))]
    TaskJoin { source: tokio::task::JoinError },

    /// Too many chunks failed.
    #[snafu(display(
        "Max failures exceeded: {count} failed chunks, first {} at line {}: {}",
        first.chunk,
        first.line,
        first.message
    ))]
    MaxFailuresExceeded {
        count: usize,
        first: Box<ChunkFailure>,
    },

    /// A fatal error stopped a running job. Carries what the job had written
    /// and recorded up to that point.
    #[snafu(display("Import aborted after {} documents written: {source}", summary.written))]
    Aborted {
        #[snafu(source(from(PipelineError, Box::new)))]
        source: Box<PipelineError>,
        summary: Box<JobSummary>,
    },
}

impl PipelineError {
    /// Classification of this error, if it maps onto the import taxonomy.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            PipelineError::Header { source, .. } => Some(source.kind()),
            PipelineError::MaxFailuresExceeded { first, .. } => Some(first.kind),
            PipelineError::Aborted { source, .. } => source.kind(),
            PipelineError::SourceRead { .. } | PipelineError::OutputWrite { .. } => {
                Some(ErrorKind::Io)
            }
            _ => None,
        }
    }

    /// The error that stopped the job, looking through [`PipelineError::Aborted`].
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Aborted { source, .. } => source.root(),
            other => other,
        }
    }

    /// Progress made before the job was aborted, if it got that far.
    pub fn partial_summary(&self) -> Option<&JobSummary> {
        match self {
            PipelineError::Aborted { summary, .. } => Some(summary),
            _ => None,
        }
    }
}
