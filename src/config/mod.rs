//! Job configuration.
//!
//! An import job is described by a YAML file. Environment variables are
//! interpolated before parsing and the result is validated before any
//! source is touched.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::Path;

use crate::csv::{ArityPolicy, Decoded, Dialect, Header, RowDecoder};
use crate::error::{
    ConfigError, DelimiterEqualsQuoteSnafu, EmptyOutputPathSnafu, EmptySourcePathSnafu,
    EmptySourcePathsSnafu, EnvInterpolationSnafu, InvalidConfiguredHeaderSnafu,
    InvalidDialectCharSnafu, LineTerminatorInDialectSnafu, MultiRecordHeaderSnafu, ReadFileSnafu,
    YamlParseSnafu, ZeroChunkSizeSnafu, ZeroConcurrencySnafu,
};

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Output path meaning "write to stdout".
pub const STDOUT: &str = "-";

/// Main configuration structure for an import job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    /// CSV dialect and row handling (optional).
    #[serde(default)]
    pub csv: CsvConfig,
    /// Where documents go (optional, defaults to stdout).
    #[serde(default)]
    pub output: OutputConfig,
    /// Error handling configuration (optional).
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
}

/// Input files and how they are split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Files to import, in order. Local paths or `file://` URIs.
    pub paths: Vec<String>,

    /// Target chunk size in bytes (default: 8 MiB). Chunks always end on a
    /// record boundary, so actual sizes vary.
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,

    /// Maximum number of chunks decoded concurrently (default: 4)
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,
}

fn default_chunk_size_bytes() -> usize {
    8 * MB
}

fn default_max_concurrent_chunks() -> usize {
    4
}

/// CSV dialect and row handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvConfig {
    /// Field delimiter (default: ",").
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Quote character (default: `"`).
    #[serde(default = "default_quote")]
    pub quote: String,

    /// Trim whitespace around header names.
    #[serde(default)]
    pub trim_header: bool,

    /// What to do with rows whose field count differs from the header.
    #[serde(default)]
    pub arity_policy: ArityPolicy,

    /// Header line supplied out-of-band. When set, sources have no header
    /// row and every line is data.
    #[serde(default)]
    pub header: Option<String>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            quote: default_quote(),
            trim_header: false,
            arity_policy: ArityPolicy::default(),
            header: None,
        }
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_quote() -> String {
    "\"".to_string()
}

impl CsvConfig {
    /// Resolve the configured dialect.
    pub fn dialect(&self) -> Result<Dialect, ConfigError> {
        let delimiter = dialect_byte("delimiter", &self.delimiter)?;
        let quote = dialect_byte("quote", &self.quote)?;
        ensure!(
            delimiter != quote,
            DelimiterEqualsQuoteSnafu {
                value: delimiter as char
            }
        );

        Ok(Dialect::default()
            .with_delimiter(delimiter)
            .with_quote(quote)
            .with_trim_header(self.trim_header))
    }

    /// Parse the out-of-band header, if one is configured.
    pub fn configured_header(&self) -> Result<Option<Header>, ConfigError> {
        let Some(line) = &self.header else {
            return Ok(None);
        };
        let dialect = self.dialect()?;
        let header =
            Header::parse(line.as_bytes(), &dialect).context(InvalidConfiguredHeaderSnafu)?;

        let records = RowDecoder::new(line.as_bytes(), dialect)
            .records()
            .filter(|record| !matches!(record, Ok(Decoded::Blank)))
            .count();
        ensure!(records == 1, MultiRecordHeaderSnafu { records });

        Ok(Some(header))
    }
}

fn dialect_byte(name: &str, value: &str) -> Result<u8, ConfigError> {
    let byte = match value.as_bytes() {
        [byte] if byte.is_ascii() => *byte,
        _ => {
            return InvalidDialectCharSnafu { name, value }.fail();
        }
    };
    ensure!(
        byte != b'\n' && byte != b'\r',
        LineTerminatorInDialectSnafu { name }
    );
    Ok(byte)
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// NDJSON output file, or "-" for stdout (default).
    #[serde(default = "default_output_path")]
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> String {
    STDOUT.to_string()
}

impl OutputConfig {
    pub fn is_stdout(&self) -> bool {
        self.path == STDOUT
    }
}

/// Error handling configuration for resilient job execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    /// Failed chunks tolerated before the job stops (0 = unlimited, default: 0).
    #[serde(default)]
    pub max_failures: usize,
    /// Directory to write failed chunk records to.
    #[serde(default)]
    pub dlq_path: Option<String>,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_options(path, true)
    }

    /// Load configuration from a YAML file with optional environment variable interpolation.
    pub fn from_file_with_options(
        path: impl AsRef<Path>,
        interpolate_env: bool,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        Self::from_yaml(&content, interpolate_env)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str, interpolate_env: bool) -> Result<Self, ConfigError> {
        let content = if interpolate_env {
            vars::interpolate(content).map_err(|errors| {
                EnvInterpolationSnafu {
                    message: errors.join("\n"),
                }
                .build()
            })?
        } else {
            content.to_string()
        };

        let config: Config = serde_yaml::from_str(&content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.source.paths.is_empty(), EmptySourcePathsSnafu);
        for (index, path) in self.source.paths.iter().enumerate() {
            ensure!(!path.trim().is_empty(), EmptySourcePathSnafu { index });
        }
        ensure!(self.source.chunk_size_bytes > 0, ZeroChunkSizeSnafu);
        ensure!(self.source.max_concurrent_chunks > 0, ZeroConcurrencySnafu);
        ensure!(!self.output.path.trim().is_empty(), EmptyOutputPathSnafu);

        self.csv.dialect()?;
        self.csv.configured_header()?;
        Ok(())
    }
}
