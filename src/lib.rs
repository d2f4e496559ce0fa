//! sleet: chunked, parallel CSV to NDJSON decoding for bulk document imports.
//!
//! A source is split into record-aligned byte ranges ("chunks") that are
//! decoded independently and in parallel. Each row becomes one JSON object
//! keyed by the header's field names, written as one NDJSON line.
//!
//! # Example
//!
//! ```ignore
//! use sleet::{Config, run_import};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("import.yaml")?;
//!     let summary = run_import(config).await?;
//!     println!("Imported {} documents", summary.written);
//!     Ok(())
//! }
//! ```
//!
//! The decoding core can also be used directly on a single buffer:
//!
//! ```
//! use sleet::csv::{ArityPolicy, Dialect, Header};
//! use sleet::ChunkIngester;
//!
//! let header = Header::parse(b"Code,Country\n", &Dialect::default()).unwrap();
//! let ingester = ChunkIngester::new(header, Dialect::default(), ArityPolicy::Lenient);
//!
//! let mut out = Vec::new();
//! let result = ingester.ingest_bytes(b"GER,Germany\n", &mut out).unwrap();
//! assert_eq!(result.written, 1);
//! assert_eq!(out, b"{\"Code\":\"GER\",\"Country\":\"Germany\"}\n");
//! ```

pub mod config;
pub mod csv;
pub mod dlq;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod storage;

// Re-export main types
pub use config::Config;
pub use csv::{ArityPolicy, Dialect, Header};
pub use ingest::{ChunkIngester, IngestResult};
pub use pipeline::{ChunkFailure, ImportJob, JobSummary, run_import};
pub use storage::{StorageProvider, StorageProviderRef};
