//! Source loading and preparation.
//!
//! A source is read whole, its header is resolved (from the first record,
//! or from configuration) and its data section is planned into chunks.
//! Chunks share the source bytes; slicing one is a reference-count bump.

mod chunks;

pub use chunks::{ByteRange, plan_chunks};

use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::debug;

use crate::csv::{Dialect, Header, split_header};
use crate::emit;
use crate::error::{HeaderError, StorageError};
use crate::metrics::events::BytesRead;
use crate::storage::StorageProvider;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Identifies one chunk of one source: `<source>#<index>@<start>..<end>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkId {
    source: Arc<str>,
    index: usize,
    range: ByteRange,
}

impl ChunkId {
    pub fn new(source: Arc<str>, index: usize, range: ByteRange) -> Self {
        Self {
            source,
            index,
            range,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Position of the chunk within its source.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn range(&self) -> ByteRange {
        self.range
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}@{}", self.source, self.index, self.range)
    }
}

impl Serialize for ChunkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A planned chunk.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: ChunkId,
    /// Physical line (1-based, within the whole source) the chunk starts on.
    pub first_line: u64,
}

impl Chunk {
    pub fn index(&self) -> usize {
        self.id.index
    }

    pub fn range(&self) -> ByteRange {
        self.id.range
    }
}

/// A source with its header resolved and its data planned into chunks.
#[derive(Debug, Clone)]
pub struct PreparedSource {
    pub path: Arc<str>,
    pub header: Header,
    pub chunks: Vec<Chunk>,
    data: Bytes,
}

impl PreparedSource {
    /// Resolve the header and plan chunks.
    ///
    /// With `configured` set, the source has no header row. Returns
    /// `Ok(None)` when the source has no header row to read (it is empty or
    /// only blank lines).
    pub fn prepare(
        path: &str,
        data: Bytes,
        dialect: &Dialect,
        configured: Option<&Header>,
        chunk_size: usize,
    ) -> Result<Option<Self>, HeaderError> {
        let (header, data_start, data_line) = match configured {
            Some(header) => {
                let bom = if data.starts_with(UTF8_BOM) {
                    UTF8_BOM.len()
                } else {
                    0
                };
                (header.clone(), bom, 1)
            }
            None => match split_header(&data, dialect)? {
                Some(split) => (split.header, split.data_start, split.data_line),
                None => return Ok(None),
            },
        };

        let path: Arc<str> = Arc::from(path);
        let mut line = data_line;
        let chunks = plan_chunks(&data, data_start, chunk_size, dialect)
            .into_iter()
            .enumerate()
            .map(|(index, range)| {
                let first_line = line;
                line += data[range.as_range()].iter().filter(|&&b| b == b'\n').count() as u64;
                Chunk {
                    id: ChunkId::new(path.clone(), index, range),
                    first_line,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "Planned {} chunks for {} ({} fields, {} bytes)",
            chunks.len(),
            path,
            header.len(),
            data.len()
        );

        Ok(Some(Self {
            path,
            header,
            chunks,
            data,
        }))
    }

    /// Raw bytes of `chunk`.
    pub fn chunk_bytes(&self, chunk: &Chunk) -> Bytes {
        self.data.slice(chunk.range().as_range())
    }

    /// Size of the whole source in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Read a whole source file.
pub async fn load_source(url: &str) -> Result<Bytes, StorageError> {
    let storage = StorageProvider::for_object(url).await?;
    let bytes = storage.get_object().await?;
    emit!(BytesRead {
        bytes: bytes.len() as u64
    });
    debug!("Read {} bytes from {}", bytes.len(), storage.canonical_url());
    Ok(bytes)
}
