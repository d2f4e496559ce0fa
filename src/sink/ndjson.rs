//! NDJSON document encoding.

use std::io::Write;

use snafu::prelude::*;

use crate::csv::Document;
use crate::error::{EncodeError, SerializeSnafu, WriteDocumentSnafu};

/// Encode one document as a compact JSON object followed by `\n`.
pub fn encode(doc: &Document<'_>) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::with_capacity(64);
    encode_into(doc, &mut buf)?;
    Ok(buf)
}

fn encode_into(doc: &Document<'_>, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    serde_json::to_writer(&mut *buf, doc).context(SerializeSnafu)?;
    buf.push(b'\n');
    Ok(())
}

/// Writes documents to a byte sink, one line each.
///
/// Each document is serialized into a scratch buffer first and handed to the
/// sink with a single `write_all`, so a document is never split across
/// writes.
pub struct NdjsonWriter<W> {
    inner: W,
    scratch: Vec<u8>,
    bytes_written: u64,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scratch: Vec::with_capacity(256),
            bytes_written: 0,
        }
    }

    /// Encode and write one document.
    pub fn write(&mut self, doc: &Document<'_>) -> Result<(), EncodeError> {
        self.scratch.clear();
        encode_into(doc, &mut self.scratch)?;
        self.inner
            .write_all(&self.scratch)
            .context(WriteDocumentSnafu)?;
        self.bytes_written += self.scratch.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn flush(&mut self) -> Result<(), EncodeError> {
        self.inner.flush().context(WriteDocumentSnafu)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
