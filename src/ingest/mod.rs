//! Chunk ingestion.
//!
//! Drives the decoder, assembler and encoder over one chunk of raw records.
//! A chunk is decoded using nothing but the shared [`Header`] and its own
//! bytes, so any number of chunks can run on independent workers.

use std::io::{BufRead, Write};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::Serialize;
use snafu::prelude::*;
use tracing::trace;

use crate::csv::{ArityPolicy, Assembled, Decoded, Dialect, Header, RowDecoder, assemble};
use crate::emit;
use crate::error::{AssembleSnafu, DecodeSnafu, EncodeSnafu, IngestError};
use crate::metrics::events::{BlankLines, RecordsSkipped, RecordsWritten};
use crate::sink::NdjsonWriter;

/// Per-chunk counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    /// Documents emitted.
    pub written: u64,
    /// Rows dropped by the arity policy.
    pub skipped: u64,
}

impl Add for IngestResult {
    type Output = IngestResult;

    fn add(self, rhs: Self) -> Self::Output {
        IngestResult {
            written: self.written + rhs.written,
            skipped: self.skipped + rhs.skipped,
        }
    }
}

impl AddAssign for IngestResult {
    fn add_assign(&mut self, rhs: Self) {
        self.written += rhs.written;
        self.skipped += rhs.skipped;
    }
}

impl Sum for IngestResult {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(IngestResult::default(), Add::add)
    }
}

/// Decodes chunks against a fixed header.
///
/// Cloning is cheap: the header is shared.
#[derive(Debug, Clone)]
pub struct ChunkIngester {
    header: Header,
    dialect: Dialect,
    policy: ArityPolicy,
}

impl ChunkIngester {
    pub fn new(header: Header, dialect: Dialect, policy: ArityPolicy) -> Self {
        Self {
            header,
            dialect,
            policy,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn policy(&self) -> ArityPolicy {
        self.policy
    }

    /// Decode every record of `source` and write one NDJSON line per
    /// document to `sink`.
    ///
    /// Fails fast on the first decode, arity or write error. The error
    /// carries the counters accumulated before the failing record.
    pub fn ingest<R, W>(&self, source: R, sink: &mut W) -> Result<IngestResult, IngestError>
    where
        R: BufRead,
        W: Write + ?Sized,
    {
        self.ingest_from_line(source, 1, sink)
    }

    /// Like [`ingest`](Self::ingest), numbering physical lines from
    /// `first_line` so errors point into the whole source.
    pub fn ingest_from_line<R, W>(
        &self,
        source: R,
        first_line: u64,
        sink: &mut W,
    ) -> Result<IngestResult, IngestError>
    where
        R: BufRead,
        W: Write + ?Sized,
    {
        let mut decoder = RowDecoder::new(source, self.dialect).with_first_line(first_line);
        let mut writer = NdjsonWriter::new(sink);
        let mut result = IngestResult::default();
        let mut blank = 0u64;

        let outcome = loop {
            let decoded = match decoder.decode_record() {
                Ok(Some(decoded)) => decoded,
                Ok(None) => break Ok(()),
                Err(source) => {
                    break Err(source).context(DecodeSnafu {
                        written: result.written,
                        skipped: result.skipped,
                    });
                }
            };

            let row = match decoded {
                Decoded::Row(row) => row,
                Decoded::Blank => {
                    blank += 1;
                    continue;
                }
            };
            let line = row.line();

            let assembled = match assemble(&self.header, row, self.policy) {
                Ok(assembled) => assembled,
                Err(source) => {
                    break Err(source).context(AssembleSnafu {
                        line,
                        written: result.written,
                        skipped: result.skipped,
                    });
                }
            };

            match assembled {
                Assembled::Document(doc) => {
                    if let Err(source) = writer.write(&doc) {
                        break Err(source).context(EncodeSnafu {
                            line,
                            written: result.written,
                            skipped: result.skipped,
                        });
                    }
                    result.written += 1;
                }
                Assembled::Skipped => {
                    trace!(line, "Row shorter than header skipped");
                    result.skipped += 1;
                }
            }
        };

        emit!(RecordsWritten {
            count: result.written
        });
        emit!(RecordsSkipped {
            count: result.skipped
        });
        emit!(BlankLines { count: blank });

        outcome.map(|()| result)
    }

    /// Decode an in-memory chunk.
    pub fn ingest_bytes<W>(&self, chunk: &[u8], sink: &mut W) -> Result<IngestResult, IngestError>
    where
        W: Write + ?Sized,
    {
        self.ingest(chunk, sink)
    }
}
