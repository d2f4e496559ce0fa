//! CSV decoding core.
//!
//! Splits raw bytes into records, validates the header and pairs header
//! names with row values. Everything here is synchronous and free of shared
//! mutable state so chunks can be decoded on any worker.

mod assembler;
mod decoder;
mod header;

pub use assembler::{ArityPolicy, Assembled, Document, assemble};
pub use decoder::{Decoded, RawRow, Records, RowDecoder};
pub use header::{Header, HeaderSplit, split_header};

/// Delimiter, quote character and header trimming for one import job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Field separator (default `,`).
    pub delimiter: u8,
    /// Quote character (default `"`).
    pub quote: u8,
    /// Trim surrounding whitespace from header field names.
    pub trim_header: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            trim_header: false,
        }
    }
}

impl Dialect {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_trim_header(mut self, trim_header: bool) -> Self {
        self.trim_header = trim_header;
        self
    }
}
