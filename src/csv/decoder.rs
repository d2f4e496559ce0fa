//! Incremental CSV record decoder.
//!
//! Reads one logical record at a time from a `BufRead`. A record usually
//! occupies one physical line, but a quoted field may contain line breaks, in
//! which case the decoder keeps consuming physical lines until the quote is
//! closed.

use std::io::BufRead;

use snafu::prelude::*;

use crate::error::{DecodeError, ReadInputSnafu, UnterminatedQuoteSnafu};

use super::Dialect;

/// One decoded record: ordered raw field values, not type-converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    fields: Vec<String>,
    line: u64,
}

impl RawRow {
    pub fn new(fields: Vec<String>, line: u64) -> Self {
        Self { fields, line }
    }

    /// Number of fields in the row.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }

    /// Physical line (1-based) on which the record started.
    pub fn line(&self) -> u64 {
        self.line
    }
}

/// Outcome of decoding one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A record with at least one field.
    Row(RawRow),
    /// An empty physical line where a record was expected.
    Blank,
}

#[derive(Debug, Clone, Copy)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    /// Saw a quote while inside a quoted field: either an escaped quote or
    /// the closing one.
    QuoteInQuoted,
}

/// Decodes CSV records from an incremental byte source.
pub struct RowDecoder<R> {
    reader: R,
    dialect: Dialect,
    /// 1-based number of the next unread physical line.
    line: u64,
    /// Bytes consumed from `reader` so far.
    offset: u64,
    buf: Vec<u8>,
    field: Vec<u8>,
}

impl<R: BufRead> RowDecoder<R> {
    pub fn new(reader: R, dialect: Dialect) -> Self {
        Self {
            reader,
            dialect,
            line: 1,
            offset: 0,
            buf: Vec::new(),
            field: Vec::new(),
        }
    }

    /// Number physical lines starting from `line` instead of 1.
    pub fn with_first_line(mut self, line: u64) -> Self {
        self.line = line;
        self
    }

    /// Line number the next record starts on.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Number of bytes consumed from the source.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Iterate over the remaining records, stopping after the first error.
    pub fn records(&mut self) -> Records<'_, R> {
        Records {
            decoder: self,
            done: false,
        }
    }

    /// Decode the next logical record.
    ///
    /// Returns `Ok(None)` at end of input.
    pub fn decode_record(&mut self) -> Result<Option<Decoded>, DecodeError> {
        let start_line = self.line;
        let start_offset = self.offset;

        if !self.read_line(start_line)? {
            return Ok(None);
        }
        if strip_terminator(&self.buf).is_empty() {
            return Ok(Some(Decoded::Blank));
        }

        let Dialect {
            delimiter, quote, ..
        } = self.dialect;

        let mut fields = Vec::new();
        let mut state = State::FieldStart;
        let mut pos = 0;
        self.field.clear();

        loop {
            if pos == self.buf.len() {
                if matches!(state, State::Quoted) {
                    ensure!(
                        self.read_line(start_line)?,
                        UnterminatedQuoteSnafu {
                            line: start_line,
                            offset: start_offset,
                        }
                    );
                    pos = 0;
                    continue;
                }
                // Last record without a line terminator.
                break;
            }

            let byte = self.buf[pos];
            pos += 1;
            let ends_record = byte == b'\n' || (byte == b'\r' && self.buf.get(pos) == Some(&b'\n'));

            match state {
                State::Quoted => {
                    if byte == quote {
                        state = State::QuoteInQuoted;
                    } else {
                        self.field.push(byte);
                    }
                }
                State::FieldStart | State::Unquoted | State::QuoteInQuoted => {
                    if ends_record {
                        break;
                    }
                    if byte == delimiter {
                        fields.push(self.take_field());
                        state = State::FieldStart;
                    } else if byte == quote && matches!(state, State::FieldStart) {
                        state = State::Quoted;
                    } else if byte == quote && matches!(state, State::QuoteInQuoted) {
                        self.field.push(quote);
                        state = State::Quoted;
                    } else {
                        self.field.push(byte);
                        state = State::Unquoted;
                    }
                }
            }
        }

        fields.push(self.take_field());
        Ok(Some(Decoded::Row(RawRow::new(fields, start_line))))
    }

    /// Read one physical line into `buf`. Returns false at end of input.
    fn read_line(&mut self, record_line: u64) -> Result<bool, DecodeError> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .context(ReadInputSnafu { line: record_line })?;
        if n == 0 {
            return Ok(false);
        }
        self.offset += n as u64;
        self.line += 1;
        Ok(true)
    }

    fn take_field(&mut self) -> String {
        let bytes = std::mem::take(&mut self.field);
        String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
    }
}

/// Iterator over decoded records. See [`RowDecoder::records`].
pub struct Records<'a, R> {
    decoder: &'a mut RowDecoder<R>,
    done: bool,
}

impl<R: BufRead> Iterator for Records<'_, R> {
    type Item = Result<Decoded, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.decode_record() {
            Ok(Some(decoded)) => Some(Ok(decoded)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Strip a trailing `\n` or `\r\n`.
pub(crate) fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
