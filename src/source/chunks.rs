//! Chunk planning.
//!
//! Splits the data section of a source into byte ranges that each start and
//! end on a record boundary. The planner tracks quoting with the same rules
//! as the row decoder, so a newline inside a quoted field never ends a chunk.

use std::ops::Range;

use crate::csv::Dialect;

/// A half-open byte range `[start, end)` within a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Clone, Copy)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Split `data[start..]` into ranges of roughly `target` bytes.
///
/// A range is closed at the first record-ending newline at or after
/// `target` bytes, so ranges can be larger than `target` but never split a
/// record. The ranges are contiguous, never empty and cover `data[start..]`
/// exactly. An unterminated quote makes the rest of the data one range; the
/// decoder reports it.
pub fn plan_chunks(data: &[u8], start: usize, target: usize, dialect: &Dialect) -> Vec<ByteRange> {
    let target = target.max(1);
    let Dialect {
        delimiter, quote, ..
    } = *dialect;

    let mut ranges = Vec::new();
    let mut chunk_start = start.min(data.len());
    let mut state = State::FieldStart;

    for (pos, &byte) in data.iter().enumerate().skip(chunk_start) {
        state = match state {
            State::Quoted if byte == quote => State::QuoteInQuoted,
            State::Quoted => State::Quoted,
            _ if byte == b'\n' => {
                let end = pos + 1;
                if end - chunk_start >= target {
                    ranges.push(ByteRange::new(chunk_start, end));
                    chunk_start = end;
                }
                State::FieldStart
            }
            _ if byte == delimiter => State::FieldStart,
            State::FieldStart if byte == quote => State::Quoted,
            State::QuoteInQuoted if byte == quote => State::Quoted,
            _ => State::Unquoted,
        };
    }

    if chunk_start < data.len() {
        ranges.push(ByteRange::new(chunk_start, data.len()));
    }
    ranges
}
