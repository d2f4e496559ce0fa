//! Output sinks for assembled documents.
//!
//! Documents are written as newline-delimited JSON: one compact JSON object
//! per line, keys in header order.

mod ndjson;

pub use ndjson::{NdjsonWriter, encode};
