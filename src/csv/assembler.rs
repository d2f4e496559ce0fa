//! Pairs header names with row values under an arity policy.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::error::{ArityMismatch, ArityMismatchSnafu};

use super::{Header, RawRow};

/// How rows whose field count differs from the header are handled.
///
/// Rows with more fields than the header are rejected under every policy:
/// the extra values cannot be assigned to any field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArityPolicy {
    /// Any mismatch fails the chunk.
    Strict,
    /// Short rows are padded with empty strings.
    #[default]
    Lenient,
    /// Short rows are dropped and counted as skipped.
    SkipShort,
}

impl ArityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArityPolicy::Strict => "strict",
            ArityPolicy::Lenient => "lenient",
            ArityPolicy::SkipShort => "skip_short",
        }
    }
}

impl std::fmt::Display for ArityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered field -> text mapping in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document<'h> {
    header: &'h Header,
    values: Vec<String>,
}

impl<'h> Document<'h> {
    pub fn header(&self) -> &'h Header {
        self.header
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.header
            .index_of(name)
            .map(|index| self.values[index].as_str())
    }

    /// Fields in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.header
            .names()
            .zip(self.values.iter().map(String::as_str))
    }
}

impl Serialize for Document<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Non-error outcome of assembling one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled<'h> {
    Document(Document<'h>),
    /// The row was dropped by the policy.
    Skipped,
}

/// Pair `header[i]` with `row[i]` under `policy`.
pub fn assemble<'h>(
    header: &'h Header,
    row: RawRow,
    policy: ArityPolicy,
) -> Result<Assembled<'h>, ArityMismatch> {
    let expected = header.len();
    let actual = row.len();

    ensure!(actual <= expected, ArityMismatchSnafu { expected, actual });

    let mut values = row.into_fields();
    if actual < expected {
        match policy {
            ArityPolicy::Strict => return ArityMismatchSnafu { expected, actual }.fail(),
            ArityPolicy::SkipShort => return Ok(Assembled::Skipped),
            ArityPolicy::Lenient => values.resize(expected, String::new()),
        }
    }

    Ok(Assembled::Document(Document { header, values }))
}
