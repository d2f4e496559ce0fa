//! Header parsing and validation.
//!
//! The header is parsed once per source (or once per job when supplied
//! out-of-band) and then shared read-only by every chunk decode.

use std::collections::HashSet;
use std::sync::Arc;

use snafu::prelude::*;

use crate::error::{
    DuplicateHeaderFieldSnafu, EmptyHeaderFieldSnafu, HeaderDecodeSnafu, HeaderError,
};

use super::decoder::{Decoded, RowDecoder};
use super::Dialect;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Ordered, validated field names. Cheap to clone and share across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Arc<[Box<str>]>,
}

impl Header {
    /// Parse a header from the first logical record in `line`.
    pub fn parse(line: &[u8], dialect: &Dialect) -> Result<Self, HeaderError> {
        let line = line.strip_prefix(UTF8_BOM).unwrap_or(line);
        let mut decoder = RowDecoder::new(line, *dialect);
        match decoder.decode_record().context(HeaderDecodeSnafu)? {
            Some(Decoded::Row(row)) => Self::from_names(row.into_fields(), dialect.trim_header),
            Some(Decoded::Blank) | None => EmptyHeaderFieldSnafu { index: 0usize }.fail(),
        }
    }

    /// Build a header from already-split names.
    pub fn from_names<I, S>(names: I, trim: bool) -> Result<Self, HeaderError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<Box<str>> = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                let name = if trim { name.trim() } else { name };
                Box::<str>::from(name)
            })
            .collect();

        ensure!(!names.is_empty(), EmptyHeaderFieldSnafu { index: 0usize });

        let mut seen: HashSet<&str> = HashSet::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            ensure!(!name.trim().is_empty(), EmptyHeaderFieldSnafu { index });
            ensure!(
                seen.insert(&**name),
                DuplicateHeaderFieldSnafu {
                    name: name.to_string(),
                }
            );
        }

        Ok(Self {
            names: names.into(),
        })
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a validated header; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|n| &**n)
    }

    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.names.iter().map(|n| &**n)
    }

    /// Position of `name`, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| &**n == name)
    }
}

impl std::fmt::Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// A header extracted from the start of a source.
#[derive(Debug, Clone)]
pub struct HeaderSplit {
    pub header: Header,
    /// Byte offset where the first data record starts.
    pub data_start: usize,
    /// Physical line (1-based) on which the first data record starts.
    pub data_line: u64,
}

/// Extract the header record from the start of `data`.
///
/// Blank lines before the header are skipped. Returns `Ok(None)` when the
/// source has no records at all.
pub fn split_header(data: &[u8], dialect: &Dialect) -> Result<Option<HeaderSplit>, HeaderError> {
    let bom = if data.starts_with(UTF8_BOM) {
        UTF8_BOM.len()
    } else {
        0
    };
    let mut decoder = RowDecoder::new(&data[bom..], *dialect);

    loop {
        match decoder.decode_record().context(HeaderDecodeSnafu)? {
            Some(Decoded::Blank) => continue,
            Some(Decoded::Row(row)) => {
                let header = Header::from_names(row.into_fields(), dialect.trim_header)?;
                return Ok(Some(HeaderSplit {
                    header,
                    data_start: bom + decoder.offset() as usize,
                    data_line: decoder.line(),
                }));
            }
            None => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    fn parse(line: &str) -> Result<Header, HeaderError> {
        Header::parse(line.as_bytes(), &Dialect::default())
    }

    #[test]
    fn test_parse_header() {
        let header = parse("Code,Country\n").unwrap();
        assert_eq!(header.len(), 2);
        assert_eq!(header.names().collect::<Vec<_>>(), vec!["Code", "Country"]);
        assert_eq!(header.index_of("Country"), Some(1));
        assert_eq!(header.to_string(), "Code, Country");
    }

    #[test]
    fn test_quoted_header_name() {
        let header = parse("Code,\"Coun, try\"\n").unwrap();
        assert_eq!(header.get(1), Some("Coun, try"));
    }

    #[test]
    fn test_duplicate_header_fails_wherever_it_occurs() {
        for line in ["Code,Country,Country", "Country,Code,Country", "a,a", "x,y,z,x"] {
            let err = parse(line).unwrap_err();
            assert!(
                matches!(err, HeaderError::DuplicateHeaderField { .. }),
                "{line}: {err:?}"
            );
        }

        let err = parse("Code,Country,Country\n").unwrap_err();
        match err {
            HeaderError::DuplicateHeaderField { name } => assert_eq!(name, "Country"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_header_field_fails() {
        let err = parse("Code,,Country\n").unwrap_err();
        assert!(matches!(err, HeaderError::EmptyHeaderField { index: 1 }));

        let err = parse("Code,   \n").unwrap_err();
        assert!(matches!(err, HeaderError::EmptyHeaderField { index: 1 }));
    }

    #[test]
    fn test_blank_header_line_fails() {
        assert!(matches!(
            parse("\n").unwrap_err(),
            HeaderError::EmptyHeaderField { index: 0 }
        ));
        assert!(matches!(
            parse("").unwrap_err(),
            HeaderError::EmptyHeaderField { index: 0 }
        ));
    }

    #[test]
    fn test_trim_header() {
        let dialect = Dialect::default().with_trim_header(true);
        let header = Header::parse(b" Code , Country\n", &dialect).unwrap();
        assert_eq!(header.names().collect::<Vec<_>>(), vec!["Code", "Country"]);

        // Without trimming the names keep their whitespace.
        let header = parse(" Code , Country\n").unwrap();
        assert_eq!(header.get(0), Some(" Code "));
    }

    #[test]
    fn test_trimming_exposes_duplicates() {
        let dialect = Dialect::default().with_trim_header(true);
        let err = Header::parse(b"a, a\n", &dialect).unwrap_err();
        assert!(matches!(err, HeaderError::DuplicateHeaderField { name } if name == "a"));

        // Untrimmed, "a" and " a" are distinct names.
        assert!(parse("a, a\n").is_ok());
    }

    #[test]
    fn test_unterminated_quote_in_header() {
        let err = parse("\"Code,Country\n").unwrap_err();
        assert!(matches!(
            err,
            HeaderError::HeaderDecode {
                source: DecodeError::UnterminatedQuote { .. }
            }
        ));
    }

    #[test]
    fn test_bom_is_stripped() {
        let header = Header::parse(b"\xEF\xBB\xBFCode,Country\n", &Dialect::default()).unwrap();
        assert_eq!(header.get(0), Some("Code"));
    }

    #[test]
    fn test_split_header() {
        let data = b"\n\nCode,Country\nGER,Germany\n";
        let split = split_header(data, &Dialect::default()).unwrap().unwrap();
        assert_eq!(split.header.len(), 2);
        assert_eq!(&data[split.data_start..], b"GER,Germany\n");
        assert_eq!(split.data_line, 4);
    }

    #[test]
    fn test_split_header_with_bom() {
        let data = b"\xEF\xBB\xBFa,b\n1,2\n";
        let split = split_header(data, &Dialect::default()).unwrap().unwrap();
        assert_eq!(split.header.get(0), Some("a"));
        assert_eq!(&data[split.data_start..], b"1,2\n");
    }

    #[test]
    fn test_split_header_empty_source() {
        assert!(split_header(b"", &Dialect::default()).unwrap().is_none());
        assert!(split_header(b"\n\r\n", &Dialect::default()).unwrap().is_none());
    }

    #[test]
    fn test_header_is_shared_cheaply() {
        let header = parse("a,b").unwrap();
        let clone = header.clone();
        assert!(Arc::ptr_eq(&header.names, &clone.names));
    }
}
