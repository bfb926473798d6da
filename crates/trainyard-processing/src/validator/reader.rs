//! CSV decoding for uploaded datasets.

use std::io::Cursor;

use polars::io::csv::read::{CsvParseOptions, CsvReadOptions};
use polars::prelude::*;
use tracing::debug;

use crate::error::{ProcessingError, Result};
use crate::utils::null_values;

const UTF8_BOM: &str = "\u{feff}";

/// Decode raw upload bytes into a table.
///
/// The first line is the header. Every column's type is inferred from the
/// whole file, and the markers in [`crate::utils::NULL_MARKERS`] read as
/// missing.
pub fn read_csv(bytes: &[u8]) -> Result<DataFrame> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ProcessingError::CsvRead(format!("content is not valid UTF-8: {e}")))?;
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);

    if text.trim().is_empty() {
        return Err(ProcessingError::EmptyCsvFile);
    }

    let cursor = Cursor::new(text.as_bytes().to_vec());
    let df = CsvReadOptions::default()
        .with_infer_schema_length(None)
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_null_values(Some(null_values())),
        )
        .into_reader_with_file_handle(cursor)
        .finish()
        .map_err(|e| ProcessingError::CsvParse(e.to_string()))?;

    debug!("Parsed CSV: {} rows x {} columns", df.height(), df.width());
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_simple_csv() {
        let df = read_csv(b"a,b\n1,x\n2,y\n").unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 2);
        assert_eq!(df.column("a").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_read_null_markers() {
        let df = read_csv(b"a,b\n1,NA\n,y\nnull,z\n").unwrap();
        assert_eq!(df.column("a").unwrap().null_count(), 2);
        assert_eq!(df.column("b").unwrap().null_count(), 1);
    }

    #[test]
    fn test_read_empty_and_whitespace() {
        assert!(matches!(read_csv(b""), Err(ProcessingError::EmptyCsvFile)));
        assert!(matches!(
            read_csv(b"  \n\t\n"),
            Err(ProcessingError::EmptyCsvFile)
        ));
    }

    #[test]
    fn test_read_invalid_utf8() {
        let err = read_csv(&[0x61, 0x2c, 0x62, 0x0a, 0xff, 0xfe, 0x0a]).unwrap_err();
        assert_eq!(err.error_code(), "CSV_READ_ERROR");
    }

    #[test]
    fn test_read_strips_bom() {
        let df = read_csv("\u{feff}a,b\n1,2\n".as_bytes()).unwrap();
        assert!(df.column("a").is_ok());
    }
}
