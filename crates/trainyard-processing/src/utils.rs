//! Shared utilities for validation and preparation.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a column's data type for encoding purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Boolean type
    Boolean,
    /// String/text type (and anything else rendered as text)
    Text,
}

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else {
        DtypeCategory::Text
    }
}

// =============================================================================
// Missing Value Markers
// =============================================================================

/// Cell contents read as missing, in addition to empty fields.
pub const NULL_MARKERS: [&str; 14] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A",
    "<NA>", "#NA",
];

/// Null markers in the form the CSV reader expects.
pub fn null_values() -> NullValues {
    NullValues::AllColumns(NULL_MARKERS.iter().map(|&m| PlSmallStr::from(m)).collect())
}

// =============================================================================
// Series Helpers
// =============================================================================

/// Owned, trimmed text of every cell; missing cells stay `None`.
pub fn text_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let as_text = series.cast(&DataType::String)?;
    Ok(as_text
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect())
}

/// Numeric view of a column; unparseable or missing cells become `None`.
pub fn float_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let floats = series.cast(&DataType::Float64)?;
    Ok(floats.f64()?.into_iter().collect())
}

/// Parse text as a whole number, accepting forms like `"3"` and `"3.0"`.
pub fn parse_integral(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15)
        .map(|v| v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_category() {
        assert_eq!(get_dtype_category(&DataType::Int64), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::Float32), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::Boolean), DtypeCategory::Boolean);
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::Text);
        assert!(is_integer_dtype(&DataType::UInt8));
        assert!(!is_integer_dtype(&DataType::Float64));
    }

    #[test]
    fn test_parse_integral() {
        assert_eq!(parse_integral("3"), Some(3));
        assert_eq!(parse_integral(" -7 "), Some(-7));
        assert_eq!(parse_integral("4.0"), Some(4));
        assert_eq!(parse_integral("4.5"), None);
        assert_eq!(parse_integral("cat"), None);
        assert_eq!(parse_integral("inf"), None);
    }

    #[test]
    fn test_text_and_float_values() {
        let series = Series::new("s".into(), &[Some("1.5"), None, Some("x")]);
        let floats = float_values(&series).unwrap();
        assert_eq!(floats, vec![Some(1.5), None, None]);

        let text = text_values(&series).unwrap();
        assert_eq!(text, vec![Some("1.5".to_string()), None, Some("x".to_string())]);
    }
}
