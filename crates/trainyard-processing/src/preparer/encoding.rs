//! Feature and target encoding.
//!
//! A [`FeatureEncoder`] is fitted once on the cleaned table and then reused
//! verbatim at inference time, so a raw record always lands in the same
//! columns the model was trained on.

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::error::{ProcessingError, Result};
use crate::types::{ClassificationKind, TargetEncoding, TrainingTask};
use crate::utils::{
    DtypeCategory, float_values, get_dtype_category, is_integer_dtype, parse_integral,
    text_values,
};

/// How one source column becomes one or more numeric feature columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum FeatureSpec {
    /// Numbers pass through unchanged.
    Numeric { name: String },
    /// `true` → 1.0, `false` → 0.0.
    Boolean { name: String },
    /// Indicator columns for every category except the first (sorted order).
    OneHot {
        name: String,
        categories: Vec<String>,
    },
}

impl FeatureSpec {
    pub fn source_column(&self) -> &str {
        match self {
            FeatureSpec::Numeric { name }
            | FeatureSpec::Boolean { name }
            | FeatureSpec::OneHot { name, .. } => name,
        }
    }

    /// Number of feature columns this spec emits.
    pub fn width(&self) -> usize {
        match self {
            FeatureSpec::Numeric { .. } | FeatureSpec::Boolean { .. } => 1,
            FeatureSpec::OneHot { categories, .. } => categories.len().saturating_sub(1),
        }
    }

    /// The categories that get an indicator column.
    pub fn emitted_categories(&self) -> &[String] {
        match self {
            FeatureSpec::OneHot { categories, .. } if !categories.is_empty() => &categories[1..],
            _ => &[],
        }
    }

    fn feature_names(&self) -> Vec<String> {
        match self {
            FeatureSpec::Numeric { name } | FeatureSpec::Boolean { name } => vec![name.clone()],
            FeatureSpec::OneHot { name, .. } => self
                .emitted_categories()
                .iter()
                .map(|category| format!("{name}_{category}"))
                .collect(),
        }
    }
}

/// Ordered column encoders for everything except the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    specs: Vec<FeatureSpec>,
}

impl FeatureEncoder {
    /// Fit on a cleaned table, skipping the target column.
    pub fn fit(frame: &DataFrame, target_column: &str) -> Result<Self> {
        let mut specs = Vec::with_capacity(frame.width().saturating_sub(1));

        for column in frame.get_columns() {
            let name = column.name().to_string();
            if name == target_column {
                continue;
            }

            let series = column.as_materialized_series();
            let spec = match get_dtype_category(series.dtype()) {
                DtypeCategory::Numeric => FeatureSpec::Numeric { name },
                DtypeCategory::Boolean => FeatureSpec::Boolean { name },
                DtypeCategory::Text => {
                    let mut categories: Vec<String> =
                        text_values(series)?.into_iter().flatten().collect();
                    categories.sort();
                    categories.dedup();
                    FeatureSpec::OneHot { name, categories }
                }
            };
            specs.push(spec);
        }

        Ok(Self { specs })
    }

    /// An encoder that passes every named column through as a number.
    pub fn numeric(names: &[String]) -> Self {
        Self {
            specs: names
                .iter()
                .map(|name| FeatureSpec::Numeric { name: name.clone() })
                .collect(),
        }
    }

    pub fn specs(&self) -> &[FeatureSpec] {
        &self.specs
    }

    /// Total number of encoded feature columns.
    pub fn width(&self) -> usize {
        self.specs.iter().map(FeatureSpec::width).sum()
    }

    /// Encoded column names, in matrix order.
    pub fn feature_names(&self) -> Vec<String> {
        self.specs.iter().flat_map(FeatureSpec::feature_names).collect()
    }

    /// Encode every row of a table into a feature matrix.
    pub fn transform(&self, frame: &DataFrame) -> Result<Array2<f64>> {
        let n = frame.height();
        let mut x = Array2::<f64>::zeros((n, self.width()));
        let mut offset = 0;

        for spec in &self.specs {
            let series = frame
                .column(spec.source_column())?
                .as_materialized_series()
                .clone();

            match spec {
                FeatureSpec::Numeric { name } => {
                    for (row, value) in float_values(&series)?.into_iter().enumerate() {
                        match value {
                            Some(v) if v.is_finite() => x[[row, offset]] = v,
                            _ => {
                                return Err(ProcessingError::FeaturePreparation(format!(
                                    "column '{name}' has a missing or non-finite value at row {row}"
                                )));
                            }
                        }
                    }
                }
                FeatureSpec::Boolean { name } => {
                    for (row, value) in series.bool()?.into_iter().enumerate() {
                        match value {
                            Some(v) => x[[row, offset]] = if v { 1.0 } else { 0.0 },
                            None => {
                                return Err(ProcessingError::FeaturePreparation(format!(
                                    "column '{name}' has a missing value at row {row}"
                                )));
                            }
                        }
                    }
                }
                FeatureSpec::OneHot { .. } => {
                    let lookup = indicator_lookup(spec);
                    for (row, value) in text_values(&series)?.into_iter().enumerate() {
                        if let Some(&col) = value.as_deref().and_then(|v| lookup.get(v)) {
                            x[[row, offset + col]] = 1.0;
                        }
                    }
                }
            }

            offset += spec.width();
        }

        Ok(x)
    }

    /// Encode one raw record (column name → JSON value) into a feature vector.
    ///
    /// Categories never seen during fitting encode as all-zero indicators.
    pub fn encode_record(&self, record: &Map<String, Value>) -> Result<Vec<f64>> {
        let mut features = vec![0.0; self.width()];
        let mut offset = 0;

        for spec in &self.specs {
            let name = spec.source_column();
            let value = record.get(name).filter(|v| !v.is_null()).ok_or_else(|| {
                ProcessingError::InvalidFeatures(format!("record is missing column '{name}'"))
            })?;

            match spec {
                FeatureSpec::Numeric { .. } => {
                    features[offset] = json_number(value).ok_or_else(|| {
                        ProcessingError::InvalidFeatures(format!(
                            "column '{name}' expects a finite number, got {value}"
                        ))
                    })?;
                }
                FeatureSpec::Boolean { .. } => {
                    features[offset] = json_bool(value).ok_or_else(|| {
                        ProcessingError::InvalidFeatures(format!(
                            "column '{name}' expects a boolean, got {value}"
                        ))
                    })?;
                }
                FeatureSpec::OneHot { .. } => {
                    let text = match value {
                        Value::String(s) => s.trim().to_string(),
                        other => other.to_string(),
                    };
                    if let Some(&col) = indicator_lookup(spec).get(text.as_str()) {
                        features[offset + col] = 1.0;
                    }
                }
            }

            offset += spec.width();
        }

        Ok(features)
    }
}

fn indicator_lookup(spec: &FeatureSpec) -> HashMap<&str, usize> {
    spec.emitted_categories()
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect()
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn json_bool(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 0.0 || v == 1.0 => Some(v),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(1.0),
            "false" | "0" => Some(0.0),
            _ => None,
        },
        _ => None,
    }
}

/// Turn the target column into a numeric vector.
///
/// Regression targets become `f64`. Classification targets that are already
/// integral keep their values; anything else gets codes in first-seen order.
pub fn encode_target(series: &Series, task: TrainingTask) -> Result<(Array1<f64>, TargetEncoding)> {
    if series.null_count() > 0 {
        return Err(ProcessingError::TargetEncoding(format!(
            "target '{}' still has {} missing value(s)",
            series.name(),
            series.null_count()
        )));
    }

    let category = get_dtype_category(series.dtype());
    match task {
        TrainingTask::Regression => {
            let values = match category {
                DtypeCategory::Text => text_values(series)?
                    .into_iter()
                    .map(|v| v.and_then(|s| s.parse::<f64>().ok()))
                    .collect(),
                DtypeCategory::Boolean => bool_codes(series)?,
                DtypeCategory::Numeric => float_values(series)?,
            };
            let y = finite_values(values, series.name())?;
            Ok((y, TargetEncoding::Identity))
        }
        TrainingTask::Classification(_) => match category {
            DtypeCategory::Boolean => {
                let y = finite_values(bool_codes(series)?, series.name())?;
                Ok((y, TargetEncoding::Identity))
            }
            DtypeCategory::Numeric => {
                let values = float_values(series)?;
                let all_whole = is_integer_dtype(series.dtype())
                    || values
                        .iter()
                        .all(|v| v.is_some_and(|f| f.is_finite() && f.fract() == 0.0));
                if all_whole {
                    let y = finite_values(values, series.name())?;
                    Ok((y, TargetEncoding::Identity))
                } else {
                    label_encode(series)
                }
            }
            DtypeCategory::Text => {
                let texts = text_values(series)?;
                let integral: Option<Vec<f64>> = texts
                    .iter()
                    .map(|v| v.as_deref().and_then(parse_integral).map(|i| i as f64))
                    .collect();
                match integral {
                    Some(codes) => Ok((Array1::from(codes), TargetEncoding::Identity)),
                    None => label_encode(series),
                }
            }
        },
    }
}

/// Number of distinct classes the target will have once encoded.
///
/// Counted on the encoded codes, so labels that differ only by surrounding
/// whitespace, or numbers written as `"1"` and `"1.0"`, count once.
pub fn count_target_classes(series: &Series) -> Result<usize> {
    let (codes, _) = encode_target(series, TrainingTask::Classification(ClassificationKind::Binary))?;
    let distinct: HashSet<u64> = codes.iter().map(|c| (c + 0.0).to_bits()).collect();
    Ok(distinct.len())
}

fn bool_codes(series: &Series) -> Result<Vec<Option<f64>>> {
    Ok(series
        .bool()?
        .into_iter()
        .map(|v| v.map(|b| if b { 1.0 } else { 0.0 }))
        .collect())
}

fn finite_values(values: Vec<Option<f64>>, name: &str) -> Result<Array1<f64>> {
    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.filter(|f| f.is_finite()).ok_or_else(|| {
                ProcessingError::TargetEncoding(format!(
                    "target '{name}' has a non-numeric value at row {row}"
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from)
}

/// Codes in the order labels are first observed.
fn label_encode(series: &Series) -> Result<(Array1<f64>, TargetEncoding)> {
    let mut labels: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut codes = Vec::with_capacity(series.len());

    for value in text_values(series)? {
        let label = value.ok_or_else(|| {
            ProcessingError::TargetEncoding(format!("target '{}' has a missing label", series.name()))
        })?;
        let code = match index.get(&label) {
            Some(&code) => code,
            None => {
                let code = labels.len();
                index.insert(label.clone(), code);
                labels.push(label);
                code
            }
        };
        codes.push(code as f64);
    }

    Ok((Array1::from(codes), TargetEncoding::Labels(labels)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn frame() -> DataFrame {
        df! {
            "age" => &[30i64, 40, 50],
            "city" => &["Oslo", "Bergen", "Oslo"],
            "member" => &[true, false, true],
            "label" => &["b", "a", "b"],
        }
        .unwrap()
    }

    #[test]
    fn test_fit_feature_names_keep_column_positions() {
        let encoder = FeatureEncoder::fit(&frame(), "label").unwrap();
        assert_eq!(encoder.feature_names(), vec!["age", "city_Oslo", "member"]);
        assert_eq!(encoder.width(), 3);
    }

    #[test]
    fn test_transform_drops_first_category() {
        let encoder = FeatureEncoder::fit(&frame(), "label").unwrap();
        let x = encoder.transform(&frame()).unwrap();
        assert_eq!(x.row(0).to_vec(), vec![30.0, 1.0, 1.0]);
        assert_eq!(x.row(1).to_vec(), vec![40.0, 0.0, 0.0]);
    }

    #[test]
    fn test_encode_record_unknown_category() {
        let encoder = FeatureEncoder::fit(&frame(), "label").unwrap();
        let record = json!({"age": 35, "city": "Trondheim", "member": false});
        let features = encoder.encode_record(record.as_object().unwrap()).unwrap();
        assert_eq!(features, vec![35.0, 0.0, 0.0]);
    }

    #[test]
    fn test_encode_record_missing_column() {
        let encoder = FeatureEncoder::fit(&frame(), "label").unwrap();
        let record = json!({"age": 35});
        let err = encoder.encode_record(record.as_object().unwrap()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FEATURES");
    }

    #[test]
    fn test_label_encoding_first_seen_order() {
        let series = Series::new("label".into(), &["dog", "cat", "dog", "bird"]);
        let (y, encoding) =
            encode_target(&series, TrainingTask::Classification(ClassificationKind::Multiclass))
                .unwrap();
        assert_eq!(y.to_vec(), vec![0.0, 1.0, 0.0, 2.0]);
        assert_eq!(
            encoding,
            TargetEncoding::Labels(vec!["dog".into(), "cat".into(), "bird".into()])
        );
    }

    #[test]
    fn test_count_target_classes_matches_encoding() {
        let padded = Series::new("label".into(), &["cat", "dog", "cat ", " dog"]);
        assert_eq!(count_target_classes(&padded).unwrap(), 2);

        let numeric_text = Series::new("y".into(), &["1", "0", "1.0", "2"]);
        assert_eq!(count_target_classes(&numeric_text).unwrap(), 3);
    }

    #[test]
    fn test_integral_targets_cast_directly() {
        let task = TrainingTask::Classification(ClassificationKind::Binary);

        let ints = Series::new("y".into(), &[3i64, 7, 3]);
        let (y, encoding) = encode_target(&ints, task).unwrap();
        assert_eq!(y.to_vec(), vec![3.0, 7.0, 3.0]);
        assert_eq!(encoding, TargetEncoding::Identity);

        let text = Series::new("y".into(), &["1", "0", "1.0"]);
        let (y, _) = encode_target(&text, task).unwrap();
        assert_eq!(y.to_vec(), vec![1.0, 0.0, 1.0]);

        let fractional = Series::new("y".into(), &[0.5f64, 1.5, 0.5]);
        let (y, encoding) = encode_target(&fractional, task).unwrap();
        assert_eq!(y.to_vec(), vec![0.0, 1.0, 0.0]);
        assert!(matches!(encoding, TargetEncoding::Labels(_)));
    }

    #[test]
    fn test_regression_target_from_text() {
        let series = Series::new("price".into(), &["1.5", " 2 ", "3e1"]);
        let (y, _) = encode_target(&series, TrainingTask::Regression).unwrap();
        assert_eq!(y.to_vec(), vec![1.5, 2.0, 30.0]);
    }
}
