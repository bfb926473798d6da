//! Integration tests for validation and preparation.
//!
//! Datasets are generated in code so each test states exactly what it feeds in.

use pretty_assertions::assert_eq;
use trainyard_processing::{
    ClassificationKind, ErrorKind, Preparer, ProcessingConfig, ProcessingError, TargetEncoding,
    TaskKind, TrainingTask, ValidationReport, Validator, prepare, validate,
};

// ============================================================================
// Helper Functions
// ============================================================================

/// `n` rows of two numeric features and a binary numeric target.
fn binary_csv(n: usize) -> Vec<u8> {
    let mut csv = String::from("x1,x2,target\n");
    for i in 0..n {
        let x1 = i as f64 * 0.5;
        let x2 = (i % 7) as f64;
        let target = if x1 + x2 > (n as f64) * 0.25 { 1 } else { 0 };
        csv.push_str(&format!("{x1},{x2},{target}\n"));
    }
    csv.into_bytes()
}

/// Rows with a string target of three categories and a categorical feature.
fn species_csv(n: usize) -> Vec<u8> {
    let mut csv = String::from("petal,habitat,species\n");
    for i in 0..n {
        let species = ["versicolor", "setosa", "virginica"][i % 3];
        let habitat = ["meadow", "forest", "shore"][(i / 3) % 3];
        csv.push_str(&format!("{:.1},{habitat},{species}\n", 1.0 + (i % 3) as f64 + (i as f64) * 0.01));
    }
    csv.into_bytes()
}

/// 15 rows with four missing cells each: 60 missing in total.
fn null_heavy_csv() -> Vec<u8> {
    let mut csv = String::from("a,b,c,d,e,target\n");
    for i in 0..15 {
        csv.push_str(&format!(",,,,{i},{}\n", i % 2));
    }
    csv.into_bytes()
}

fn rejection_code(report: &ValidationReport) -> &'static str {
    report
        .rejection()
        .map(ProcessingError::error_code)
        .unwrap_or("ADMISSIBLE")
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_too_many_nulls_rejected() {
    let report = validate(&null_heavy_csv(), "target", TaskKind::Classification);
    assert_eq!(rejection_code(&report), "TOO_MANY_NULLS");

    let error = report.rejection().unwrap();
    assert_eq!(error.kind(), ErrorKind::InputError);
    let details = error.details().unwrap();
    assert_eq!(details["null_count"], 60);
}

#[test]
fn test_missing_target_lists_columns() {
    let report = validate(&binary_csv(20), "label", TaskKind::Classification);
    assert_eq!(rejection_code(&report), "TARGET_COLUMN_NOT_FOUND");

    let value = serde_json::to_value(report.rejection().unwrap()).unwrap();
    assert_eq!(
        value["details"]["available_columns"],
        serde_json::json!(["x1", "x2", "target"])
    );
}

#[test]
fn test_empty_and_malformed_uploads() {
    assert_eq!(
        rejection_code(&validate(b"", "target", TaskKind::Regression)),
        "EMPTY_CSV_FILE"
    );
    assert_eq!(
        rejection_code(&validate(b"x,target\n", "target", TaskKind::Regression)),
        "EMPTY_DATASET"
    );
    assert_eq!(
        rejection_code(&validate(&[0xc3, 0x28, b'\n'], "target", TaskKind::Regression)),
        "CSV_READ_ERROR"
    );
}

#[test]
fn test_binary_dataset_admissible() {
    let report = validate(&binary_csv(200), "target", TaskKind::Classification);
    let dataset = report.into_result().unwrap();
    assert_eq!(dataset.rows(), 200);
    assert_eq!(
        dataset.task(),
        TrainingTask::Classification(ClassificationKind::Binary)
    );
}

#[test]
fn test_regression_rejects_text_target() {
    let mut csv = String::from("x,price\n");
    for i in 0..12 {
        csv.push_str(&format!("{i},{}\n", if i == 5 { "cheap" } else { "10.0" }));
    }
    let report = validate(csv.as_bytes(), "price", TaskKind::Regression);
    assert_eq!(rejection_code(&report), "NON_NUMERIC_TARGET");
}

#[test]
fn test_custom_null_cap() {
    let config = ProcessingConfig::builder().max_null_cells(100).build().unwrap();
    let report = Validator::new(config).validate(&null_heavy_csv(), "target", TaskKind::Classification);
    // Every row has a missing cell, so nothing survives cleaning.
    assert_eq!(rejection_code(&report), "INSUFFICIENT_DATA_AFTER_CLEANING");
}

// ============================================================================
// Preparation Tests
// ============================================================================

#[test]
fn test_three_class_string_target() {
    let dataset = validate(&species_csv(60), "species", TaskKind::Classification)
        .into_result()
        .unwrap();
    assert_eq!(
        dataset.task(),
        TrainingTask::Classification(ClassificationKind::Multiclass)
    );

    let data = prepare(&dataset, "species", TaskKind::Classification, 42).unwrap();
    assert_eq!(
        data.target_encoding,
        TargetEncoding::Labels(vec![
            "versicolor".to_string(),
            "setosa".to_string(),
            "virginica".to_string()
        ])
    );
    assert_eq!(data.classes(), vec![0.0, 1.0, 2.0]);
    assert_eq!(
        data.feature_names,
        vec!["petal", "habitat_meadow", "habitat_shore"]
    );
}

#[test]
fn test_prepare_idempotent_partitions() {
    let dataset = validate(&binary_csv(120), "target", TaskKind::Classification)
        .into_result()
        .unwrap();

    let first = prepare(&dataset, "target", TaskKind::Classification, 42).unwrap();
    let second = prepare(&dataset, "target", TaskKind::Classification, 42).unwrap();
    assert_eq!(first.train_indices, second.train_indices);
    assert_eq!(first.test_indices, second.test_indices);

    assert_eq!(first.test_indices.len(), 24);
    assert_eq!(first.train_indices.len() + first.test_indices.len(), 120);
    assert!(
        first
            .train_indices
            .iter()
            .all(|i| first.test_indices.binary_search(i).is_err())
    );
}

#[test]
fn test_stratification_falls_back_silently() {
    let mut csv = String::from("x,target\n");
    for i in 0..20 {
        let target = if i == 0 { "rare" } else if i % 2 == 0 { "a" } else { "b" };
        csv.push_str(&format!("{i},{target}\n"));
    }
    let dataset = validate(csv.as_bytes(), "target", TaskKind::Classification)
        .into_result()
        .unwrap();
    let data = prepare(&dataset, "target", TaskKind::Classification, 42).unwrap();
    assert!(!data.stratified);
    assert_eq!(data.test_indices.len(), 4);
}

#[test]
fn test_regression_preparation_unstratified() {
    let mut csv = String::from("size,rooms,price\n");
    for i in 0..50 {
        csv.push_str(&format!("{},{},{}\n", 40 + i, 1 + i % 4, 1000.0 + i as f64 * 12.5));
    }
    let dataset = validate(csv.as_bytes(), "price", TaskKind::Regression)
        .into_result()
        .unwrap();

    let config = ProcessingConfig::builder().test_size(0.3).build().unwrap();
    let data = Preparer::new(config)
        .prepare(&dataset, "price", TaskKind::Regression)
        .unwrap();

    assert_eq!(data.task, TrainingTask::Regression);
    assert!(!data.stratified);
    assert_eq!(data.test_indices.len(), 15);
    assert_eq!(data.y[0], 1000.0);
}
