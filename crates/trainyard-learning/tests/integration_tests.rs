//! End-to-end tests for the training pipeline.
//!
//! Datasets are generated in code; every test runs the real stages from raw
//! CSV bytes unless it targets the trainer directly.

use ndarray::array;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use trainyard_learning::{
    Algorithm, Averaging, ClassificationKind, DiagnosticKind, ErrorKind, HyperparameterOverrides,
    MetricsReport, ModelReport, Pipeline, PipelineConfig, PipelineResult, PipelineStage,
    PreparedData, TrainedModel, Trainer, TrainingTask, run_pipeline,
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

/// Three well separated string classes plus a categorical feature.
fn species_csv(n: usize) -> Vec<u8> {
    let mut csv = String::from("petal,habitat,species\n");
    for i in 0..n {
        let species = ["versicolor", "setosa", "virginica"][i % 3];
        let habitat = ["meadow", "forest", "shore"][(i / 3) % 3];
        csv.push_str(&format!("{:.2},{habitat},{species}\n", 1.0 + (i % 3) as f64 + (i as f64) * 0.005));
    }
    csv.into_bytes()
}

/// A noisy plane: `y = 2·a - 3·b + 5`.
fn plane_csv(n: usize) -> Vec<u8> {
    let mut csv = String::from("a,b,y\n");
    for i in 0..n {
        let a = i as f64 * 0.3;
        let b = ((i * 7) % 13) as f64;
        let noise = ((i * 31) % 17) as f64 * 0.02 - 0.16;
        csv.push_str(&format!("{a},{b},{}\n", 2.0 * a - 3.0 * b + 5.0 + noise));
    }
    csv.into_bytes()
}

/// A parabola the linear family cannot fit but degree 2 can.
fn parabola_csv(n: usize) -> Vec<u8> {
    let mut csv = String::from("x,y\n");
    for i in 0..n {
        let x = i as f64 / 10.0 - 3.0;
        let noise = ((i * 13) % 7) as f64 * 0.01;
        csv.push_str(&format!("{x},{}\n", x * x - 2.0 * x + 1.0 + noise));
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

fn kinds(result: &PipelineResult) -> Vec<DiagnosticKind> {
    result.images.iter().map(|i| i.kind).collect()
}

fn fixed_pipeline(algorithm: Algorithm, target: &str, run_id: &str) -> Pipeline {
    let config = PipelineConfig::builder()
        .algorithm(algorithm)
        .target_column(target)
        .model_name("fixture")
        .run_id(run_id)
        .build()
        .unwrap();
    Pipeline::builder().config(config).build().unwrap()
}

// ============================================================================
// Classification Tests
// ============================================================================

#[test]
fn test_binary_knn_end_to_end() {
    let result = run_pipeline(&binary_csv(200), "target", Algorithm::KNearestNeighbors, "knn", None)
        .unwrap();

    assert_eq!(
        kinds(&result),
        vec![
            DiagnosticKind::ConfusionMatrix,
            DiagnosticKind::RocCurve,
            DiagnosticKind::PrecisionRecallCurve,
        ]
    );
    for image in &result.images {
        assert!(image.file_name.ends_with(&format!("_{}.svg", result.run_id)));
        assert!(!image.bytes.is_empty());
    }

    let Some(MetricsReport::Classification(metrics)) = &result.metrics else {
        panic!("expected classification metrics, got {:?}", result.metrics);
    };
    assert_eq!(metrics.averaging, Averaging::Binary);
    assert_eq!(metrics.classes, vec![0.0, 1.0]);
    assert!(metrics.accuracy > 0.8, "accuracy {}", metrics.accuracy);
    assert!(metrics.roc_auc.is_some());

    assert_eq!(result.candidates.len(), 24);
    assert_eq!(result.model_artifact.task, TrainingTask::Classification(ClassificationKind::Binary));
    assert_eq!(result.model_artifact.feature_names, vec!["x1", "x2"]);
    assert!(result.model_artifact.hyperparameters.contains_key("n_neighbors"));
}

#[test]
fn test_three_class_string_target() {
    let result = run_pipeline(&species_csv(90), "species", Algorithm::DecisionTree, "iris", None)
        .unwrap();

    let Some(MetricsReport::Classification(metrics)) = &result.metrics else {
        panic!("expected classification metrics");
    };
    assert_eq!(metrics.averaging, Averaging::Macro);
    assert_eq!(metrics.classes, vec![0.0, 1.0, 2.0]);
    assert_eq!(metrics.roc_auc, None);

    // One curve per class plus the micro-average.
    let roc = result
        .images
        .iter()
        .find(|i| i.kind == DiagnosticKind::RocCurve)
        .unwrap();
    let svg = String::from_utf8(roc.bytes.clone()).unwrap();
    assert_eq!(svg.matches("AUC = ").count(), 4);
    assert!(svg.contains("versicolor"));
    assert!(svg.contains("micro-average"));

    // Label codes follow first appearance: versicolor, setosa, virginica.
    let model = TrainedModel::from_bytes(&result.model_artifact.serialized_bytes).unwrap();
    let record = json!({ "petal": 1.1, "habitat": "meadow" });
    let prediction = model.predict_record(record.as_object().unwrap()).unwrap();
    assert_eq!(prediction.value, 0.0);
    assert_eq!(prediction.label.as_deref(), Some("versicolor"));
}

#[test]
fn test_padded_labels_stay_binary() {
    let mut csv = String::from("x,label\n");
    for i in 0..40 {
        let (x, label) = match i % 3 {
            0 => (1.0, "cat"),
            1 => (5.0, "dog"),
            _ => (1.2, "\"cat \""),
        };
        csv.push_str(&format!("{},{label}\n", x + (i as f64) * 0.01));
    }

    let result = run_pipeline(csv.as_bytes(), "label", Algorithm::DecisionTree, "pets", None)
        .unwrap();
    assert_eq!(result.model_artifact.task, TrainingTask::Classification(ClassificationKind::Binary));

    let Some(MetricsReport::Classification(metrics)) = &result.metrics else {
        panic!("expected classification metrics");
    };
    assert_eq!(metrics.averaging, Averaging::Binary);
    assert_eq!(metrics.classes, vec![0.0, 1.0]);
}

#[test]
fn test_random_forest_falls_back_to_defaults() {
    let data = PreparedData::from_parts(
        vec!["x".into()],
        array![[1.0]],
        array![1.0],
        vec![0],
        vec![],
        TrainingTask::Classification(ClassificationKind::Binary),
    )
    .unwrap();

    let candidate = Trainer::default()
        .train(&data, Algorithm::RandomForest, None)
        .unwrap();
    assert_eq!(candidate.hyperparameters["n_estimators"], json!(100));
    assert_eq!(candidate.hyperparameters["max_depth"], json!(null));
    assert_eq!(candidate.score, None);
    assert_eq!(candidate.warnings.len(), 1);
    assert!(candidate.warnings[0].contains("default hyperparameters"));
}

// ============================================================================
// Regression Tests
// ============================================================================

#[test]
fn test_regression_is_deterministic() {
    let bytes = plane_csv(80);
    let first = fixed_pipeline(Algorithm::RidgeRegression, "y", "det").run(&bytes).unwrap();
    let second = fixed_pipeline(Algorithm::RidgeRegression, "y", "det").run(&bytes).unwrap();

    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first.coefficients, second.coefficients);
    assert_eq!(first.candidates, second.candidates);
    assert_eq!(first.model_artifact.hyperparameters, second.model_artifact.hyperparameters);
    assert_eq!(
        kinds(&first),
        vec![
            DiagnosticKind::Residuals,
            DiagnosticKind::ActualVsPredicted,
            DiagnosticKind::ErrorDistribution,
            DiagnosticKind::QqPlot,
        ]
    );
    // Six alphas searched by cross-validation.
    assert_eq!(first.candidates.len(), 6);
}

#[test]
fn test_ridge_with_fixed_alpha() {
    let result = run_pipeline(
        &plane_csv(60),
        "y",
        Algorithm::RidgeRegression,
        "ridge",
        Some(HyperparameterOverrides::with_alpha("0.5")),
    )
    .unwrap();
    assert_eq!(result.model_artifact.hyperparameters["alpha"], json!(0.5));
    let coefficients = result.coefficients.unwrap();
    assert!(!coefficients.standardized);
    assert_eq!(coefficients.terms.len(), 2);
    assert_eq!(coefficients.terms[0].0, "a");
}

#[test]
fn test_polynomial_finds_curvature() {
    let result = run_pipeline(&parabola_csv(60), "y", Algorithm::PolynomialRegression, "poly", None)
        .unwrap();
    let Some(MetricsReport::Regression(metrics)) = result.metrics else {
        panic!("expected regression metrics");
    };
    assert!(metrics.r2 > 0.99, "r2 {}", metrics.r2);
    let degree = result.model_artifact.hyperparameters["degree"].as_u64().unwrap();
    assert!(degree >= 2);
    assert_eq!(result.candidates.len(), 9);
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_too_many_nulls() {
    let err = run_pipeline(&null_heavy_csv(), "target", Algorithm::DecisionTree, "nulls", None)
        .unwrap_err();
    assert_eq!(err.code, "TOO_MANY_NULLS");
    assert_eq!(err.kind, ErrorKind::InputError);
    assert_eq!(err.details.unwrap()["null_count"], 60);
}

#[test]
fn test_negative_alpha_rejected() {
    let err = run_pipeline(
        &plane_csv(30),
        "y",
        Algorithm::RidgeRegression,
        "ridge",
        Some(HyperparameterOverrides::with_alpha("-5")),
    )
    .unwrap_err();
    assert_eq!(err.code, "INVALID_ALPHA_VALUE");
    assert_eq!(err.kind, ErrorKind::InputError);
}

#[test]
fn test_missing_target_column() {
    let err = run_pipeline(&plane_csv(30), "price", Algorithm::LinearRegression, "lin", None)
        .unwrap_err();
    assert_eq!(err.code, "TARGET_COLUMN_NOT_FOUND");
    assert_eq!(err.details.unwrap()["available_columns"], json!(["a", "b", "y"]));
}

#[test]
fn test_text_target_for_regression() {
    let err = run_pipeline(&species_csv(30), "species", Algorithm::LinearRegression, "lin", None)
        .unwrap_err();
    assert_eq!(err.code, "NON_NUMERIC_TARGET");
}

#[test]
fn test_failed_run_reports_failed_stage() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let config = PipelineConfig::builder()
        .algorithm(Algorithm::DecisionTree)
        .target_column("target")
        .build()
        .unwrap();
    let pipeline = Pipeline::builder()
        .config(config)
        .on_progress(move |u| sink.lock().unwrap().push(u.stage))
        .build()
        .unwrap();

    assert!(pipeline.run(b"").is_err());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![PipelineStage::Received, PipelineStage::Failed]
    );
}

// ============================================================================
// Persistence and Report Tests
// ============================================================================

#[test]
fn test_saved_model_predicts_like_the_run() {
    let result = run_pipeline(&plane_csv(50), "y", Algorithm::LinearRegression, "plane", None)
        .unwrap();
    let model = TrainedModel::from_bytes(&result.model_artifact.serialized_bytes).unwrap();
    assert_eq!(model.model_name(), "plane");
    assert_eq!(model.feature_names(), ["a", "b"]);

    let prediction = model.predict(&[1.0, 2.0]).unwrap();
    assert!((prediction.value - 1.0).abs() < 0.2, "value {}", prediction.value);
    assert_eq!(prediction.label, None);

    let path = std::env::temp_dir().join(format!("trainyard_it_{}.json", std::process::id()));
    model.save(&path).unwrap();
    let loaded = TrainedModel::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, model);
}

#[test]
fn test_report_from_result() {
    let result = fixed_pipeline(Algorithm::LinearRegression, "y", "report-run")
        .run(&plane_csv(40))
        .unwrap();
    let report = ModelReport::from_result(&result);
    assert_eq!(report.run_id, "report-run");
    assert_eq!(report.algorithm, "Linear Regression");
    assert_eq!(report.metrics[0].name, "r2");
    assert_eq!(report.metrics[0].interpretation.as_deref(), Some("Excellent fit"));

    let markdown = report.to_markdown();
    assert!(markdown.contains("# Model Report: fixture"));
    assert!(markdown.contains("## Coefficients"));

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["charts"].as_array().unwrap().len(), 4);
}
