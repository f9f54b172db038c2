//! Integration tests for churn model training and inference.
//!
//! These tests train on the telco export fixture and exercise the artifact
//! and serving paths end to end.

use churn_learning::{
    CancellationToken, FittedPipeline, GridSearch, ModelHandle, ParamGrid, RiskPolicy, Trainer,
    TrainingConfig, TrainingOutcome,
};
use churn_processing::{
    CustomerRecord, DataCleaner, DatasetConfig, FeatureEngineer, split_features_target,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    let path = fixtures_path().join(filename);
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn small_config() -> TrainingConfig {
    TrainingConfig::builder()
        .param_grid(ParamGrid {
            n_estimators: vec![20],
            learning_rate: vec![0.1],
            max_depth: vec![2, 3],
            subsample: vec![0.8, 1.0],
        })
        .n_jobs(2)
        .build()
        .expect("valid config")
}

fn train_fixture() -> TrainingOutcome {
    Trainer::new(DatasetConfig::default(), small_config())
        .train(load_csv("churn_sample.csv"))
        .expect("training should succeed")
}

fn month_to_month_record() -> CustomerRecord {
    serde_json::from_value(serde_json::json!({
        "gender": "Female",
        "SeniorCitizen": "No",
        "Partner": "No",
        "Dependents": "No",
        "tenure": 1,
        "PhoneService": "No",
        "MultipleLines": "No",
        "InternetService": "No",
        "OnlineSecurity": "No",
        "OnlineBackup": "No",
        "DeviceProtection": "No",
        "TechSupport": "No",
        "StreamingTV": "No",
        "StreamingMovies": "No",
        "Contract": "Month-to-month",
        "PaperlessBilling": "No",
        "PaymentMethod": "Electronic check",
        "MonthlyCharges": 100.0,
        "TotalCharges": 100.0
    }))
    .expect("valid record")
}

// ============================================================================
// Training
// ============================================================================

#[test]
fn test_train_on_fixture() {
    let outcome = train_fixture();
    let summary = &outcome.summary;

    // Two rows with blank total charges are dropped before the split
    assert_eq!(summary.cleaning.rows_dropped, 2);
    assert_eq!(summary.test_rows, 16);
    assert_eq!(summary.train_rows, 62);
    assert_eq!(summary.candidates.len(), 4);
    assert!(summary.candidates.iter().all(|c| c.error.is_none()));

    let best = &summary.candidates[summary.best_index];
    assert_eq!(best.params, summary.best_params);
    assert_eq!(best.mean_score(), Some(summary.cv_score));
    assert!(
        summary
            .candidates
            .iter()
            .all(|c| c.mean_score().unwrap() <= summary.cv_score)
    );
    assert!((0.0..=1.0).contains(&summary.test_report.accuracy));
}

#[test]
fn test_search_is_reproducible() {
    let first = train_fixture();
    let second = train_fixture();

    assert_eq!(first.summary.best_index, second.summary.best_index);
    assert_eq!(
        first.summary.cv_score.to_bits(),
        second.summary.cv_score.to_bits()
    );
    assert_eq!(first.summary.candidates, second.summary.candidates);
    assert_eq!(first.pipeline, second.pipeline);
}

#[test]
fn test_single_class_search_is_exhausted() {
    let (cleaned, _) = DataCleaner::new()
        .clean(load_csv("churn_sample.csv"))
        .unwrap();
    let (features, labels) = split_features_target(&cleaned, "Churn").unwrap();
    let retained = vec![0u8; labels.len()];

    let err = GridSearch::new(small_config())
        .run(&features, &retained)
        .unwrap_err();

    assert_eq!(err.error_code(), "SEARCH_EXHAUSTED");
    let source = std::error::Error::source(&err).expect("underlying fit error");
    assert!(source.to_string().contains("single class"));
}

#[test]
fn test_cancelled_training() {
    let token = CancellationToken::new();
    token.cancel();

    let err = Trainer::new(DatasetConfig::default(), small_config())
        .cancellation_token(token)
        .train(load_csv("churn_sample.csv"))
        .unwrap_err();
    assert_eq!(err.error_code(), "CANCELLED");
}

// ============================================================================
// Artifacts and Serving
// ============================================================================

#[test]
fn test_artifact_roundtrip_is_bit_identical() {
    let outcome = train_fixture();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("churn_model.json");
    outcome.pipeline.save(&path).unwrap();

    let record = month_to_month_record();
    let before = outcome.pipeline.predict_record_proba(&record).unwrap();

    let loaded = FittedPipeline::load(&path).unwrap();
    let after = loaded.predict_record_proba(&record).unwrap();
    assert_eq!(before.to_bits(), after.to_bits());

    let handle = ModelHandle::new();
    handle.initialize_from_path(&path).unwrap();
    let served = handle.predict(&record).unwrap();
    assert_eq!(served.churn_probability.to_bits(), before.to_bits());
}

#[test]
fn test_end_to_end_record() {
    let record = month_to_month_record();
    let derived = FeatureEngineer::new().derive(&record).unwrap();
    assert_eq!(derived.avg_charges_per_month, 50.0);
    assert_eq!(derived.tenure_group, 1);
    assert_eq!(derived.family_size, 0);

    let outcome = train_fixture();
    let handle = ModelHandle::from_pipeline(outcome.pipeline, RiskPolicy::default()).unwrap();
    let first = handle.predict(&record).unwrap();
    let second = handle.predict(&record).unwrap();

    assert_eq!(first, second);
    assert!((0.0..=1.0).contains(&first.churn_probability));
    let expected_risk = if first.churn_probability > 0.7 { "Critical" } else { "Safe" };
    assert_eq!(first.risk_level, expected_risk);
    let expected_label = if first.churn_probability >= 0.5 { "Yes" } else { "No" };
    assert_eq!(first.churn_prediction, expected_label);
}

#[test]
fn test_unknown_categories_do_not_fail() {
    let outcome = train_fixture();
    let mut record = month_to_month_record();
    record.contract = "Three year".to_string();
    record.payment_method = "Cryptocurrency".to_string();

    let probability = outcome.pipeline.predict_record_proba(&record).unwrap();
    assert!((0.0..=1.0).contains(&probability));
}

#[test]
fn test_handle_states() {
    let handle = ModelHandle::new();
    let err = handle.predict(&month_to_month_record()).unwrap_err();
    assert_eq!(err.error_code(), "MODEL_NOT_READY");

    let err = handle
        .initialize_from_path(fixtures_path().join("missing_model.json"))
        .unwrap_err();
    assert_eq!(err.error_code(), "ARTIFACT_NOT_FOUND");

    let err = handle.predict(&month_to_month_record()).unwrap_err();
    assert_eq!(err.error_code(), "MODEL_UNAVAILABLE");
    assert!(err.is_service_unavailable());
}
