//! Integration test: loading, schema checks and splitting

mod common;

use common::{transactions, transactions_dataset, write_transactions};
use fraudlab::data::{initial_split, Class, ColumnKind, DatasetLoader, DatasetSummary, Schema};
use fraudlab::FraudlabError;
use polars::prelude::*;

#[test]
fn test_fraud_loader_drops_identifiers() {
    let data = transactions_dataset(200);
    assert_eq!(data.n_rows(), 200);
    assert_eq!(
        data.column_names(),
        vec![
            "step",
            "type",
            "amount",
            "oldbalanceOrg",
            "newbalanceOrig",
            "oldbalanceDest",
            "newbalanceDest"
        ]
    );
    assert_eq!(data.categorical_names(), vec!["type"]);
    assert_eq!(data.class_counts()[&Class::Positive], 20);
    assert_eq!(data.target().unwrap().levels.positive, "1");
}

#[test]
fn test_load_csv_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transactions.csv");
    write_transactions(&path, 120);

    let data = DatasetLoader::fraud().load_csv(&path).unwrap();
    assert_eq!(data.n_rows(), 120);
    assert_eq!(data.n_cols(), 7);

    let features = DatasetLoader::fraud().load_features(&path).unwrap();
    assert!(features.target().is_none());
    assert_eq!(features.n_cols(), 7);
}

#[test]
fn test_missing_target_is_schema_error() {
    let df = transactions(50).drop("isFraud").unwrap();
    let err = DatasetLoader::fraud().from_dataframe(&df, true).unwrap_err();
    assert!(matches!(err, FraudlabError::SchemaMismatch { .. }));
}

#[test]
fn test_wrong_column_kind_is_schema_error() {
    let df = df!(
        "step" => &["a", "b", "c", "d"],
        "type" => &["PAYMENT", "TRANSFER", "PAYMENT", "DEBIT"],
        "amount" => &[1.0, 2.0, 3.0, 4.0],
        "oldbalanceOrg" => &[1.0, 2.0, 3.0, 4.0],
        "newbalanceOrig" => &[1.0, 2.0, 3.0, 4.0],
        "oldbalanceDest" => &[1.0, 2.0, 3.0, 4.0],
        "newbalanceDest" => &[1.0, 2.0, 3.0, 4.0],
        "isFraud" => &[0i64, 1, 0, 1]
    )
    .unwrap();
    let err = DatasetLoader::fraud().from_dataframe(&df, true).unwrap_err();
    match err {
        FraudlabError::SchemaMismatch { column, .. } => assert_eq!(column, "step"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_nulls_rejected() {
    let df = df!(
        "x" => &[Some(1.0), None, Some(3.0)],
        "y" => &[0i64, 1, 0]
    )
    .unwrap();
    let err = DatasetLoader::new("y").from_dataframe(&df, true).unwrap_err();
    assert!(matches!(err, FraudlabError::DataError(_)));
}

#[test]
fn test_custom_positive_label() {
    let df = df!(
        "x" => &[1.0, 2.0, 3.0, 4.0],
        "label" => &["legit", "fraud", "legit", "fraud"]
    )
    .unwrap();
    let data = DatasetLoader::new("label")
        .with_positive_label("fraud")
        .from_dataframe(&df, true)
        .unwrap();
    assert_eq!(data.labels().unwrap()[1], Class::Positive);
    assert_eq!(data.target().unwrap().levels.negative, "legit");
}

#[test]
fn test_stratified_split_preserves_proportion() {
    let data = transactions_dataset(400);
    let split = initial_split(&data, 0.75, 42).unwrap();
    assert_eq!(split.n_train() + split.n_test(), 400);

    let train = split.training(&data).unwrap();
    let test = split.testing(&data).unwrap();
    assert_eq!(train.class_counts()[&Class::Positive], 30);
    assert_eq!(test.class_counts()[&Class::Positive], 10);
    assert_eq!(train.class_counts()[&Class::Negative], 270);

    let again = initial_split(&data, 0.75, 42).unwrap();
    assert_eq!(split.train_indices, again.train_indices);
}

#[test]
fn test_split_too_few_positives_is_degenerate() {
    let data = transactions_dataset(10);
    let err = initial_split(&data, 0.75, 1).unwrap_err();
    assert!(matches!(err, FraudlabError::DegenerateSplit { .. }));
}

#[test]
fn test_schema_check_reports_mismatches() {
    let data = transactions_dataset(40);
    let schema = data.schema();
    assert!(schema.check(&data).is_ok());

    let narrower = Schema::new(vec![("amount".to_string(), ColumnKind::Numeric)]);
    assert!(narrower.check(&data).is_err());
    assert!(schema.check(&data.drop_features(&["amount".to_string()])).is_err());
}

#[test]
fn test_summary_and_dataframe_round_trip() {
    let data = transactions_dataset(100);
    let summary = DatasetSummary::from_dataset(&data);
    assert_eq!(summary.positive_rate(), Some(0.1));
    let kinds = summary.column("type").unwrap().categories.clone().unwrap();
    assert!(kinds.contains(&"TRANSFER".to_string()));

    let df = data.to_dataframe().unwrap();
    assert_eq!(df.height(), 100);
    let again = DatasetLoader::fraud().from_dataframe(&df, true).unwrap();
    assert_eq!(again.labels().unwrap(), data.labels().unwrap());
}
