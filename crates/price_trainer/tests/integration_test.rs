//! Integration tests for the export price trainer
//!
//! Runs the CSV to artifact to prediction flow end to end.

use anyhow::Result;
use export_price_core::{ModelArtifact, PredictionStatus, PricePredictor, ProductEncoding};
use export_price_trainer::{
    export_predictions, load_records, train_model_from_csv, TrainerConfig, TrainerError,
};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

const PRODUCTS: [&str; 6] = ["OLIVE_OIL", "DATES", "CITRUS_FRUITS", "WHEAT", "TOMATOES", "PEPPERS"];
const INDICATORS: [&str; 5] = ["STABLE", "VOLATILE", "RISING", "FALLING", "UNPREDICTABLE"];

/// Price is linear in volume and month
fn create_synthetic_dataset() -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "date,product,price,volume,country,indicator,volatility,exchange_rate")?;

    for i in 0..60 {
        let month = i % 12 + 1;
        let volume = 100.0 + 10.0 * i as f64;
        let price = 500.0 + 2.0 * volume + 40.0 * month as f64;
        writeln!(
            file,
            "2020-{:02}-01,{},{},{},Italy,{},0.1,3.0",
            month,
            PRODUCTS[i % 6],
            price,
            volume,
            INDICATORS[i % 5]
        )?;
    }
    writeln!(file, "2020-01-01,COFFEE,100,1,Italy,STABLE")?;

    file.flush()?;
    Ok(file)
}

fn config() -> TrainerConfig {
    let mut config = TrainerConfig::default();
    config.training.epochs = 2000;
    config.training.learning_rate = 0.1;
    config.split.ratio = 0.2;
    config
}

#[test]
fn test_train_from_csv_with_holdout() -> Result<()> {
    let file = create_synthetic_dataset()?;
    let outcome = train_model_from_csv(file.path(), &config())?;

    assert_eq!(outcome.summary.sample_count, 48);
    assert!(outcome.artifact.training_accuracy > 0.999);

    let evaluation = outcome.evaluation.expect("holdout evaluation");
    assert_eq!(evaluation.sample_count, 12);
    assert!(evaluation.mean_absolute_percentage_error < 1.0);
    Ok(())
}

#[test]
fn test_deterministic_training() -> Result<()> {
    let file = create_synthetic_dataset()?;

    let first = train_model_from_csv(file.path(), &config())?;
    let second = train_model_from_csv(file.path(), &config())?;

    assert_eq!(first.artifact.weights, second.artifact.weights, "Weights should be identical");
    assert_eq!(first.artifact.bias, second.artifact.bias, "Bias should be identical");
    assert_eq!(first.artifact.normalization, second.artifact.normalization);
    assert_eq!(first.summary.loss_history, second.summary.loss_history);
    Ok(())
}

#[test]
fn test_persist_and_predict() -> Result<()> {
    let file = create_synthetic_dataset()?;
    let mut config = config();
    config.features.encoding = ProductEncoding::OneHot;
    config.prediction.model_name = "integration".into();

    let outcome = train_model_from_csv(file.path(), &config)?;
    assert_eq!(outcome.artifact.weights.len(), 13);

    let dir = tempdir()?;
    let model_path = dir.path().join("active.json");
    let hash = outcome.artifact.save_json(&model_path)?;
    let artifact = ModelArtifact::load_verified(&model_path, &hash)?;

    let records = load_records(file.path())?.records;
    let predictor = artifact.predictor(config.prediction.clone())?;
    let predictions = predictor.predict_batch(&records)?;
    assert_eq!(predictions.len(), 60);
    assert!(predictions
        .iter()
        .all(|p| p.status() == PredictionStatus::Completed && p.model_name() == "integration"));

    let csv_path = dir.path().join("predictions.csv");
    export_predictions(&csv_path, &predictions)?;
    let exported = std::fs::read_to_string(&csv_path)?;
    assert_eq!(exported.lines().count(), 61);
    Ok(())
}

#[test]
fn test_trained_model_reloads_exactly_with_default_config() -> Result<()> {
    let file = create_synthetic_dataset()?;
    let outcome = train_model_from_csv(file.path(), &TrainerConfig::default())?;

    let dir = tempdir()?;
    let model_path = dir.path().join("active.json");
    let hash = outcome.artifact.save_json(&model_path)?;
    std::fs::write(dir.path().join("active.hash"), &hash)?;

    let expected = std::fs::read_to_string(dir.path().join("active.hash"))?;
    let reloaded = ModelArtifact::load_verified(&model_path, &expected)?;
    assert_eq!(reloaded.weights, outcome.artifact.weights);
    assert_eq!(reloaded.normalization, outcome.artifact.normalization);
    assert_eq!(reloaded, outcome.artifact);
    Ok(())
}

#[test]
fn test_invalid_configuration_is_rejected() -> Result<()> {
    let file = create_synthetic_dataset()?;
    let mut config = config();
    config.training.learning_rate = 0.0;

    let result = train_model_from_csv(file.path(), &config);
    assert!(matches!(result, Err(TrainerError::Config(_))));
    Ok(())
}
