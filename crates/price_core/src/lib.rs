//! Export price modelling core
//!
//! Turns agricultural export records into fixed-width feature vectors,
//! normalizes them consistently between training and inference, fits a
//! linear model by batch gradient descent and scores it.
//!
//! Modules:
//! - `types`: Export records, products and market indicators
//! - `features`: Record to feature vector encoding
//! - `normalization`: Z-score statistics fitted on training data
//! - `linear`: Linear regression model and gradient descent training
//! - `evaluation`: Error metrics and quality grades
//! - `prediction`: Prediction records, statuses and CSV export
//! - `predictor`: `PricePredictor` trait and the linear backend
//! - `artifact`: Persisted model bundle, hashing and text records
//! - `serde_canon`: Canonical JSON for deterministic hashing

pub mod artifact;
pub mod errors;
pub mod evaluation;
pub mod features;
pub mod linear;
pub mod normalization;
pub mod prediction;
pub mod predictor;
pub mod serde_canon;
pub mod types;

pub use artifact::{ModelArtifact, ARTIFACT_FORMAT_VERSION};
pub use errors::{PriceCoreError, Result};
pub use evaluation::{rank_by_mape, EvaluationReport, Evaluator, QualityGrade};
pub use features::{
    country_bucket, extract_targets, FeatureEncoder, FeatureVector, ProductEncoding,
    COUNTRY_HASH_VERSION, FEATURE_COUNT,
};
pub use linear::{fit_quality, LinearRegressionModel, ModelState, TrainingParams, TrainingSummary};
pub use normalization::{FeatureNormalizer, NormalizationStats, STD_DEV_FLOOR};
pub use prediction::{
    write_predictions_csv, PredictionStatus, PricePrediction, MAX_PREDICTED_PRICE,
    PREDICTION_CSV_HEADER,
};
pub use predictor::{LinearPricePredictor, PricePredictor, PredictorSettings};
pub use types::{ExportRecord, MarketIndicator, ProductType};

/// Crate version string recorded by tooling
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
