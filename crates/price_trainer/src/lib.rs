//! Export price trainer
//!
//! Loads export records from CSV, trains linear price models through the
//! core pipeline and persists reproducible, hashed artifacts.

pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod pipeline;

use std::path::Path;

pub use config::{ConfigValidationResult, TrainerConfig};
pub use dataset::{export_predictions, load_records, parse_records, DatasetSummary, LoadReport};
pub use deterministic::{holdout_split, shuffle, LcgRng};
pub use errors::{Result, TrainerError};
pub use pipeline::{default_model_id, PipelineOptions, PipelineOutcome, TrainingPipeline};

/// Train a model directly from a CSV file using the provided configuration.
///
/// The configured holdout ratio, when non-zero, is carved out of the file.
pub fn train_model_from_csv(path: &Path, config: &TrainerConfig) -> Result<PipelineOutcome> {
    let validation = config.validate();
    if !validation.is_valid() {
        return Err(TrainerError::Config(validation.errors.join("; ")));
    }

    let report = load_records(path)?;
    let pipeline = TrainingPipeline::new(config.pipeline_options(default_model_id()));
    pipeline.run_with_split(report.records)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
