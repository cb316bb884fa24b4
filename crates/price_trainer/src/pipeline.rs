//! Training pipeline: encode, fit normalizer, train, evaluate
//!
//! Each run owns its encoder, statistics and model. Holdout records are
//! always normalized with the statistics fitted on the training records.

use crate::deterministic::holdout_split;
use crate::errors::{Result, TrainerError};
use chrono::Utc;
use export_price_core::{
    extract_targets, EvaluationReport, Evaluator, ExportRecord, FeatureEncoder,
    FeatureNormalizer, LinearRegressionModel, ModelArtifact, PriceCoreError, ProductEncoding,
    ProductType, TrainingParams, TrainingSummary,
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Settings for one pipeline instance
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub model_id: String,
    pub params: TrainingParams,
    pub encoding: ProductEncoding,
    pub min_samples_warning: usize,
    /// Used by `run_per_product` to carve a holdout out of each group
    pub holdout_ratio: f64,
    pub seed: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            params: TrainingParams::default(),
            encoding: ProductEncoding::default(),
            min_samples_warning: 50,
            holdout_ratio: 0.0,
            seed: 42,
        }
    }
}

/// Timestamped identifier for a new model
pub fn default_model_id() -> String {
    format!("linear-{}", Utc::now().format("%Y%m%dT%H%M%SZ"))
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub artifact: ModelArtifact,
    pub summary: TrainingSummary,
    /// Present when holdout records were supplied
    pub evaluation: Option<EvaluationReport>,
}

#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    options: PipelineOptions,
}

impl TrainingPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Train on `train` and, when non-empty, evaluate on `holdout`
    #[instrument(skip(self, train, holdout), fields(model_id = %self.options.model_id, samples = train.len()))]
    pub fn run(&self, train: &[ExportRecord], holdout: &[ExportRecord]) -> Result<PipelineOutcome> {
        if train.is_empty() {
            return Err(TrainerError::Core(PriceCoreError::InvalidInput(
                "training set is empty".into(),
            )));
        }
        if train.len() < self.options.min_samples_warning {
            warn!(
                "Only {} training records (recommended minimum {})",
                train.len(),
                self.options.min_samples_warning
            );
        }
        self.warn_on_collisions(train);

        let encoder = FeatureEncoder::new(self.options.encoding);
        let encoded = encoder.encode_all(train);
        let stats = FeatureNormalizer::new().fit(&encoded)?;
        let features = stats.apply_all(&encoded)?;
        let targets = extract_targets(train);

        let mut model = LinearRegressionModel::new(encoder.width());
        let summary = model.train(&features, &targets, &self.options.params)?;
        let artifact = ModelArtifact::new(
            self.options.model_id.clone(),
            &encoder,
            stats,
            &model,
            &summary,
        )?;

        let evaluation = if holdout.is_empty() {
            None
        } else {
            let holdout_features = artifact.prepare(holdout)?;
            let report =
                Evaluator::evaluate(&model, &holdout_features, &extract_targets(holdout))?;
            info!("Holdout evaluation: {}", report);
            Some(report)
        };

        info!(
            "Model {} trained on {} records: accuracy {:.2}%, final loss {:.4}",
            artifact.model_id,
            summary.sample_count,
            summary.training_accuracy * 100.0,
            summary.final_loss
        );

        Ok(PipelineOutcome {
            artifact,
            summary,
            evaluation,
        })
    }

    /// Split `records` with the configured holdout ratio, then run
    pub fn run_with_split(&self, records: Vec<ExportRecord>) -> Result<PipelineOutcome> {
        let (train, holdout) =
            holdout_split(records, self.options.holdout_ratio, self.options.seed);
        self.run(&train, &holdout)
    }

    /// One independent model per product type present in `records`.
    ///
    /// Groups train in parallel; a failing group does not affect the others.
    #[instrument(skip(self, records), fields(samples = records.len()))]
    pub fn run_per_product(
        &self,
        records: &[ExportRecord],
    ) -> Vec<(ProductType, Result<PipelineOutcome>)> {
        let mut groups: BTreeMap<ProductType, Vec<ExportRecord>> = BTreeMap::new();
        for record in records {
            groups
                .entry(record.product_type())
                .or_default()
                .push(record.clone());
        }
        info!("Training {} per-product models", groups.len());

        groups
            .into_par_iter()
            .map(|(product, group)| {
                let mut options = self.options.clone();
                options.model_id = format!(
                    "{}-{}",
                    self.options.model_id,
                    product.as_str().to_ascii_lowercase()
                );
                let outcome = TrainingPipeline::new(options).run_with_split(group);
                (product, outcome)
            })
            .collect()
    }

    fn warn_on_collisions(&self, records: &[ExportRecord]) {
        for (a, b) in self.options.encoding.colliding_products() {
            let has_a = records.iter().any(|r| r.product_type() == a);
            let has_b = records.iter().any(|r| r.product_type() == b);
            if has_a && has_b {
                warn!(
                    "{} encoding gives {} and {} identical product features",
                    self.options.encoding, a, b
                );
            }
        }
    }
}
