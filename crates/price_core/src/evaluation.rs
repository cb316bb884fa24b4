//! Error metrics for trained models and predictors

use crate::errors::{PriceCoreError, Result};
use crate::features::FeatureVector;
use crate::linear::LinearRegressionModel;
use crate::predictor::PricePredictor;
use crate::types::ExportRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Coarse quality band derived from MAPE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl QualityGrade {
    /// `< 10%` excellent, `< 20%` good, `< 30%` acceptable, otherwise poor
    pub fn from_mape(mape_percent: f64) -> Self {
        match mape_percent {
            m if m < 10.0 => QualityGrade::Excellent,
            m if m < 20.0 => QualityGrade::Good,
            m if m < 30.0 => QualityGrade::Acceptable,
            _ => QualityGrade::Poor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityGrade::Excellent => "excellent",
            QualityGrade::Good => "good",
            QualityGrade::Acceptable => "acceptable",
            QualityGrade::Poor => "poor",
        }
    }
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regression error metrics over one evaluation set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub mean_absolute_error: f64,
    pub mean_squared_error: f64,
    pub root_mean_squared_error: f64,
    /// Percent, computed over non-zero targets only
    pub mean_absolute_percentage_error: f64,
    /// Unclamped coefficient of determination
    pub r_squared: f64,
    pub sample_count: usize,
    /// Targets excluded from MAPE because they are zero
    pub zero_target_count: usize,
}

impl EvaluationReport {
    /// Compute metrics from paired predictions and actual values
    pub fn from_predictions(predicted: &[f64], actual: &[f64]) -> Result<Self> {
        if actual.is_empty() {
            return Err(PriceCoreError::invalid("cannot evaluate an empty set"));
        }
        if predicted.len() != actual.len() {
            return Err(PriceCoreError::invalid(format!(
                "{} predictions for {} targets",
                predicted.len(),
                actual.len()
            )));
        }

        let n = actual.len() as f64;
        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        let mut pct_sum = 0.0;
        let mut pct_count = 0usize;

        for (&p, &a) in predicted.iter().zip(actual) {
            let err = p - a;
            abs_sum += err.abs();
            sq_sum += err * err;
            if a != 0.0 {
                pct_sum += (err / a).abs();
                pct_count += 1;
            }
        }

        let zero_target_count = actual.len() - pct_count;
        if zero_target_count > 0 {
            warn!(
                "{} zero-valued targets excluded from MAPE",
                zero_target_count
            );
        }

        let mape = if pct_count == 0 {
            f64::INFINITY
        } else {
            pct_sum / pct_count as f64 * 100.0
        };

        let mse = sq_sum / n;
        let mean = actual.iter().sum::<f64>() / n;
        let total = actual.iter().map(|a| (a - mean).powi(2)).sum::<f64>();
        let r_squared = if total > 0.0 {
            1.0 - sq_sum / total
        } else if sq_sum == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self {
            mean_absolute_error: abs_sum / n,
            mean_squared_error: mse,
            root_mean_squared_error: mse.sqrt(),
            mean_absolute_percentage_error: mape,
            r_squared,
            sample_count: actual.len(),
            zero_target_count,
        })
    }

    pub fn quality(&self) -> QualityGrade {
        QualityGrade::from_mape(self.mean_absolute_percentage_error)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE={:.2} MSE={:.2} RMSE={:.2} MAPE={:.2}% R2={:.4} n={} ({})",
            self.mean_absolute_error,
            self.mean_squared_error,
            self.root_mean_squared_error,
            self.mean_absolute_percentage_error,
            self.r_squared,
            self.sample_count,
            self.quality()
        )
    }
}

/// Scores models against held-out data
pub struct Evaluator;

impl Evaluator {
    /// Evaluate a trained model on already-normalized features
    pub fn evaluate(
        model: &LinearRegressionModel,
        features: &[FeatureVector],
        targets: &[f64],
    ) -> Result<EvaluationReport> {
        if !model.is_trained() {
            return Err(PriceCoreError::invalid("cannot evaluate an untrained model"));
        }
        if features.len() != targets.len() {
            return Err(PriceCoreError::invalid(format!(
                "{} feature vectors for {} targets",
                features.len(),
                targets.len()
            )));
        }

        let predicted = model.predict_all(features);
        let report = EvaluationReport::from_predictions(&predicted, targets)?;
        debug!("Evaluation: {}", report);
        Ok(report)
    }

    /// Evaluate any predictor on raw records against known prices.
    ///
    /// Failed predictions count with their zero price.
    pub fn evaluate_predictor(
        predictor: &dyn PricePredictor,
        records: &[ExportRecord],
        actual: &[f64],
    ) -> Result<EvaluationReport> {
        if records.len() != actual.len() {
            return Err(PriceCoreError::invalid(format!(
                "{} records for {} actual prices",
                records.len(),
                actual.len()
            )));
        }

        let predicted: Vec<f64> = predictor
            .predict_batch(records)?
            .iter()
            .map(|p| p.predicted_price())
            .collect();
        let report = EvaluationReport::from_predictions(&predicted, actual)?;
        debug!("{}: {}", predictor.model_name(), report);
        Ok(report)
    }
}

/// Sort named reports by ascending MAPE (best first)
pub fn rank_by_mape(mut reports: Vec<(String, EvaluationReport)>) -> Vec<(String, EvaluationReport)> {
    reports.sort_by(|a, b| {
        a.1.mean_absolute_percentage_error
            .total_cmp(&b.1.mean_absolute_percentage_error)
    });
    reports
}
