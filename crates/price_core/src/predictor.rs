//! Prediction interface and the linear model adapter behind it

use crate::artifact::ModelArtifact;
use crate::errors::{PriceCoreError, Result};
use crate::features::FeatureEncoder;
use crate::linear::LinearRegressionModel;
use crate::normalization::NormalizationStats;
use crate::prediction::{PredictionStatus, PricePrediction, MAX_PREDICTED_PRICE};
use crate::types::ExportRecord;
use chrono::Days;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Anything able to forecast prices for export records
pub trait PricePredictor: Send + Sync {
    fn model_name(&self) -> &str;

    fn predict(&self, record: &ExportRecord) -> Result<PricePrediction>;

    /// Predict every record in order. Empty input is rejected.
    fn predict_batch(&self, records: &[ExportRecord]) -> Result<Vec<PricePrediction>> {
        if records.is_empty() {
            return Err(PriceCoreError::invalid("no records to predict"));
        }
        records.iter().map(|r| self.predict(r)).collect()
    }

    /// Training accuracy in `[0, 1]`
    fn accuracy(&self) -> f64;
}

/// Tunables for turning raw model output into predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorSettings {
    pub model_name: String,
    /// Forecast date offset from the record date
    pub horizon_days: u32,
    /// Confidence below this marks a prediction LOW_CONFIDENCE
    pub low_confidence_threshold: f64,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            model_name: "Simple-Linear-Predictor".to_string(),
            horizon_days: 30,
            low_confidence_threshold: 0.6,
        }
    }
}

/// Serves a persisted linear model: encode, normalize, predict
#[derive(Debug, Clone)]
pub struct LinearPricePredictor {
    encoder: FeatureEncoder,
    stats: NormalizationStats,
    model: LinearRegressionModel,
    settings: PredictorSettings,
}

impl LinearPricePredictor {
    pub fn new(artifact: &ModelArtifact, settings: PredictorSettings) -> Result<Self> {
        artifact.validate()?;
        if settings.model_name.trim().is_empty() {
            return Err(PriceCoreError::invalid("model name cannot be blank"));
        }
        if !(0.0..=1.0).contains(&settings.low_confidence_threshold) {
            return Err(PriceCoreError::invalid(format!(
                "low confidence threshold must be within [0, 1], got {}",
                settings.low_confidence_threshold
            )));
        }

        Ok(Self {
            encoder: artifact.encoder(),
            stats: artifact.normalization.clone(),
            model: artifact.model()?,
            settings,
        })
    }

    pub fn settings(&self) -> &PredictorSettings {
        &self.settings
    }

    /// Unclamped model output for a record
    pub fn raw_price(&self, record: &ExportRecord) -> Result<f64> {
        let encoded = self.encoder.encode(record);
        let normalized = self.stats.apply(&encoded)?;
        Ok(self.model.predict(&normalized))
    }
}

impl PricePredictor for LinearPricePredictor {
    fn model_name(&self) -> &str {
        &self.settings.model_name
    }

    fn predict(&self, record: &ExportRecord) -> Result<PricePrediction> {
        let raw = self.raw_price(record)?;
        let date = record
            .date()
            .checked_add_days(Days::new(u64::from(self.settings.horizon_days)))
            .unwrap_or_else(|| record.date());

        if !raw.is_finite() || raw > MAX_PREDICTED_PRICE {
            warn!(
                "Prediction for {} on {} out of range: {}",
                record.product_type(),
                record.date(),
                raw
            );
            return PricePrediction::failed(date, record.product_type(), &self.settings.model_name);
        }

        let confidence = self.model.training_accuracy();
        let (price, status) = if raw < 0.0 {
            (0.0, PredictionStatus::LowConfidence)
        } else if confidence < self.settings.low_confidence_threshold {
            (raw, PredictionStatus::LowConfidence)
        } else {
            (raw, PredictionStatus::Completed)
        };

        PricePrediction::new(
            date,
            record.product_type(),
            price,
            confidence,
            &self.settings.model_name,
            status,
        )
    }

    fn accuracy(&self) -> f64 {
        self.model.training_accuracy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ARTIFACT_FORMAT_VERSION;
    use crate::features::{ProductEncoding, COUNTRY_HASH_VERSION, FEATURE_COUNT};
    use crate::types::{MarketIndicator, ProductType};
    use chrono::{NaiveDate, Utc};

    fn artifact(bias: f64, accuracy: f64) -> ModelArtifact {
        ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_id: "test".into(),
            trained_at: Utc::now(),
            encoding: ProductEncoding::Folded,
            country_hash_version: COUNTRY_HASH_VERSION,
            normalization: NormalizationStats {
                means: vec![0.0; FEATURE_COUNT],
                std_devs: vec![1.0; FEATURE_COUNT],
                constant_dims: vec![],
            },
            weights: vec![0.0; FEATURE_COUNT],
            bias,
            training_accuracy: accuracy,
            sample_count: 10,
            epochs: 100,
            learning_rate: 0.01,
        }
    }

    fn record() -> ExportRecord {
        ExportRecord::new(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            ProductType::Wheat,
            310.0,
            5000.0,
            "Egypt",
            MarketIndicator::Stable,
            0.05,
            3.1,
        )
        .unwrap()
    }

    #[test]
    fn test_completed_prediction() {
        let predictor = artifact(1500.0, 0.8)
            .predictor(PredictorSettings::default())
            .unwrap();
        let prediction = predictor.predict(&record()).unwrap();

        assert_eq!(prediction.predicted_price(), 1500.0);
        assert_eq!(prediction.confidence(), 0.8);
        assert_eq!(prediction.status(), PredictionStatus::Completed);
        assert_eq!(
            prediction.prediction_date(),
            NaiveDate::from_ymd_opt(2024, 2, 14).unwrap()
        );
        assert_eq!(prediction.model_name(), "Simple-Linear-Predictor");
        assert_eq!(predictor.accuracy(), 0.8);
    }

    #[test]
    fn test_low_confidence_and_negative_output() {
        let weak = artifact(1500.0, 0.5)
            .predictor(PredictorSettings::default())
            .unwrap();
        assert_eq!(
            weak.predict(&record()).unwrap().status(),
            PredictionStatus::LowConfidence
        );

        let negative = artifact(-100.0, 0.9)
            .predictor(PredictorSettings::default())
            .unwrap();
        let prediction = negative.predict(&record()).unwrap();
        assert_eq!(prediction.predicted_price(), 0.0);
        assert_eq!(prediction.status(), PredictionStatus::LowConfidence);
    }

    #[test]
    fn test_out_of_range_output_fails() {
        let predictor = artifact(2_000_000.0, 0.9)
            .predictor(PredictorSettings::default())
            .unwrap();
        let prediction = predictor.predict(&record()).unwrap();
        assert_eq!(prediction.status(), PredictionStatus::Failed);
        assert_eq!(prediction.predicted_price(), 0.0);
    }

    #[test]
    fn test_batch_and_settings() {
        let settings = PredictorSettings {
            model_name: "nightly".into(),
            horizon_days: 0,
            low_confidence_threshold: 0.6,
        };
        let predictor = artifact(900.0, 0.7).predictor(settings).unwrap();

        let batch = predictor.predict_batch(&[record(), record()]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].prediction_date(), record().date());
        assert_eq!(batch[1].model_name(), "nightly");

        assert!(predictor.predict_batch(&[]).is_err());

        let blank = PredictorSettings {
            model_name: " ".into(),
            ..PredictorSettings::default()
        };
        assert!(artifact(1.0, 0.7).predictor(blank).is_err());
    }
}
