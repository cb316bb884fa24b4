//! Price predictions handed to reporting and export consumers

use crate::errors::{PriceCoreError, Result};
use crate::types::ProductType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Upper bound accepted for a predicted price per ton
pub const MAX_PREDICTED_PRICE: f64 = 1_000_000.0;

/// Header line of the prediction CSV export
pub const PREDICTION_CSV_HEADER: &str =
    "prediction_date,product_type,predicted_price,confidence,model_name,status";

/// Processing status of a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionStatus {
    Pending,
    Completed,
    Failed,
    LowConfidence,
}

impl PredictionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionStatus::Pending => "PENDING",
            PredictionStatus::Completed => "COMPLETED",
            PredictionStatus::Failed => "FAILED",
            PredictionStatus::LowConfidence => "LOW_CONFIDENCE",
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, PredictionStatus::Completed | PredictionStatus::Failed)
    }

    /// Usable for analysis (possibly with caution)
    pub fn is_valid(self) -> bool {
        matches!(self, PredictionStatus::Completed | PredictionStatus::LowConfidence)
    }

    pub fn has_error(self) -> bool {
        self == PredictionStatus::Failed
    }

    pub fn requires_attention(self) -> bool {
        matches!(self, PredictionStatus::LowConfidence | PredictionStatus::Pending)
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single forecast. Validated on construction, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePrediction {
    prediction_date: NaiveDate,
    product_type: ProductType,
    predicted_price: f64,
    confidence: f64,
    model_name: String,
    status: PredictionStatus,
}

impl PricePrediction {
    pub fn new(
        prediction_date: NaiveDate,
        product_type: ProductType,
        predicted_price: f64,
        confidence: f64,
        model_name: impl Into<String>,
        status: PredictionStatus,
    ) -> Result<Self> {
        let model_name = model_name.into().trim().to_string();
        if model_name.is_empty() {
            return Err(PriceCoreError::invalid("model name cannot be blank"));
        }
        if !predicted_price.is_finite() || predicted_price < 0.0 {
            return Err(PriceCoreError::invalid(format!(
                "predicted price must be a finite value >= 0, got {}",
                predicted_price
            )));
        }
        if predicted_price > MAX_PREDICTED_PRICE {
            return Err(PriceCoreError::invalid(format!(
                "predicted price {:.2} exceeds {:.0}",
                predicted_price, MAX_PREDICTED_PRICE
            )));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(PriceCoreError::invalid(format!(
                "confidence must be within [0, 1], got {}",
                confidence
            )));
        }

        Ok(Self {
            prediction_date,
            product_type,
            predicted_price,
            confidence,
            model_name,
            status,
        })
    }

    /// Zero-price, zero-confidence prediction marking a failure
    pub fn failed(
        prediction_date: NaiveDate,
        product_type: ProductType,
        model_name: impl Into<String>,
    ) -> Result<Self> {
        Self::new(
            prediction_date,
            product_type,
            0.0,
            0.0,
            model_name,
            PredictionStatus::Failed,
        )
    }

    pub fn with_status(mut self, status: PredictionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn prediction_date(&self) -> NaiveDate {
        self.prediction_date
    }

    pub fn product_type(&self) -> ProductType {
        self.product_type
    }

    pub fn predicted_price(&self) -> f64 {
        self.predicted_price
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn status(&self) -> PredictionStatus {
        self.status
    }

    pub fn is_reliable(&self) -> bool {
        self.status == PredictionStatus::Completed && self.confidence >= 0.8
    }

    pub fn requires_manual_verification(&self) -> bool {
        self.confidence < 0.6 || self.status == PredictionStatus::LowConfidence
    }

    /// `[price - price·margin·confidence, price + price·margin·confidence]`,
    /// lower bound clamped at zero
    pub fn confidence_interval(&self, margin: f64) -> Result<(f64, f64)> {
        if !(0.0..=1.0).contains(&margin) {
            return Err(PriceCoreError::invalid(format!(
                "margin must be within [0, 1], got {}",
                margin
            )));
        }
        let range = self.predicted_price * margin * self.confidence;
        Ok((
            (self.predicted_price - range).max(0.0),
            self.predicted_price + range,
        ))
    }

    /// 1 (very low risk) to 5 (very high risk)
    pub fn risk_level(&self) -> u8 {
        match self.confidence {
            c if c >= 0.9 => 1,
            c if c >= 0.8 => 2,
            c if c >= 0.7 => 3,
            c if c >= 0.6 => 4,
            _ => 5,
        }
    }

    /// Fields of one export row, in header order
    pub fn csv_fields(&self) -> [String; 6] {
        [
            self.prediction_date.to_string(),
            self.product_type.to_string(),
            format!("{:.2}", self.predicted_price),
            format!("{:.4}", self.confidence),
            self.model_name.clone(),
            self.status.to_string(),
        ]
    }
}

/// Write predictions as CSV with a header line. Empty input is rejected.
///
/// Fields containing separators or quotes are quoted.
pub fn write_predictions_csv<W: Write>(writer: W, predictions: &[PricePrediction]) -> Result<()> {
    if predictions.is_empty() {
        return Err(PriceCoreError::invalid("no predictions to export"));
    }

    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    csv_writer.write_record(PREDICTION_CSV_HEADER.split(','))?;
    for prediction in predictions {
        csv_writer.write_record(prediction.csv_fields())?;
    }
    csv_writer.flush()?;
    Ok(())
}
