//! Persisted model: weights, normalization statistics and provenance
//!
//! Artifacts are stored as canonical JSON so their BLAKE3 hash is stable,
//! and can also be rendered as a flat `key: value` text record for people
//! and simple tooling.

use crate::errors::{PriceCoreError, Result};
use crate::features::{FeatureEncoder, FeatureVector, ProductEncoding, COUNTRY_HASH_VERSION};
use crate::linear::{LinearRegressionModel, TrainingSummary};
use crate::normalization::NormalizationStats;
use crate::predictor::{LinearPricePredictor, PredictorSettings};
use crate::serde_canon::{hash_bytes_hex, hash_canonical_hex, to_canonical_json};
use crate::types::ExportRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Current artifact layout version
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

const TEXT_RECORD_HEADER: &str = "# export price model";

/// Everything needed to reproduce predictions of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model_id: String,
    pub trained_at: DateTime<Utc>,
    pub encoding: ProductEncoding,
    pub country_hash_version: u32,
    pub normalization: NormalizationStats,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub training_accuracy: f64,
    pub sample_count: usize,
    pub epochs: usize,
    pub learning_rate: f64,
}

impl ModelArtifact {
    /// Capture a freshly trained model
    pub fn new(
        model_id: impl Into<String>,
        encoder: &FeatureEncoder,
        normalization: NormalizationStats,
        model: &LinearRegressionModel,
        summary: &TrainingSummary,
    ) -> Result<Self> {
        if !model.is_trained() {
            return Err(PriceCoreError::invalid("cannot persist an untrained model"));
        }

        let artifact = Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_id: model_id.into(),
            trained_at: Utc::now(),
            encoding: encoder.encoding(),
            country_hash_version: COUNTRY_HASH_VERSION,
            normalization,
            weights: model.weights().to_vec(),
            bias: model.bias(),
            training_accuracy: model.training_accuracy(),
            sample_count: summary.sample_count,
            epochs: summary.epochs,
            learning_rate: summary.learning_rate,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// Structural and numeric checks, run on every load
    pub fn validate(&self) -> Result<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(PriceCoreError::InvalidFormat(format!(
                "unsupported artifact version {}",
                self.format_version
            )));
        }
        if self.model_id.trim().is_empty() {
            return Err(PriceCoreError::InvalidFormat("model_id is blank".into()));
        }
        if self.country_hash_version != COUNTRY_HASH_VERSION {
            return Err(PriceCoreError::InvalidFormat(format!(
                "country hash version {} does not match {}",
                self.country_hash_version, COUNTRY_HASH_VERSION
            )));
        }

        self.normalization.validate()?;

        let width = self.encoding.width();
        if self.weights.len() != width || self.normalization.width() != width {
            return Err(PriceCoreError::InvalidFormat(format!(
                "{} encoding expects {} features, found {} weights and {} normalization dims",
                self.encoding,
                width,
                self.weights.len(),
                self.normalization.width()
            )));
        }
        if self.weights.iter().any(|w| !w.is_finite()) || !self.bias.is_finite() {
            return Err(PriceCoreError::InvalidFormat(
                "weights and bias must be finite".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.training_accuracy) {
            return Err(PriceCoreError::InvalidFormat(format!(
                "training accuracy {} outside [0, 1]",
                self.training_accuracy
            )));
        }
        Ok(())
    }

    pub fn encoder(&self) -> FeatureEncoder {
        FeatureEncoder::new(self.encoding)
    }

    pub fn model(&self) -> Result<LinearRegressionModel> {
        LinearRegressionModel::from_parts(self.weights.clone(), self.bias, self.training_accuracy)
    }

    /// Encode and normalize records exactly as during training
    pub fn prepare(&self, records: &[ExportRecord]) -> Result<Vec<FeatureVector>> {
        let encoder = self.encoder();
        records
            .iter()
            .map(|r| self.normalization.apply(&encoder.encode(r)))
            .collect()
    }

    pub fn predictor(&self, settings: PredictorSettings) -> Result<LinearPricePredictor> {
        LinearPricePredictor::new(self, settings)
    }

    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(to_canonical_json(self)?)
    }

    /// BLAKE3 hex digest of the canonical JSON
    pub fn hash_hex(&self) -> Result<String> {
        Ok(hash_canonical_hex(self)?)
    }

    /// Write canonical JSON and return the hash of the written bytes
    pub fn save_json(&self, path: &Path) -> Result<String> {
        self.validate()?;
        let json = self.to_canonical_json()?;
        fs::write(path, &json)?;
        let hash = hash_bytes_hex(json.as_bytes());
        info!("Saved model {} to {} ({})", self.model_id, path.display(), hash);
        Ok(hash)
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        Self::from_json_bytes(&fs::read(path)?)
    }

    /// Load the artifact after checking the file bytes against an expected hash
    pub fn load_verified(path: &Path, expected_hash: &str) -> Result<Self> {
        let bytes = fs::read(path)?;
        let actual = hash_bytes_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected_hash.trim()) {
            return Err(PriceCoreError::InvalidFormat(format!(
                "hash mismatch for {}: expected {}, got {}",
                path.display(),
                expected_hash.trim(),
                actual
            )));
        }
        Self::from_json_bytes(&bytes)
    }

    fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self = serde_json::from_slice(bytes)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Flat `key: value` rendering
    pub fn to_text_record(&self) -> String {
        let lines = [
            TEXT_RECORD_HEADER.to_string(),
            format!("format_version: {}", self.format_version),
            format!("model_id: {}", self.model_id),
            format!(
                "trained_at: {}",
                self.trained_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
            ),
            format!("accuracy_percent: {:.2}", self.training_accuracy * 100.0),
            format!("training_accuracy: {}", self.training_accuracy),
            format!("sample_count: {}", self.sample_count),
            format!("encoding: {}", self.encoding),
            format!("country_hash_version: {}", self.country_hash_version),
            format!("epochs: {}", self.epochs),
            format!("learning_rate: {}", self.learning_rate),
            format!("weights: {}", join(&self.weights)),
            format!("bias: {}", self.bias),
            format!("means: {}", join(&self.normalization.means)),
            format!("std_devs: {}", join(&self.normalization.std_devs)),
            format!("constant_dims: {}", join(&self.normalization.constant_dims)),
        ];
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// Parse a text record. Unknown keys are ignored.
    pub fn from_text_record(text: &str) -> Result<Self> {
        let mut fields = BTreeMap::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| {
                PriceCoreError::InvalidFormat(format!("line {}: expected `key: value`", idx + 1))
            })?;
            fields.insert(key.trim(), value.trim());
        }

        let training_accuracy = match fields.get("training_accuracy") {
            Some(_) => parse_field(&fields, "training_accuracy")?,
            None => parse_field::<f64>(&fields, "accuracy_percent")? / 100.0,
        };
        let trained_at = DateTime::parse_from_rfc3339(field(&fields, "trained_at")?)
            .map_err(|e| PriceCoreError::InvalidFormat(format!("trained_at: {}", e)))?
            .with_timezone(&Utc);

        let artifact = Self {
            format_version: parse_field(&fields, "format_version")?,
            model_id: field(&fields, "model_id")?.to_string(),
            trained_at,
            encoding: field(&fields, "encoding")?
                .parse::<ProductEncoding>()
                .map_err(|e| PriceCoreError::InvalidFormat(format!("encoding: {}", e)))?,
            country_hash_version: parse_field(&fields, "country_hash_version")?,
            normalization: NormalizationStats {
                means: parse_list(&fields, "means")?,
                std_devs: parse_list(&fields, "std_devs")?,
                constant_dims: parse_list(&fields, "constant_dims")?,
            },
            weights: parse_list(&fields, "weights")?,
            bias: parse_field(&fields, "bias")?,
            training_accuracy,
            sample_count: parse_field(&fields, "sample_count")?,
            epochs: parse_field(&fields, "epochs")?,
            learning_rate: parse_field(&fields, "learning_rate")?,
        };
        artifact.validate()?;
        Ok(artifact)
    }
}

fn join<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn field<'a>(fields: &BTreeMap<&str, &'a str>, key: &str) -> Result<&'a str> {
    fields
        .get(key)
        .copied()
        .ok_or_else(|| PriceCoreError::InvalidFormat(format!("missing field `{}`", key)))
}

fn parse_field<T: FromStr>(fields: &BTreeMap<&str, &str>, key: &str) -> Result<T> {
    let raw = field(fields, key)?;
    raw.parse()
        .map_err(|_| PriceCoreError::InvalidFormat(format!("bad value for `{}`: {}", key, raw)))
}

fn parse_list<T: FromStr>(fields: &BTreeMap<&str, &str>, key: &str) -> Result<Vec<T>> {
    let raw = field(fields, key)?;
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|item| {
            item.trim().parse().map_err(|_| {
                PriceCoreError::InvalidFormat(format!("bad item in `{}`: {}", key, item))
            })
        })
        .collect()
}
