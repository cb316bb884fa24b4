//! Trainer configuration
//!
//! Loaded from TOML, then overridden by `PRICE_TRAINER_*` environment
//! variables, then by command line flags.

use crate::errors::{Result, TrainerError};
use crate::pipeline::PipelineOptions;
use export_price_core::{PredictorSettings, ProductEncoding, TrainingParams};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::{info, Level};

/// Gradient descent and dataset size settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    pub epochs: usize,
    pub learning_rate: f64,
    pub fit_intercept: bool,
    /// Fewer training records than this produce a warning
    pub min_samples_warning: usize,
}

impl Default for TrainingSection {
    fn default() -> Self {
        let params = TrainingParams::default();
        Self {
            epochs: params.epochs,
            learning_rate: params.learning_rate,
            fit_intercept: params.fit_intercept,
            min_samples_warning: 50,
        }
    }
}

impl TrainingSection {
    pub fn params(&self) -> TrainingParams {
        TrainingParams {
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            fit_intercept: self.fit_intercept,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSection {
    pub encoding: ProductEncoding,
}

/// Holdout split applied when no separate evaluation file is given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSection {
    /// Share of records held out, in `[0, 1)`; 0 disables the split
    pub ratio: f64,
    pub seed: u64,
}

impl Default for SplitSection {
    fn default() -> Self {
        Self {
            ratio: 0.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete trainer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub training: TrainingSection,
    pub features: FeatureSection,
    pub split: SplitSection,
    pub prediction: PredictorSettings,
    pub logging: LoggingSection,
}

/// Configuration validation result
#[derive(Debug, Clone, Default)]
pub struct ConfigValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl TrainerConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            TrainerError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&data).map_err(|e| {
            TrainerError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = toml::to_string_pretty(self)
            .map_err(|e| TrainerError::Config(format!("failed to serialize configuration: {}", e)))?;
        std::fs::write(path, data)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply `PRICE_TRAINER_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PRICE_TRAINER_EPOCHS") {
            if let Ok(parsed) = value.trim().parse::<usize>() {
                self.training.epochs = parsed;
            }
        }

        if let Some(value) = lookup("PRICE_TRAINER_LEARNING_RATE") {
            if let Ok(parsed) = value.trim().parse::<f64>() {
                self.training.learning_rate = parsed;
            }
        }

        if let Some(value) = lookup("PRICE_TRAINER_MIN_SAMPLES") {
            if let Ok(parsed) = value.trim().parse::<usize>() {
                self.training.min_samples_warning = parsed;
            }
        }

        if let Some(value) = lookup("PRICE_TRAINER_ENCODING") {
            if let Ok(parsed) = value.parse::<ProductEncoding>() {
                self.features.encoding = parsed;
            }
        }

        if let Some(value) = lookup("PRICE_TRAINER_LOG_LEVEL") {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                self.logging.level = trimmed.to_string();
            }
        }
    }

    pub fn validate(&self) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.training.epochs == 0 {
            errors.push("Epochs must be greater than 0".to_string());
        } else if self.training.epochs > 1_000_000 {
            warnings.push(format!("{} epochs will take a long time", self.training.epochs));
        }

        let lr = self.training.learning_rate;
        if !lr.is_finite() || lr <= 0.0 {
            errors.push(format!("Learning rate must be finite and positive, got {}", lr));
        } else if lr > 1.0 {
            warnings.push(format!("Learning rate {} is likely to diverge", lr));
        }

        if self.training.min_samples_warning == 0 {
            warnings.push("Small-dataset warning is disabled".to_string());
        }

        if !(0.0..1.0).contains(&self.split.ratio) {
            errors.push(format!("Split ratio must be within [0, 1), got {}", self.split.ratio));
        } else if self.split.ratio > 0.5 {
            warnings.push(format!("Holding out {:.0}% of the data", self.split.ratio * 100.0));
        }

        if self.prediction.model_name.trim().is_empty() {
            errors.push("Model name cannot be blank".to_string());
        }
        if !(0.0..=1.0).contains(&self.prediction.low_confidence_threshold) {
            errors.push(format!(
                "Low confidence threshold must be within [0, 1], got {}",
                self.prediction.low_confidence_threshold
            ));
        }

        if self.log_level().is_err() {
            errors.push(format!("Unknown log level `{}`", self.logging.level));
        }

        if self.features.encoding == ProductEncoding::Folded {
            warnings.push(
                "Folded product encoding maps OLIVE_OIL and PEPPERS to the same feature"
                    .to_string(),
            );
        }

        ConfigValidationResult { errors, warnings }
    }

    pub fn log_level(&self) -> Result<Level> {
        self.logging
            .level
            .trim()
            .parse::<Level>()
            .map_err(|e| TrainerError::Config(format!("log level `{}`: {}", self.logging.level, e)))
    }

    /// Pipeline options for a run identified by `model_id`
    pub fn pipeline_options(&self, model_id: impl Into<String>) -> PipelineOptions {
        PipelineOptions {
            model_id: model_id.into(),
            params: self.training.params(),
            encoding: self.features.encoding,
            min_samples_warning: self.training.min_samples_warning,
            holdout_ratio: self.split.ratio,
            seed: self.split.seed,
        }
    }
}
