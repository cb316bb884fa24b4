//! Linear regression fitted by batch gradient descent
//!
//! A model starts `Untrained` with zero weights and bias and moves to
//! `Trained` exactly once. Training works on a scratch copy of the
//! parameters and only commits them when every epoch stayed finite, so a
//! failed call never leaves a half-updated model behind.

use crate::errors::{PriceCoreError, Result};
use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Epoch interval for progress logging
const LOG_EVERY_EPOCHS: usize = 100;

/// Lifecycle of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Untrained,
    Trained,
}

/// Gradient descent hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub epochs: usize,
    pub learning_rate: f64,
    /// Learn a bias term; when false the bias stays at zero
    #[serde(default = "default_fit_intercept")]
    pub fit_intercept: bool,
}

fn default_fit_intercept() -> bool {
    true
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 500,
            learning_rate: 0.01,
            fit_intercept: true,
        }
    }
}

impl TrainingParams {
    pub fn new(epochs: usize, learning_rate: f64) -> Self {
        Self {
            epochs,
            learning_rate,
            fit_intercept: true,
        }
    }

    pub fn without_intercept(mut self) -> Self {
        self.fit_intercept = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(PriceCoreError::invalid("epochs must be positive"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(PriceCoreError::invalid(format!(
                "learning rate must be a finite positive value, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Outcome of a successful training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub epochs: usize,
    pub learning_rate: f64,
    pub sample_count: usize,
    /// Training-set MSE with the final parameters
    pub final_loss: f64,
    /// Training-set MSE at the start of each epoch
    pub loss_history: Vec<f64>,
    pub training_accuracy: f64,
}

/// Linear regression model `y = w · x + b`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegressionModel {
    weights: Vec<f64>,
    bias: f64,
    training_accuracy: f64,
    state: ModelState,
}

impl LinearRegressionModel {
    /// Fresh untrained model with zero weights for `width` features
    pub fn new(width: usize) -> Self {
        Self {
            weights: vec![0.0; width],
            bias: 0.0,
            training_accuracy: 0.0,
            state: ModelState::Untrained,
        }
    }

    /// Rebuild a trained model from persisted parameters
    pub fn from_parts(weights: Vec<f64>, bias: f64, training_accuracy: f64) -> Result<Self> {
        if weights.is_empty() {
            return Err(PriceCoreError::invalid("model needs at least one weight"));
        }
        if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
            return Err(PriceCoreError::invalid("weights and bias must be finite"));
        }
        if !(0.0..=1.0).contains(&training_accuracy) {
            return Err(PriceCoreError::invalid(format!(
                "training accuracy must be within [0, 1], got {}",
                training_accuracy
            )));
        }

        Ok(Self {
            weights,
            bias,
            training_accuracy,
            state: ModelState::Trained,
        })
    }

    pub fn width(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn training_accuracy(&self) -> f64 {
        self.training_accuracy
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn is_trained(&self) -> bool {
        self.state == ModelState::Trained
    }

    /// `w · x + b`. Extra or missing trailing values are ignored.
    pub fn predict(&self, features: &[f64]) -> f64 {
        linear_output(&self.weights, self.bias, features)
    }

    pub fn predict_all(&self, features: &[FeatureVector]) -> Vec<f64> {
        features.iter().map(|x| self.predict(x)).collect()
    }

    /// Run `params.epochs` passes of batch gradient descent.
    ///
    /// On error the model keeps its previous state and parameters.
    pub fn train(
        &mut self,
        features: &[FeatureVector],
        targets: &[f64],
        params: &TrainingParams,
    ) -> Result<TrainingSummary> {
        if self.is_trained() {
            return Err(PriceCoreError::invalid(
                "model is already trained; create a fresh model to retrain",
            ));
        }
        params.validate()?;
        self.check_training_data(features, targets)?;

        let n = features.len() as f64;
        let lr = params.learning_rate;
        let mut weights = self.weights.clone();
        let mut bias = self.bias;
        let mut loss_history = Vec::with_capacity(params.epochs);

        info!(
            "Training linear model on {} samples × {} features ({} epochs, lr={})",
            features.len(),
            self.width(),
            params.epochs,
            lr
        );

        for epoch in 0..params.epochs {
            let mut weight_gradients = vec![0.0; weights.len()];
            let mut bias_gradient = 0.0;
            let mut squared_error = 0.0;

            for (x, &y) in features.iter().zip(targets) {
                let error = linear_output(&weights, bias, x) - y;
                squared_error += error * error;
                for (g, &xj) in weight_gradients.iter_mut().zip(x) {
                    *g += error * xj;
                }
                bias_gradient += error;
            }

            let loss = squared_error / n;
            if !loss.is_finite() {
                return Err(PriceCoreError::DivergedTraining {
                    epoch,
                    reason: format!("loss became {}", loss),
                });
            }
            loss_history.push(loss);

            for (w, g) in weights.iter_mut().zip(&weight_gradients) {
                *w -= lr * g / n;
            }
            if params.fit_intercept {
                bias -= lr * bias_gradient / n;
            }

            if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
                return Err(PriceCoreError::DivergedTraining {
                    epoch,
                    reason: "weights became non-finite".into(),
                });
            }

            if epoch % LOG_EVERY_EPOCHS == 0 {
                debug!("Epoch {}: MSE = {:.4}", epoch, loss);
            }
        }

        let final_loss = mean_squared_error(&weights, bias, features, targets);
        if !final_loss.is_finite() {
            return Err(PriceCoreError::DivergedTraining {
                epoch: params.epochs,
                reason: format!("final loss became {}", final_loss),
            });
        }
        let training_accuracy = fit_quality(final_loss, targets);

        self.weights = weights;
        self.bias = bias;
        self.training_accuracy = training_accuracy;
        self.state = ModelState::Trained;

        info!(
            "Training complete: MSE = {:.4}, accuracy = {:.2}%",
            final_loss,
            training_accuracy * 100.0
        );

        Ok(TrainingSummary {
            epochs: params.epochs,
            learning_rate: lr,
            sample_count: features.len(),
            final_loss,
            loss_history,
            training_accuracy,
        })
    }

    fn check_training_data(&self, features: &[FeatureVector], targets: &[f64]) -> Result<()> {
        if features.is_empty() {
            return Err(PriceCoreError::invalid("training set is empty"));
        }
        if features.len() != targets.len() {
            return Err(PriceCoreError::invalid(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if let Some((idx, row)) = features
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.width())
        {
            return Err(PriceCoreError::invalid(format!(
                "row {} has {} features, model expects {}",
                idx,
                row.len(),
                self.width()
            )));
        }
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(PriceCoreError::invalid("targets must be finite"));
        }
        Ok(())
    }
}

fn linear_output(weights: &[f64], bias: f64, features: &[f64]) -> f64 {
    bias + weights
        .iter()
        .zip(features)
        .map(|(w, x)| w * x)
        .sum::<f64>()
}

fn mean_squared_error(weights: &[f64], bias: f64, features: &[FeatureVector], targets: &[f64]) -> f64 {
    let total: f64 = features
        .iter()
        .zip(targets)
        .map(|(x, &y)| {
            let error = linear_output(weights, bias, x) - y;
            error * error
        })
        .sum();
    total / features.len() as f64
}

/// `1 - MSE / Var(targets)` (R²) clamped to `[0, 1]`.
///
/// With constant targets the variance is zero, so the MSE is normalized by
/// the mean squared target instead; if that is also zero the fit is either
/// exact (1.0) or not (0.0).
pub fn fit_quality(mse: f64, targets: &[f64]) -> f64 {
    if targets.is_empty() || !mse.is_finite() {
        return 0.0;
    }

    let n = targets.len() as f64;
    let mean = targets.iter().sum::<f64>() / n;
    let variance = targets.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;

    let denominator = if variance > f64::EPSILON {
        variance
    } else {
        targets.iter().map(|t| t * t).sum::<f64>() / n
    };

    if denominator <= 0.0 {
        return if mse <= f64::EPSILON { 1.0 } else { 0.0 };
    }

    (1.0 - mse / denominator).clamp(0.0, 1.0)
}
