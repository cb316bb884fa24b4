//! Error types for the price core

use thiserror::Error;

/// Errors that can occur while encoding, training, evaluating or persisting models
#[derive(Error, Debug)]
pub enum PriceCoreError {
    /// Rejected call: mismatched lengths, empty collections, out-of-range fields
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Gradient descent produced a non-finite loss, weight or bias
    #[error("Training diverged at epoch {epoch}: {reason}")]
    DivergedTraining { epoch: usize, reason: String },

    /// Persisted artifact or text record is malformed
    #[error("Invalid model format: {0}")]
    InvalidFormat(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PriceCoreError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result type for price core operations
pub type Result<T> = std::result::Result<T, PriceCoreError>;
