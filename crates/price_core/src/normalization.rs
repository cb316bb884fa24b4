//! Z-score normalization fitted on a training set
//!
//! Statistics are computed once from the encoded training vectors and must
//! be reused verbatim at inference time; `ModelArtifact` carries them next
//! to the weights for that reason.

use crate::errors::{PriceCoreError, Result};
use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Standard deviations below this are replaced with 1.0
pub const STD_DEV_FLOOR: f64 = 1e-4;

/// Per-dimension location and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub means: Vec<f64>,
    pub std_devs: Vec<f64>,
    /// Dimensions whose measured standard deviation fell below the floor
    #[serde(default)]
    pub constant_dims: Vec<usize>,
}

impl NormalizationStats {
    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn is_constant(&self, dim: usize) -> bool {
        self.constant_dims.contains(&dim)
    }

    /// Z-score a single vector: `(x - mean) / std`
    pub fn apply(&self, vector: &[f64]) -> Result<FeatureVector> {
        if vector.len() != self.width() {
            return Err(PriceCoreError::invalid(format!(
                "feature width mismatch: stats cover {} dimensions, vector has {}",
                self.width(),
                vector.len()
            )));
        }

        Ok(vector
            .iter()
            .zip(self.means.iter().zip(&self.std_devs))
            .map(|(&x, (&mean, &std))| (x - mean) / std)
            .collect())
    }

    pub fn apply_all(&self, vectors: &[FeatureVector]) -> Result<Vec<FeatureVector>> {
        vectors.iter().map(|v| self.apply(v)).collect()
    }

    /// Structural checks used when loading persisted stats
    pub fn validate(&self) -> Result<()> {
        if self.means.len() != self.std_devs.len() {
            return Err(PriceCoreError::InvalidFormat(format!(
                "means ({}) and std_devs ({}) differ in length",
                self.means.len(),
                self.std_devs.len()
            )));
        }
        if self.means.iter().any(|m| !m.is_finite()) {
            return Err(PriceCoreError::InvalidFormat("non-finite mean".into()));
        }
        if self.std_devs.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(PriceCoreError::InvalidFormat(
                "standard deviations must be finite and positive".into(),
            ));
        }
        if let Some(dim) = self.constant_dims.iter().find(|&&d| d >= self.width()) {
            return Err(PriceCoreError::InvalidFormat(format!(
                "constant dimension {} out of range",
                dim
            )));
        }
        Ok(())
    }
}

/// Fits normalization statistics
#[derive(Debug, Clone, Copy)]
pub struct FeatureNormalizer {
    std_floor: f64,
}

impl Default for FeatureNormalizer {
    fn default() -> Self {
        Self {
            std_floor: STD_DEV_FLOOR,
        }
    }
}

impl FeatureNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean and population standard deviation for every dimension.
    ///
    /// Fails on an empty set or vectors of differing length.
    pub fn fit(&self, vectors: &[FeatureVector]) -> Result<NormalizationStats> {
        let first = vectors
            .first()
            .ok_or_else(|| PriceCoreError::invalid("cannot fit normalizer on an empty set"))?;
        let width = first.len();

        if let Some((idx, row)) = vectors.iter().enumerate().find(|(_, v)| v.len() != width) {
            return Err(PriceCoreError::invalid(format!(
                "non-rectangular features: row {} has {} values, expected {}",
                idx,
                row.len(),
                width
            )));
        }

        let n = vectors.len() as f64;
        let mut means = vec![0.0; width];
        for row in vectors {
            for (sum, &v) in means.iter_mut().zip(row) {
                *sum += v;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut std_devs = vec![0.0; width];
        for row in vectors {
            for ((acc, &v), &mean) in std_devs.iter_mut().zip(row).zip(&means) {
                let diff = v - mean;
                *acc += diff * diff;
            }
        }

        let mut constant_dims = Vec::new();
        for (i, std) in std_devs.iter_mut().enumerate() {
            *std = (*std / n).sqrt();
            if std.is_nan() || *std < self.std_floor {
                debug!("Feature {} has std {:.3e} below floor, using 1.0", i, std);
                *std = 1.0;
                constant_dims.push(i);
            }
        }

        Ok(NormalizationStats {
            means,
            std_devs,
            constant_dims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_and_apply_two_points() {
        let stats = FeatureNormalizer::new()
            .fit(&[vec![1.0, 1.0], vec![3.0, 3.0]])
            .unwrap();

        assert_eq!(stats.means, vec![2.0, 2.0]);
        assert_eq!(stats.std_devs, vec![1.0, 1.0]);
        assert!(stats.constant_dims.is_empty());

        let normalized = stats.apply(&[1.0, 1.0]).unwrap();
        assert_eq!(normalized, vec![-1.0, -1.0]);
    }

    #[test]
    fn test_constant_column_is_floored() {
        let stats = FeatureNormalizer::new()
            .fit(&[vec![0.0, 5.0], vec![0.0, 7.0], vec![0.0, 9.0]])
            .unwrap();

        assert_eq!(stats.std_devs[0], 1.0);
        assert_eq!(stats.constant_dims, vec![0]);
        assert!(stats.is_constant(0));
        assert!(!stats.is_constant(1));

        let normalized = stats.apply(&[0.0, 7.0]).unwrap();
        assert_eq!(normalized, vec![0.0, 0.0]);
    }

    #[test]
    fn test_fit_rejects_empty_and_ragged() {
        let normalizer = FeatureNormalizer::new();
        assert!(matches!(
            normalizer.fit(&[]),
            Err(PriceCoreError::InvalidInput(_))
        ));
        assert!(matches!(
            normalizer.fit(&[vec![1.0, 2.0], vec![1.0]]),
            Err(PriceCoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_apply_rejects_width_mismatch() {
        let stats = FeatureNormalizer::new()
            .fit(&[vec![1.0, 2.0], vec![2.0, 4.0]])
            .unwrap();
        assert!(stats.apply(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_std() {
        let stats = NormalizationStats {
            means: vec![0.0],
            std_devs: vec![0.0],
            constant_dims: vec![],
        };
        assert!(stats.validate().is_err());
    }
}
