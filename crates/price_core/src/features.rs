//! Feature extraction from export records
//!
//! Every record maps to a fixed-width `f64` vector. The default layout has
//! 12 dimensions:
//!
//! 0. Month of the export date / 12
//! 1-5. Product slot (`ordinal mod 5`, so OLIVE_OIL and PEPPERS share dimension 1)
//! 6. Volume / 1000
//! 7. Destination country bucket (`hash mod 10 / 10`)
//! 8. Market indicator ordinal / 4
//! 9. (Year - 2005) / 20
//! 10. Price volatility
//! 11. Exchange rate / 4
//!
//! `ProductEncoding::OneHot` widens the product block to one slot per
//! product (13 dimensions) and shifts dimensions 6-11 by one.

use crate::types::{ExportRecord, ProductType};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Feature vector (unnormalized or z-scored)
pub type FeatureVector = Vec<f64>;

/// Width of the default folded layout
pub const FEATURE_COUNT: usize = 12;

/// Version of the country bucketing hash recorded in model artifacts
pub const COUNTRY_HASH_VERSION: u32 = 1;

const FOLDED_PRODUCT_SLOTS: usize = 5;
const COUNTRY_BUCKETS: u64 = 10;
const BASE_YEAR: i32 = 2005;
const YEAR_WINDOW: f64 = 20.0;

/// How the product type is laid out in the feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductEncoding {
    /// Five slots indexed by `ordinal mod 5`; two products collide on slot 1
    #[default]
    Folded,
    /// One slot per product variant
    OneHot,
}

impl ProductEncoding {
    /// Number of product slots in the vector
    pub fn product_slots(self) -> usize {
        match self {
            ProductEncoding::Folded => FOLDED_PRODUCT_SLOTS,
            ProductEncoding::OneHot => ProductType::ALL.len(),
        }
    }

    /// Total feature vector width
    pub fn width(self) -> usize {
        FEATURE_COUNT - FOLDED_PRODUCT_SLOTS + self.product_slots()
    }

    /// Slot offset (within the product block) for a product
    pub fn product_slot(self, product: ProductType) -> usize {
        product.ordinal() % self.product_slots()
    }

    /// Products sharing a slot with another product under this encoding
    pub fn colliding_products(self) -> Vec<(ProductType, ProductType)> {
        let mut pairs = Vec::new();
        for (i, a) in ProductType::ALL.iter().enumerate() {
            for b in &ProductType::ALL[i + 1..] {
                if self.product_slot(*a) == self.product_slot(*b) {
                    pairs.push((*a, *b));
                }
            }
        }
        pairs
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProductEncoding::Folded => "folded",
            ProductEncoding::OneHot => "one_hot",
        }
    }
}

impl fmt::Display for ProductEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductEncoding {
    type Err = crate::errors::PriceCoreError;

    fn from_str(s: &str) -> crate::errors::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "folded" => Ok(ProductEncoding::Folded),
            "one_hot" | "onehot" | "one-hot" => Ok(ProductEncoding::OneHot),
            other => Err(crate::errors::PriceCoreError::InvalidInput(format!(
                "Unknown product encoding: {}",
                other
            ))),
        }
    }
}

/// Maps export records to feature vectors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    encoding: ProductEncoding,
}

impl FeatureEncoder {
    pub fn new(encoding: ProductEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> ProductEncoding {
        self.encoding
    }

    pub fn width(&self) -> usize {
        self.encoding.width()
    }

    /// Encode a single record. Pure and infallible.
    pub fn encode(&self, record: &ExportRecord) -> FeatureVector {
        let slots = self.encoding.product_slots();
        let mut features = vec![0.0; self.width()];

        let date = record.date();
        features[0] = date.month() as f64 / 12.0;

        features[1 + self.encoding.product_slot(record.product_type())] = 1.0;

        let tail = 1 + slots;
        features[tail] = record.volume() / 1000.0;
        features[tail + 1] = country_bucket(record.destination_country());
        features[tail + 2] = record.market_indicator().ordinal() as f64 / 4.0;
        features[tail + 3] = (date.year() - BASE_YEAR) as f64 / YEAR_WINDOW;
        features[tail + 4] = record.price_volatility();
        features[tail + 5] = record.exchange_rate() / 4.0;

        features
    }

    pub fn encode_all(&self, records: &[ExportRecord]) -> Vec<FeatureVector> {
        records.iter().map(|r| self.encode(r)).collect()
    }

    /// Human readable names for each dimension
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = vec!["month".to_string()];
        match self.encoding {
            ProductEncoding::Folded => {
                for slot in 0..FOLDED_PRODUCT_SLOTS {
                    names.push(format!("product_slot_{}", slot));
                }
            }
            ProductEncoding::OneHot => {
                for product in ProductType::ALL {
                    names.push(format!("product_{}", product.as_str().to_ascii_lowercase()));
                }
            }
        }
        names.extend(
            [
                "volume",
                "country_bucket",
                "market_indicator",
                "year",
                "price_volatility",
                "exchange_rate",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        names
    }
}

/// Prices are the regression targets
pub fn extract_targets(records: &[ExportRecord]) -> Vec<f64> {
    records.iter().map(ExportRecord::price_per_ton).collect()
}

/// Coarse destination bucket in `[0, 0.9]`.
///
/// Uses the first 8 bytes of BLAKE3 so buckets are identical on every run
/// and platform (`COUNTRY_HASH_VERSION`).
pub fn country_bucket(country: &str) -> f64 {
    let hash = blake3::hash(country.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % COUNTRY_BUCKETS) as f64 / COUNTRY_BUCKETS as f64
}
