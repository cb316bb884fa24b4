//! Export records and their categorical attributes

use crate::errors::{PriceCoreError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Agricultural product exported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    OliveOil,
    Dates,
    CitrusFruits,
    Wheat,
    Tomatoes,
    Peppers,
}

impl ProductType {
    /// All variants in declaration order
    pub const ALL: [ProductType; 6] = [
        ProductType::OliveOil,
        ProductType::Dates,
        ProductType::CitrusFruits,
        ProductType::Wheat,
        ProductType::Tomatoes,
        ProductType::Peppers,
    ];

    /// Position in declaration order, used by the feature encoder
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProductType::OliveOil => "OLIVE_OIL",
            ProductType::Dates => "DATES",
            ProductType::CitrusFruits => "CITRUS_FRUITS",
            ProductType::Wheat => "WHEAT",
            ProductType::Tomatoes => "TOMATOES",
            ProductType::Peppers => "PEPPERS",
        }
    }

    /// Human readable label used in reports
    pub fn label(self) -> &'static str {
        match self {
            ProductType::OliveOil => "Olive oil",
            ProductType::Dates => "Dates",
            ProductType::CitrusFruits => "Citrus fruits",
            ProductType::Wheat => "Wheat",
            ProductType::Tomatoes => "Tomatoes",
            ProductType::Peppers => "Peppers",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = PriceCoreError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        ProductType::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| PriceCoreError::invalid(format!("Unknown product type: {}", name)))
    }
}

/// Market condition observed at export time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketIndicator {
    Stable,
    Volatile,
    Rising,
    Falling,
    Unpredictable,
}

impl MarketIndicator {
    pub const ALL: [MarketIndicator; 5] = [
        MarketIndicator::Stable,
        MarketIndicator::Volatile,
        MarketIndicator::Rising,
        MarketIndicator::Falling,
        MarketIndicator::Unpredictable,
    ];

    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarketIndicator::Stable => "STABLE",
            MarketIndicator::Volatile => "VOLATILE",
            MarketIndicator::Rising => "RISING",
            MarketIndicator::Falling => "FALLING",
            MarketIndicator::Unpredictable => "UNPREDICTABLE",
        }
    }
}

impl fmt::Display for MarketIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketIndicator {
    type Err = PriceCoreError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        MarketIndicator::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| PriceCoreError::invalid(format!("Unknown market indicator: {}", name)))
    }
}

/// One agricultural export observation.
///
/// Fields are private so the construction-time invariants (non-negative
/// finite price and volume, non-blank destination) hold for every value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRecord {
    date: NaiveDate,
    product_type: ProductType,
    price_per_ton: f64,
    volume: f64,
    destination_country: String,
    market_indicator: MarketIndicator,
    price_volatility: f64,
    exchange_rate: f64,
}

impl ExportRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date: NaiveDate,
        product_type: ProductType,
        price_per_ton: f64,
        volume: f64,
        destination_country: impl Into<String>,
        market_indicator: MarketIndicator,
        price_volatility: f64,
        exchange_rate: f64,
    ) -> Result<Self> {
        if !price_per_ton.is_finite() || price_per_ton < 0.0 {
            return Err(PriceCoreError::invalid(format!(
                "price per ton must be a finite value >= 0, got {}",
                price_per_ton
            )));
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(PriceCoreError::invalid(format!(
                "volume must be a finite value >= 0, got {}",
                volume
            )));
        }

        let destination_country = destination_country.into().trim().to_string();
        if destination_country.is_empty() {
            return Err(PriceCoreError::invalid("destination country cannot be blank"));
        }

        Ok(Self {
            date,
            product_type,
            price_per_ton,
            volume,
            destination_country,
            market_indicator,
            price_volatility,
            exchange_rate,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn product_type(&self) -> ProductType {
        self.product_type
    }

    pub fn price_per_ton(&self) -> f64 {
        self.price_per_ton
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn destination_country(&self) -> &str {
        &self.destination_country
    }

    pub fn market_indicator(&self) -> MarketIndicator {
        self.market_indicator
    }

    pub fn price_volatility(&self) -> f64 {
        self.price_volatility
    }

    pub fn exchange_rate(&self) -> f64 {
        self.exchange_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_record_construction() {
        let record = ExportRecord::new(
            date(),
            ProductType::OliveOil,
            2500.0,
            100.0,
            "  France ",
            MarketIndicator::Stable,
            0.12,
            2.9,
        )
        .unwrap();

        assert_eq!(record.destination_country(), "France");
        assert_eq!(record.price_per_ton(), 2500.0);
        assert_eq!(record.product_type(), ProductType::OliveOil);
    }

    #[test]
    fn test_record_rejects_negative_values() {
        let negative_price = ExportRecord::new(
            date(),
            ProductType::Dates,
            -1.0,
            10.0,
            "Germany",
            MarketIndicator::Rising,
            0.0,
            0.0,
        );
        assert!(matches!(negative_price, Err(PriceCoreError::InvalidInput(_))));

        let negative_volume = ExportRecord::new(
            date(),
            ProductType::Dates,
            1.0,
            -10.0,
            "Germany",
            MarketIndicator::Rising,
            0.0,
            0.0,
        );
        assert!(negative_volume.is_err());

        let nan_price = ExportRecord::new(
            date(),
            ProductType::Dates,
            f64::NAN,
            10.0,
            "Germany",
            MarketIndicator::Rising,
            0.0,
            0.0,
        );
        assert!(nan_price.is_err());
    }

    #[test]
    fn test_record_rejects_blank_country() {
        let result = ExportRecord::new(
            date(),
            ProductType::Wheat,
            300.0,
            10.0,
            "   ",
            MarketIndicator::Falling,
            0.0,
            0.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("olive_oil".parse::<ProductType>().unwrap(), ProductType::OliveOil);
        assert_eq!(" PEPPERS ".parse::<ProductType>().unwrap(), ProductType::Peppers);
        assert!("BANANAS".parse::<ProductType>().is_err());

        assert_eq!(
            "UNPREDICTABLE".parse::<MarketIndicator>().unwrap(),
            MarketIndicator::Unpredictable
        );
        assert!("CRASHING".parse::<MarketIndicator>().is_err());
    }

    #[test]
    fn test_ordinals_follow_declaration_order() {
        for (i, product) in ProductType::ALL.iter().enumerate() {
            assert_eq!(product.ordinal(), i);
        }
        assert_eq!(MarketIndicator::Unpredictable.ordinal(), 4);
    }
}
