use chrono::NaiveDate;
use export_price_core::{
    ExportRecord, FeatureEncoder, FeatureNormalizer, FeatureVector, MarketIndicator,
    ProductEncoding, ProductType, FEATURE_COUNT,
};
use proptest::prelude::*;

fn export_record() -> impl Strategy<Value = ExportRecord> {
    (
        1990i32..2040,
        1u32..=12,
        0usize..6,
        0usize..5,
        0.0f64..100_000.0,
        0.0f64..50_000.0,
        "[A-Z][a-z]{0,11}",
        0.0f64..1.0,
        0.0f64..10.0,
    )
        .prop_map(
            |(year, month, product, indicator, price, volume, country, volatility, rate)| {
                ExportRecord::new(
                    NaiveDate::from_ymd_opt(year, month, 1).unwrap(),
                    ProductType::ALL[product],
                    price,
                    volume,
                    country,
                    MarketIndicator::ALL[indicator],
                    volatility,
                    rate,
                )
                .unwrap()
            },
        )
}

fn feature_matrix() -> impl Strategy<Value = Vec<FeatureVector>> {
    (1usize..6).prop_flat_map(|width| {
        prop::collection::vec(prop::collection::vec(-1_000.0f64..1_000.0, width), 2..30)
    })
}

proptest! {
    #[test]
    fn folded_encoding_has_fixed_width(record in export_record()) {
        let features = FeatureEncoder::default().encode(&record);

        prop_assert_eq!(features.len(), FEATURE_COUNT);
        prop_assert!(features[0] > 0.0 && features[0] <= 1.0);
        prop_assert_eq!(features[1..6].iter().filter(|&&v| v == 1.0).count(), 1);
        prop_assert_eq!(features[1..6].iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn one_hot_encoding_sets_a_single_product_slot(record in export_record()) {
        let features = FeatureEncoder::new(ProductEncoding::OneHot).encode(&record);

        prop_assert_eq!(features.len(), 13);
        prop_assert_eq!(features[1 + record.product_type().ordinal()], 1.0);
        prop_assert_eq!(features[1..7].iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn encoding_is_deterministic(record in export_record()) {
        let encoder = FeatureEncoder::default();
        prop_assert_eq!(encoder.encode(&record), encoder.encode(&record));
    }

    #[test]
    fn normalized_training_set_is_standardized(matrix in feature_matrix()) {
        let stats = FeatureNormalizer::new().fit(&matrix).unwrap();
        let normalized = stats.apply_all(&matrix).unwrap();
        let n = normalized.len() as f64;

        for dim in 0..stats.width() {
            let column: Vec<f64> = normalized.iter().map(|row| row[dim]).collect();
            let mean = column.iter().sum::<f64>() / n;
            prop_assert!(mean.abs() < 1e-6, "dim {} mean {}", dim, mean);

            if stats.is_constant(dim) {
                prop_assert_eq!(stats.std_devs[dim], 1.0);
            } else {
                let std = (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
                prop_assert!((std - 1.0).abs() < 1e-6, "dim {} std {}", dim, std);
            }
        }
    }
}
