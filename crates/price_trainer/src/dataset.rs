//! CSV dataset loading and summary statistics
//!
//! Rows look like `date,product,price,volume,country,indicator[,volatility[,exchange_rate]]`.
//! Malformed rows are skipped and counted; they never reach the core.

use crate::errors::{Result, TrainerError};
use chrono::NaiveDate;
use export_price_core::{
    write_predictions_csv, ExportRecord, MarketIndicator, PricePrediction, ProductType,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";
const MIN_FIELDS: usize = 6;
const MAX_FIELDS: usize = 8;
const TOP_COUNTRIES: usize = 5;

/// Parsed records plus bookkeeping about what was dropped
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub records: Vec<ExportRecord>,
    pub skipped_rows: usize,
    pub header_skipped: bool,
}

/// Load export records from a CSV file
pub fn load_records(path: &Path) -> Result<LoadReport> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        TrainerError::Dataset(format!("failed to read {}: {}", path.display(), err))
    })?;
    let report = parse_records(&content)?;
    info!(
        "Loaded {} records from {} ({} malformed rows skipped)",
        report.records.len(),
        path.display(),
        report.skipped_rows
    );
    Ok(report)
}

/// Parse CSV text. Fails only when no usable record remains.
pub fn parse_records(content: &str) -> Result<LoadReport> {
    let mut records = Vec::new();
    let mut skipped_rows = 0;
    let mut header_skipped = false;
    let mut first_data_line = true;

    for (line_idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if first_data_line {
            first_data_line = false;
            let first_field = line.split(',').next().unwrap_or("").trim();
            if NaiveDate::parse_from_str(first_field, DATE_FORMAT).is_err() {
                debug!("Treating line {} as header", line_idx + 1);
                header_skipped = true;
                continue;
            }
        }

        match parse_line(line) {
            Ok(record) => records.push(record),
            Err(reason) => {
                warn!("Skipping line {}: {}", line_idx + 1, reason);
                skipped_rows += 1;
            }
        }
    }

    if records.is_empty() {
        return Err(TrainerError::Dataset(format!(
            "no valid records ({} malformed rows)",
            skipped_rows
        )));
    }

    Ok(LoadReport {
        records,
        skipped_rows,
        header_skipped,
    })
}

fn parse_line(line: &str) -> std::result::Result<ExportRecord, String> {
    let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
    if !(MIN_FIELDS..=MAX_FIELDS).contains(&parts.len()) {
        return Err(format!(
            "expected {} to {} fields, got {}",
            MIN_FIELDS,
            MAX_FIELDS,
            parts.len()
        ));
    }

    let date = NaiveDate::parse_from_str(parts[0], DATE_FORMAT)
        .map_err(|_| format!("invalid date `{}`", parts[0]))?;
    let product = parts[1].parse::<ProductType>().map_err(|e| e.to_string())?;
    let price = parse_number(parts[2], "price")?;
    let volume = parse_number(parts[3], "volume")?;
    let indicator = parts[5]
        .parse::<MarketIndicator>()
        .map_err(|e| e.to_string())?;
    let volatility = match parts.get(6) {
        Some(raw) if !raw.is_empty() => parse_number(raw, "price volatility")?,
        _ => 0.0,
    };
    let exchange_rate = match parts.get(7) {
        Some(raw) if !raw.is_empty() => parse_number(raw, "exchange rate")?,
        _ => 0.0,
    };

    ExportRecord::new(
        date,
        product,
        price,
        volume,
        parts[4],
        indicator,
        volatility,
        exchange_rate,
    )
    .map_err(|e| e.to_string())
}

fn parse_number(raw: &str, name: &str) -> std::result::Result<f64, String> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("invalid {} `{}`", name, raw)),
    }
}

/// Descriptive statistics over a set of records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub record_count: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub mean_price: f64,
    pub total_volume: f64,
    pub mean_volatility: f64,
    pub mean_exchange_rate: f64,
    pub product_counts: BTreeMap<ProductType, usize>,
    /// Most frequent destinations, ties broken by name
    pub top_countries: Vec<(String, usize)>,
}

impl DatasetSummary {
    pub fn from_records(records: &[ExportRecord]) -> Result<Self> {
        let first = records
            .first()
            .ok_or_else(|| TrainerError::Dataset("cannot summarize an empty dataset".into()))?;

        let n = records.len() as f64;
        let mut first_date = first.date();
        let mut last_date = first.date();
        let mut price_sum = 0.0;
        let mut total_volume = 0.0;
        let mut volatility_sum = 0.0;
        let mut rate_sum = 0.0;
        let mut product_counts = BTreeMap::new();
        let mut country_counts: BTreeMap<&str, usize> = BTreeMap::new();

        for record in records {
            first_date = first_date.min(record.date());
            last_date = last_date.max(record.date());
            price_sum += record.price_per_ton();
            total_volume += record.volume();
            volatility_sum += record.price_volatility();
            rate_sum += record.exchange_rate();
            *product_counts.entry(record.product_type()).or_insert(0) += 1;
            *country_counts.entry(record.destination_country()).or_insert(0) += 1;
        }

        let mut top_countries: Vec<(String, usize)> = country_counts
            .into_iter()
            .map(|(country, count)| (country.to_string(), count))
            .collect();
        // BTreeMap order is by name, so a stable sort keeps ties alphabetical
        top_countries.sort_by(|a, b| b.1.cmp(&a.1));
        top_countries.truncate(TOP_COUNTRIES);

        Ok(Self {
            record_count: records.len(),
            first_date,
            last_date,
            mean_price: price_sum / n,
            total_volume,
            mean_volatility: volatility_sum / n,
            mean_exchange_rate: rate_sum / n,
            product_counts,
            top_countries,
        })
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records: {}", self.record_count)?;
        writeln!(f, "Date range: {} to {}", self.first_date, self.last_date)?;
        writeln!(f, "Mean price per ton: {:.2}", self.mean_price)?;
        writeln!(f, "Total volume: {:.2}", self.total_volume)?;
        writeln!(f, "Mean volatility: {:.4}", self.mean_volatility)?;
        writeln!(f, "Mean exchange rate: {:.4}", self.mean_exchange_rate)?;
        writeln!(f, "Products:")?;
        for (product, count) in &self.product_counts {
            writeln!(f, "  {}: {}", product.label(), count)?;
        }
        writeln!(f, "Top destinations:")?;
        for (country, count) in &self.top_countries {
            writeln!(f, "  {}: {}", country, count)?;
        }
        Ok(())
    }
}

/// Write predictions to a CSV file. An existing file is left alone when
/// there is nothing to write.
pub fn export_predictions(path: &Path, predictions: &[PricePrediction]) -> Result<()> {
    if predictions.is_empty() {
        return Err(TrainerError::Dataset(format!(
            "no predictions to export to {}",
            path.display()
        )));
    }
    let file = File::create(path)?;
    write_predictions_csv(BufWriter::new(file), predictions)?;
    info!("Exported {} predictions to {}", predictions.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
date,product,price,volume,country,indicator,volatility,exchange_rate
# exported 2024-02
2024-01-15,OLIVE_OIL,4200.5,120,Spain,RISING,0.12,3.1
2024-01-20,wheat,310,5000,Egypt,stable

2023-12-02,DATES,2100,80,France,VOLATILE,0.2
2024-01-21,BANANAS,100,10,Egypt,STABLE
2024-13-01,WHEAT,100,10,Egypt,STABLE
2024-01-22,WHEAT,-5,10,Egypt,STABLE
2024-01-23,WHEAT,100,10
2024-01-24,TOMATOES,900,40,Egypt,FALLING,0.1,3.0,extra
";

    #[test]
    fn test_parse_skips_header_comments_and_bad_rows() {
        let report = parse_records(SAMPLE).unwrap();

        assert!(report.header_skipped);
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.skipped_rows, 5);

        let wheat = &report.records[1];
        assert_eq!(wheat.product_type(), ProductType::Wheat);
        assert_eq!(wheat.market_indicator(), MarketIndicator::Stable);
        assert_eq!(wheat.price_volatility(), 0.0);
        assert_eq!(wheat.exchange_rate(), 0.0);
        assert_eq!(report.records[2].price_volatility(), 0.2);
    }

    #[test]
    fn test_headerless_input() {
        let report = parse_records("2024-01-15,DATES,2000,10,Oman,STABLE\n").unwrap();
        assert!(!report.header_skipped);
        assert_eq!(report.records.len(), 1);
    }

    #[test]
    fn test_all_rows_malformed_is_an_error() {
        let result = parse_records("date,product\nnot,a,record\n");
        assert!(matches!(result, Err(TrainerError::Dataset(_))));
        assert!(matches!(parse_records(""), Err(TrainerError::Dataset(_))));
    }

    #[test]
    fn test_load_from_file() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "{}", SAMPLE)?;
        file.flush()?;

        let report = load_records(file.path())?;
        assert_eq!(report.records.len(), 3);

        assert!(load_records(Path::new("/nonexistent/exports.csv")).is_err());
        Ok(())
    }

    #[test]
    fn test_summary() {
        let report = parse_records(SAMPLE).unwrap();
        let summary = DatasetSummary::from_records(&report.records).unwrap();

        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.first_date, NaiveDate::from_ymd_opt(2023, 12, 2).unwrap());
        assert_eq!(summary.last_date, NaiveDate::from_ymd_opt(2024, 1, 20).unwrap());
        assert!((summary.mean_price - (4200.5 + 310.0 + 2100.0) / 3.0).abs() < 1e-9);
        assert_eq!(summary.total_volume, 5200.0);
        assert_eq!(summary.product_counts.get(&ProductType::Wheat), Some(&1));
        assert_eq!(
            summary.top_countries,
            vec![
                ("Egypt".to_string(), 1),
                ("France".to_string(), 1),
                ("Spain".to_string(), 1)
            ]
        );

        assert!(DatasetSummary::from_records(&[]).is_err());
    }

    #[test]
    fn test_export_predictions() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("predictions.csv");
        let prediction = PricePrediction::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ProductType::Dates,
            1999.999,
            0.71,
            "linear",
            export_price_core::PredictionStatus::Completed,
        )?;

        export_predictions(&path, &[prediction])?;
        let text = std::fs::read_to_string(&path)?;
        assert!(text.ends_with("2024-03-01,DATES,2000.00,0.7100,linear,COMPLETED\n"));

        assert!(matches!(
            export_predictions(&path, &[]),
            Err(TrainerError::Dataset(_))
        ));
        // the earlier export is still intact
        assert_eq!(std::fs::read_to_string(&path)?, text);
        Ok(())
    }
}
