use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use export_price_core::{
    extract_targets, ExportRecord, FeatureEncoder, FeatureNormalizer, LinearRegressionModel,
    MarketIndicator, ModelArtifact, PricePredictor, PredictorSettings, ProductType,
    TrainingParams,
};

const RECORD_COUNT: usize = 512;
const EPOCHS: usize = 200;

fn generate_records(count: usize) -> Vec<ExportRecord> {
    (0..count)
        .map(|idx| {
            let product = ProductType::ALL[idx % ProductType::ALL.len()];
            let indicator = MarketIndicator::ALL[idx % MarketIndicator::ALL.len()];
            let date = NaiveDate::from_ymd_opt(2015 + (idx % 8) as i32, 1 + (idx % 12) as u32, 1)
                .expect("valid date");
            ExportRecord::new(
                date,
                product,
                800.0 + (idx as f64 * 37.0) % 2500.0,
                100.0 + (idx as f64 * 13.0) % 900.0,
                format!("country-{:02}", idx % 17),
                indicator,
                (idx % 20) as f64 / 100.0,
                2.5 + (idx % 10) as f64 / 10.0,
            )
            .expect("valid record")
        })
        .collect()
}

fn benchmark_training(c: &mut Criterion) {
    let records = generate_records(RECORD_COUNT);
    let encoder = FeatureEncoder::default();
    let encoded = encoder.encode_all(&records);
    let stats = FeatureNormalizer::new().fit(&encoded).expect("fit");
    let features = stats.apply_all(&encoded).expect("normalize");
    let targets = extract_targets(&records);
    let params = TrainingParams::new(EPOCHS, 0.05);

    let mut group = c.benchmark_group("linear_training");
    group.throughput(Throughput::Elements((RECORD_COUNT * EPOCHS) as u64));
    group.bench_function("train_512_records_200_epochs", |b| {
        b.iter(|| {
            let mut model = LinearRegressionModel::new(encoder.width());
            let summary = model.train(&features, &targets, &params).expect("train");
            criterion::black_box(summary.final_loss);
        });
    });
    group.finish();

    let mut model = LinearRegressionModel::new(encoder.width());
    let summary = model.train(&features, &targets, &params).expect("train");
    let artifact =
        ModelArtifact::new("bench", &encoder, stats, &model, &summary).expect("artifact");
    let predictor = artifact
        .predictor(PredictorSettings::default())
        .expect("predictor");

    let mut group = c.benchmark_group("linear_prediction");
    group.throughput(Throughput::Elements(RECORD_COUNT as u64));
    group.bench_function("predict_512_records", |b| {
        b.iter(|| {
            let predictions = predictor.predict_batch(&records).expect("predict");
            criterion::black_box(predictions);
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_training);
criterion_main!(benches);
