//! Export price trainer CLI
//!
//! Trains linear price models from CSV exports and serves them for
//! evaluation and prediction.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use export_price_core::{
    extract_targets, write_predictions_csv, Evaluator, ModelArtifact, PricePredictor,
    ProductEncoding,
};
use export_price_trainer::{
    default_model_id, export_predictions, load_records, DatasetSummary,
    PipelineOutcome, TrainerConfig, TrainingPipeline,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "price-trainer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Linear price model trainer for agricultural exports", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a model and write active.json, active.hash and model.txt
    Train(TrainArgs),

    /// Score a saved model against labelled records
    Evaluate {
        /// Model artifact (active.json)
        #[arg(short, long)]
        model: PathBuf,

        /// CSV with known prices
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Predict prices for every record of a CSV file
    Predict {
        /// Model artifact (active.json)
        #[arg(short, long)]
        model: PathBuf,

        /// CSV with records to price
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print dataset statistics
    Stats {
        /// Input CSV dataset path
        #[arg(short, long)]
        input: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write the effective configuration to a TOML file
    InitConfig {
        #[arg(short, long, default_value = "price-trainer.toml")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Input CSV dataset path
    #[arg(short, long)]
    input: PathBuf,

    /// Separate holdout CSV; disables the configured split
    #[arg(long)]
    holdout: Option<PathBuf>,

    /// Output directory for model files
    #[arg(short, long, default_value = "models/price")]
    output: PathBuf,

    /// Identifier stored in the artifact
    #[arg(long)]
    model_id: Option<String>,

    /// Number of gradient descent epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Gradient descent learning rate
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Product encoding (folded or one_hot)
    #[arg(long)]
    encoding: Option<ProductEncoding>,

    /// Share of records held out for evaluation
    #[arg(long)]
    split_ratio: Option<f64>,

    /// Seed for the deterministic holdout shuffle
    #[arg(long)]
    seed: Option<u64>,

    /// Keep the bias fixed at zero
    #[arg(long)]
    no_intercept: bool,

    /// Train one model per product type
    #[arg(long)]
    per_product: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TrainerConfig::load_from_file(path)?,
        None => TrainerConfig::default(),
    };
    config.apply_env_overrides();
    if let Commands::Train(args) = &cli.command {
        apply_train_flags(&mut config, args);
    }

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        config.log_level().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let validation = config.validate();
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    if !validation.is_valid() {
        bail!("Invalid configuration: {}", validation.errors.join("; "));
    }

    match cli.command {
        Commands::Train(args) => train(&config, &args),
        Commands::Evaluate { model, input } => evaluate(&model, &input),
        Commands::Predict {
            model,
            input,
            output,
        } => predict(&config, &model, &input, output.as_deref()),
        Commands::Stats { input, json } => stats(&input, json),
        Commands::InitConfig { output } => {
            config.save_to_file(&output)?;
            println!("Configuration written to {}", output.display());
            Ok(())
        }
    }
}

fn apply_train_flags(config: &mut TrainerConfig, args: &TrainArgs) {
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(lr) = args.learning_rate {
        config.training.learning_rate = lr;
    }
    if let Some(encoding) = args.encoding {
        config.features.encoding = encoding;
    }
    if let Some(ratio) = args.split_ratio {
        config.split.ratio = ratio;
    }
    if let Some(seed) = args.seed {
        config.split.seed = seed;
    }
    if args.no_intercept {
        config.training.fit_intercept = false;
    }
}

fn train(config: &TrainerConfig, args: &TrainArgs) -> Result<()> {
    info!("Export price trainer v{}", env!("CARGO_PKG_VERSION"));

    let report = load_records(&args.input).context("Failed to load dataset")?;
    let summary = DatasetSummary::from_records(&report.records)?;
    info!("Dataset:\n{}", summary);

    let model_id = args.model_id.clone().unwrap_or_else(default_model_id);
    let pipeline = TrainingPipeline::new(config.pipeline_options(model_id));

    fs::create_dir_all(&args.output).context("Failed to create output directory")?;

    if args.per_product {
        let mut failures = 0;
        for (product, outcome) in pipeline.run_per_product(&report.records) {
            let dir = args.output.join(product.as_str().to_ascii_lowercase());
            match outcome {
                Ok(outcome) => {
                    fs::create_dir_all(&dir).context("Failed to create product directory")?;
                    write_outputs(&outcome, &dir)?;
                }
                Err(err) => {
                    warn!("Training failed for {}: {}", product, err);
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            bail!("{} per-product trainings failed", failures);
        }
        return Ok(());
    }

    let outcome = match &args.holdout {
        Some(path) => {
            let holdout = load_records(path).context("Failed to load holdout dataset")?;
            pipeline.run(&report.records, &holdout.records)?
        }
        None => pipeline.run_with_split(report.records)?,
    };
    write_outputs(&outcome, &args.output)
}

fn write_outputs(outcome: &PipelineOutcome, dir: &Path) -> Result<()> {
    let model_path = dir.join("active.json");
    let hash_hex = outcome
        .artifact
        .save_json(&model_path)
        .context("Failed to write model file")?;

    let hash_path = dir.join("active.hash");
    fs::write(&hash_path, &hash_hex).context("Failed to write hash file")?;

    let text_path = dir.join("model.txt");
    fs::write(&text_path, outcome.artifact.to_text_record())
        .context("Failed to write text record")?;

    info!("✓ Training completed successfully");
    info!("  Model: {}", model_path.display());
    info!("  Hash: {} ({})", hash_path.display(), hash_hex);
    info!(
        "  Training accuracy: {:.2}%",
        outcome.summary.training_accuracy * 100.0
    );
    if let Some(evaluation) = &outcome.evaluation {
        info!("  Holdout: {}", evaluation);
    }
    Ok(())
}

/// Load an artifact, checking it against a sibling `active.hash` when present
fn load_artifact(path: &Path) -> Result<ModelArtifact> {
    let hash_path = path.with_extension("hash");
    let artifact = if hash_path.exists() {
        let expected = fs::read_to_string(&hash_path).context("Failed to read hash file")?;
        ModelArtifact::load_verified(path, &expected)?
    } else {
        warn!("No hash file next to {}, skipping verification", path.display());
        ModelArtifact::load_json(path)?
    };
    info!(
        "Loaded model {} ({} encoding, accuracy {:.2}%)",
        artifact.model_id,
        artifact.encoding,
        artifact.training_accuracy * 100.0
    );
    Ok(artifact)
}

fn evaluate(model: &Path, input: &Path) -> Result<()> {
    let artifact = load_artifact(model)?;
    let report = load_records(input).context("Failed to load dataset")?;

    let features = artifact.prepare(&report.records)?;
    let evaluation = Evaluator::evaluate(
        &artifact.model()?,
        &features,
        &extract_targets(&report.records),
    )?;

    println!("{}", serde_json::to_string_pretty(&evaluation)?);
    info!("Quality: {}", evaluation.quality());
    Ok(())
}

fn predict(config: &TrainerConfig, model: &Path, input: &Path, output: Option<&Path>) -> Result<()> {
    let artifact = load_artifact(model)?;
    let predictor = artifact.predictor(config.prediction.clone())?;
    let report = load_records(input).context("Failed to load dataset")?;

    let predictions = predictor.predict_batch(&report.records)?;
    let attention = predictions
        .iter()
        .filter(|p| p.status().requires_attention() || p.status().has_error())
        .count();
    if attention > 0 {
        warn!("{} of {} predictions need review", attention, predictions.len());
    }

    match output {
        Some(path) => export_predictions(path, &predictions)?,
        None => write_predictions_csv(std::io::stdout().lock(), &predictions)?,
    }
    Ok(())
}

fn stats(input: &Path, json: bool) -> Result<()> {
    let report = load_records(input).context("Failed to load dataset")?;
    let summary = DatasetSummary::from_records(&report.records)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary);
        if report.skipped_rows > 0 {
            println!("Skipped rows: {}", report.skipped_rows);
        }
    }
    Ok(())
}
