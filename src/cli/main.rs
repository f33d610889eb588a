use anyhow::Context;
use clap::{Parser, Subcommand};
use heart_risk::{
    artifacts::{ArtifactSet, FileArtifactStore},
    config::Config,
    ml::{Classifier, FeatureSchema, InferencePipeline, TrainingConfig, TrainingPipeline},
    models::PatientInput,
    prediction_log::CsvPredictionLog,
    telemetry,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "heart-risk")]
#[command(about = "Heart-disease risk classifier", long_about = None)]
#[command(version)]
struct Cli {
    /// Artifact directory (overrides configuration)
    #[arg(short, long, global = true, env = "HEART_RISK_ARTIFACTS")]
    artifacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit encoder, scaler and classifier from a CSV dataset and commit them
    Train {
        /// Dataset path (overrides configuration)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Held-out proportion
        #[arg(long)]
        test_size: Option<f64>,

        /// Seed for the split and the forest
        #[arg(long)]
        seed: Option<u64>,

        /// Number of trees
        #[arg(long)]
        n_trees: Option<usize>,

        /// Maximum tree depth
        #[arg(long)]
        max_depth: Option<u16>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score one patient given as a JSON object
    Predict {
        /// JSON file with the 13 patient fields; `-` reads stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Name recorded in the prediction log
        #[arg(short, long)]
        username: Option<String>,

        /// Prediction log path (overrides configuration)
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Show metadata of the committed artifacts
    Inspect,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load().context("Failed to load configuration")?;
    telemetry::init(&config.observability)?;

    if let Some(dir) = cli.artifacts {
        config.artifacts.dir = dir;
    }

    match cli.command {
        Commands::Train {
            dataset,
            test_size,
            seed,
            n_trees,
            max_depth,
            json,
        } => {
            let settings = &mut config.training;
            if let Some(path) = dataset {
                settings.dataset_path = path;
            }
            if let Some(test_size) = test_size {
                settings.test_size = test_size;
            }
            if let Some(seed) = seed {
                settings.seed = seed;
            }
            if let Some(n_trees) = n_trees {
                settings.n_trees = n_trees;
            }
            if max_depth.is_some() {
                settings.max_depth = max_depth;
            }

            let store = FileArtifactStore::new(&config.artifacts.dir)?;
            let pipeline = TrainingPipeline::new(TrainingConfig::from(&config.training));
            let report = pipeline.run(&store).context("Training failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
                println!();
                println!("Artifacts written to {}", config.artifacts.dir.display());
            }
        }

        Commands::Predict {
            input,
            username,
            log,
        } => {
            let raw = if input == "-" {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                buffer
            } else {
                std::fs::read_to_string(&input)
                    .with_context(|| format!("Cannot read {}", input))?
            };
            let patient: PatientInput =
                serde_json::from_str(&raw).context("Input is not a valid patient JSON object")?;

            let store = FileArtifactStore::open_existing(&config.artifacts.dir)?;
            let log_path = log.unwrap_or(config.prediction_log.path);
            let pipeline = InferencePipeline::load(&store, Arc::new(CsvPredictionLog::new(log_path)))?;

            let outcome = pipeline.predict(&patient, username.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Commands::Inspect => {
            let store = FileArtifactStore::open_existing(&config.artifacts.dir)?;
            let artifacts = ArtifactSet::load(&store, &FeatureSchema::heart_disease())?;
            let metadata = artifacts.classifier.metadata();

            println!("Run:        {}", artifacts.run_id);
            println!("Created:    {}", artifacts.created_at);
            println!("Model:      {} ({})", metadata.name, metadata.model_type);
            println!("Version:    {}", metadata.version);
            println!("Trained on: {} rows", metadata.n_training_samples);
            println!("Features:   {}", metadata.feature_names.join(", "));
            for (key, value) in &metadata.hyperparameters {
                println!("  {} = {}", key, value);
            }
            println!();
            println!("Categories:");
            for mapping in artifacts.codec.encoder().mappings() {
                println!("  {}: {}", mapping.field(), mapping.classes().join(" | "));
            }
            if let Some(metrics) = &metadata.validation_metrics {
                println!();
                println!("Accuracy: {:.4}", metrics.accuracy);
                println!("Classification Report:");
                println!("{}", metrics.report());
            }
        }
    }

    Ok(())
}
