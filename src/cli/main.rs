use anyhow::Context;
use clap::{Parser, Subcommand};
use flight_delay_predictor::{
    config::Config,
    ml::{artifact::ModelArtifact, pipeline::run_training},
    observability::init_tracing,
    service::{PredictRequest, PredictionService},
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fdp-cli")]
#[command(about = "Flight Delay Predictor CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Model blob path
    #[arg(long, global = true, env = "FDP_MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// Model metadata path
    #[arg(long, global = true, env = "FDP_METADATA_PATH")]
    metadata_path: Option<PathBuf>,

    /// Airports table path
    #[arg(long, global = true, env = "FDP_AIRPORTS_PATH")]
    airports_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the model and write the artifacts
    Train {
        /// Flight records CSV
        #[arg(long)]
        data: Option<PathBuf>,

        /// Seed for the split and the forest
        #[arg(short, long)]
        seed: Option<u64>,

        /// Holdout fraction
        #[arg(short, long)]
        test_size: Option<f64>,

        /// Number of trees
        #[arg(short = 'n', long)]
        n_estimators: Option<usize>,

        /// Maximum tree depth
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,

        /// Minimum samples to split a node
        #[arg(short = 'm', long)]
        min_samples_split: Option<usize>,
    },

    /// Predict delay probability from saved artifacts
    Predict {
        /// Day of week, 1 (Monday) to 7 (Sunday)
        #[arg(short, long)]
        day: i64,

        /// Origin airport id
        #[arg(short, long)]
        airport: i64,
    },

    /// Print saved model metadata
    Inspect,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load().context("failed to load configuration")?;

    if let Some(path) = cli.model_path {
        config.artifacts.model_path = path;
    }
    if let Some(path) = cli.metadata_path {
        config.artifacts.metadata_path = path;
    }
    if let Some(path) = cli.airports_path {
        config.artifacts.airports_path = path;
    }

    init_tracing(&config.observability);

    match cli.command {
        Commands::Train {
            data,
            seed,
            test_size,
            n_estimators,
            max_depth,
            min_samples_split,
        } => {
            let training = &mut config.training;
            if let Some(data) = data {
                training.data_path = data;
            }
            if let Some(seed) = seed {
                training.seed = seed;
            }
            if let Some(test_size) = test_size {
                training.test_size = test_size;
            }
            if let Some(n) = n_estimators {
                training.n_estimators = n;
            }
            if let Some(depth) = max_depth {
                training.max_depth = depth;
            }
            if let Some(min) = min_samples_split {
                training.min_samples_split = min;
            }

            let report =
                run_training(&config.training, &config.artifacts).context("training failed")?;

            println!("Model trained successfully");
            println!(
                "  Accuracy: {:.4} ({:.2}%)",
                report.accuracy,
                report.accuracy * 100.0
            );
            println!("  Records: {}", report.n_records);
            println!("  Airports: {}", report.n_airports);
            for entry in &report.metadata.feature_importance {
                println!("  Importance {}: {:.4}", entry.feature, entry.importance);
            }
            for example in &report.examples {
                println!(
                    "  Day {} at {}: {:.2}% chance of delay",
                    example.day_of_week,
                    example.airport_name,
                    example.delay_probability * 100.0
                );
            }
            println!("  Model: {}", config.artifacts.model_path.display());
            println!("  Airports table: {}", config.artifacts.airports_path.display());
        }

        Commands::Predict { day, airport } => {
            let service = PredictionService::load(&config.artifacts)
                .context("failed to load model and data")?;
            let response = service.predict(&PredictRequest::new(day, airport))?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Inspect => {
            let artifact =
                ModelArtifact::load(&config.artifacts.model_path, &config.artifacts.metadata_path)
                    .context("failed to load model artifact")?;
            println!("{}", serde_json::to_string_pretty(&artifact.metadata)?);
            println!(
                "Trees: {}, nodes: {}",
                artifact.model.n_estimators(),
                artifact
                    .model
                    .trees()
                    .iter()
                    .map(|t| t.node_count())
                    .sum::<usize>()
            );
        }
    }

    Ok(())
}
