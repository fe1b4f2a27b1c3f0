//! Image classifier CLI
//!
//! Entry point for the `predict`, `evaluate` and `train` subcommands.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::builder::{PossibleValuesParser, RangedU64ValueParser};
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use image_classifier::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use image_classifier::inference::{evaluate, Predictor};
use image_classifier::model::{DEFAULT_MODEL_TYPE, MODEL_TYPES};
use image_classifier::training::{
    run_training, TrainingArgs, DEFAULT_BATCH_SIZE, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE,
};
use image_classifier::utils::logging::{init_logging, LogConfig};
use image_classifier::{AppConfig, CheckpointLoader, ModelRegistry, ARTIFACTS_DIR};

/// Train, evaluate and run image classification models
#[derive(Parser, Debug)]
#[command(name = "image_classifier")]
#[command(version)]
#[command(about = "Image classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Predict the class of an image, or of every image listed in a .txt file
    Predict {
        /// Weights file, or bundle directory with --use-h5
        #[arg(long, alias = "mp")]
        model_path: PathBuf,

        /// Model architecture of a bare weights file
        #[arg(long, alias = "mt", default_value = DEFAULT_MODEL_TYPE,
              value_parser = PossibleValuesParser::new(MODEL_TYPES.iter().copied()))]
        model_type: String,

        /// Treat --model-path as a self-describing bundle
        #[arg(long, alias = "h5")]
        use_h5: bool,

        /// Image file, or .txt file with one image path per line
        #[arg(short = 'i', long)]
        image: PathBuf,
    },

    /// Evaluate a model on the test split of a dataset
    Evaluate {
        /// Weights file, or bundle directory with --use-h5
        #[arg(long, alias = "mp")]
        model_path: PathBuf,

        /// Model architecture of a bare weights file
        #[arg(long, alias = "mt", default_value = DEFAULT_MODEL_TYPE,
              value_parser = PossibleValuesParser::new(MODEL_TYPES.iter().copied()))]
        model_type: String,

        /// Treat --model-path as a self-describing bundle
        #[arg(long, alias = "h5")]
        use_h5: bool,

        /// Dataset root containing a test/ split
        #[arg(short = 'd', long)]
        data_dir: PathBuf,

        /// Evaluation batch size
        #[arg(short = 'b', long, default_value_t = DEFAULT_BATCH_SIZE,
              value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        batch_size: usize,
    },

    /// Train a model on the train/ and val/ splits of a dataset
    Train {
        /// Dataset root containing train/ and val/ splits
        #[arg(short = 'd', long)]
        data_dir: PathBuf,

        /// Training batch size
        #[arg(short = 'b', long, default_value_t = DEFAULT_BATCH_SIZE,
              value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        batch_size: usize,

        /// Maximum number of epochs
        #[arg(short = 'e', long, default_value_t = DEFAULT_EPOCHS)]
        epochs: usize,

        /// Model architecture to train
        #[arg(long, alias = "mt", default_value = DEFAULT_MODEL_TYPE)]
        model_type: String,

        /// Initial learning rate
        #[arg(long, alias = "lr", default_value_t = DEFAULT_LEARNING_RATE)]
        learning_rate: f64,

        /// Label smoothing in [0, 1]
        #[arg(long, alias = "ls", default_value_t = 0.0)]
        label_smoothing: f32,

        /// Save the trained bundle under saved_models/NAME
        #[arg(short = 's', long, value_name = "NAME")]
        save_to: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    let _ = init_logging(&LogConfig::for_cli(cli.verbose, &config.log_level));

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    info!("Backend: {}", backend_name());
    let registry = ModelRegistry::from_config(&config);

    match command {
        Commands::Predict {
            model_path,
            model_type,
            use_h5,
            image,
        } => cmd_predict(&registry, &config, &model_path, &model_type, use_h5, &image),

        Commands::Evaluate {
            model_path,
            model_type,
            use_h5,
            data_dir,
            batch_size,
        } => cmd_evaluate(&registry, &model_path, &model_type, use_h5, &data_dir, batch_size),

        Commands::Train {
            data_dir,
            batch_size,
            epochs,
            model_type,
            learning_rate,
            label_smoothing,
            save_to,
        } => {
            let args = TrainingArgs {
                data_dir,
                batch_size,
                epochs,
                model_type,
                learning_rate,
                label_smoothing,
                save_to,
                show_progress: true,
            };
            cmd_train(&registry, &config, &args)
        }
    }
}

fn cmd_predict(
    registry: &ModelRegistry,
    config: &AppConfig,
    model_path: &Path,
    model_type: &str,
    use_h5: bool,
    image: &Path,
) -> Result<()> {
    let device = default_device();
    let loaded = CheckpointLoader::new(registry).load::<DefaultBackend>(
        model_path,
        model_type,
        use_h5,
        &device,
    )?;

    let predictor = Predictor::new(loaded, &config.class_names, device);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    predictor.predict_to(image, &mut out)?;

    Ok(())
}

fn cmd_evaluate(
    registry: &ModelRegistry,
    model_path: &Path,
    model_type: &str,
    use_h5: bool,
    data_dir: &Path,
    batch_size: usize,
) -> Result<()> {
    let device = default_device();
    let loaded = CheckpointLoader::new(registry).load::<DefaultBackend>(
        model_path,
        model_type,
        use_h5,
        &device,
    )?;

    let report = evaluate(&loaded, data_dir, batch_size, &device)?;

    println!("{}", "Evaluation".cyan().bold());
    println!("  {}", report);

    Ok(())
}

fn cmd_train(registry: &ModelRegistry, config: &AppConfig, args: &TrainingArgs) -> Result<()> {
    println!("{}", "Training".green().bold());

    let device = default_device();
    let summary = run_training::<TrainingBackend>(
        registry,
        args,
        config,
        Path::new(ARTIFACTS_DIR),
        &device,
    )?;

    println!();
    println!("{}", summary.model);

    if let Some(last) = summary.history.last() {
        println!();
        println!(
            "{} after {} epochs{}",
            "Training complete".green().bold(),
            summary.history.epochs_run(),
            if summary.history.stopped_early {
                " (early stop)".yellow().to_string()
            } else {
                String::new()
            }
        );
        println!(
            "  Best val_loss: {:.4} (epoch {})",
            summary.history.best_val_loss,
            summary.history.best_epoch + 1
        );
        println!(
            "  Last epoch: loss {:.4}, acc {:.2}%, val_loss {:.4}, val_acc {:.2}%",
            last.loss,
            last.accuracy * 100.0,
            last.val_loss,
            last.val_accuracy * 100.0
        );
    }

    if let Some(dir) = &summary.saved_to {
        println!("  Saved to: {}", dir.display());
    }

    Ok(())
}
