//! # Image Classifier
//!
//! Train, evaluate and run image classification models with the Burn framework.
//!
//! ## Modules
//!
//! - `model`: the `baseline` and `CNN` architectures and the model registry
//! - `dataset`: class-per-folder splits, preprocessing and batch loading
//! - `training`: compilation, the fit loop, plateau/early-stopping policies
//! - `checkpoint`: bundle save and checkpoint loading
//! - `inference`: prediction and test-split evaluation
//! - `config`: optional TOML application configuration
//! - `utils`: error types and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use image_classifier::{AppConfig, ModelRegistry, TrainingArgs};
//! use image_classifier::backend::{default_device, TrainingBackend};
//!
//! let config = AppConfig::default();
//! let registry = ModelRegistry::from_config(&config);
//! let mut args = TrainingArgs::new("data/flowers");
//! args.save_to = Some("flowers_cnn".into());
//!
//! let summary = image_classifier::training::run_training::<TrainingBackend>(
//!     &registry, &args, &config, "saved_models".as_ref(), &default_device(),
//! )?;
//! ```

pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

pub use checkpoint::{BundleManifest, CheckpointLoader, InferenceModel};
pub use config::AppConfig;
pub use inference::{EvaluationReport, Prediction, Predictor};
pub use model::{ImageClassifier, ModelFactory, ModelRegistry, ModelSpec};
pub use training::{TrainingArgs, TrainingSummary};
pub use utils::error::{ClassifierError, Result};

/// Directory that `train --save-to NAME` writes bundles into
pub const ARTIFACTS_DIR: &str = "saved_models";

/// Batch size used for the validation split during training
pub const VALIDATION_BATCH_SIZE: usize = 512;

/// Number of input channels (RGB)
pub const IMAGE_CHANNELS: usize = 3;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
