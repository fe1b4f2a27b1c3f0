//! `train` orchestration
//!
//! Resolves the model type, opens the train and validation splits, compiles
//! the model, fits it and optionally persists a bundle.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::tensor::backend::AutodiffBackend;
use tracing::info;

use super::compile::{compile, LossSpec, MetricKind, OptimizerSpec};
use super::trainer::{History, Trainer};
use crate::checkpoint::{save_bundle, BundleManifest};
use crate::config::AppConfig;
use crate::dataset::{get_dataset, LoaderOptions, Split};
use crate::model::ModelRegistry;
use crate::utils::error::{ClassifierError, Result};
use crate::VALIDATION_BATCH_SIZE;

/// Number of batches needed to cover `n` examples
pub fn steps_for(n: usize, batch_size: usize) -> usize {
    n.div_ceil(batch_size.max(1))
}

/// Hyperparameters of one `train` invocation
#[derive(Debug, Clone)]
pub struct TrainingArgs {
    pub data_dir: PathBuf,
    pub batch_size: usize,
    pub epochs: usize,
    pub model_type: String,
    pub learning_rate: f64,
    pub label_smoothing: f32,
    pub save_to: Option<String>,
    pub show_progress: bool,
}

impl TrainingArgs {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            batch_size: super::DEFAULT_BATCH_SIZE,
            epochs: super::DEFAULT_EPOCHS,
            model_type: crate::model::DEFAULT_MODEL_TYPE.to_string(),
            learning_rate: super::DEFAULT_LEARNING_RATE,
            label_smoothing: 0.0,
            save_to: None,
            show_progress: true,
        }
    }
}

/// Model summary printed after fitting
#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub family: String,
    pub input_shape: [usize; 3],
    pub num_classes: usize,
    pub num_params: usize,
}

impl std::fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [c, h, w] = self.input_shape;
        writeln!(f, "Model: {}", self.family)?;
        writeln!(f, "  Input shape:  [{}, {}, {}]", c, h, w)?;
        writeln!(f, "  Classes:      {}", self.num_classes)?;
        write!(
            f,
            "  Parameters:   {}",
            crate::utils::format_number(self.num_params)
        )
    }
}

/// Result of a completed `train` run
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub history: History,
    pub train_examples: usize,
    pub val_examples: usize,
    pub steps_per_epoch: usize,
    pub validation_steps: usize,
    pub model: ModelSummary,
    /// Bundle directory, when `save_to` was given
    pub saved_to: Option<PathBuf>,
}

/// Run one training session
///
/// Every configuration error (unknown model type, unusable dataset, bad
/// hyperparameters, class-count mismatch) is reported before the first epoch.
pub fn run_training<B: AutodiffBackend>(
    registry: &ModelRegistry,
    args: &TrainingArgs,
    config: &AppConfig,
    artifacts_dir: &Path,
    device: &B::Device,
) -> Result<TrainingSummary> {
    let factory = registry.resolve(&args.model_type)?;
    info!("Training arguments: {:?}", args);

    let image_size = factory.input_shape()[1];
    let (mut train_loader, n_train) = get_dataset(
        &args.data_dir,
        Split::Train,
        LoaderOptions::training(args.batch_size, image_size, config.seed),
    )?;
    let (mut val_loader, n_val) = get_dataset(
        &args.data_dir,
        Split::Val,
        LoaderOptions::inference(VALIDATION_BATCH_SIZE, image_size),
    )?;

    if val_loader.class_names() != train_loader.class_names() {
        return Err(ClassifierError::dataset(
            args.data_dir.join(Split::Val.dir_name()),
            format!(
                "class folders {:?} differ from the training split {:?}",
                val_loader.class_names(),
                train_loader.class_names()
            ),
        ));
    }

    let steps_per_epoch = steps_for(n_train, args.batch_size);
    let validation_steps = steps_for(n_val, VALIDATION_BATCH_SIZE);
    info!(
        "{} steps per epoch, {} validation steps",
        steps_per_epoch, validation_steps
    );

    if train_loader.num_classes() != factory.num_classes() {
        return Err(ClassifierError::CompilationConfigError(format!(
            "dataset has {} classes but model '{}' outputs {}",
            train_loader.num_classes(),
            factory.name(),
            factory.num_classes()
        )));
    }

    B::seed(config.seed);
    let model = factory.build::<B>(device);
    let compiled = compile(
        model,
        LossSpec::new(args.label_smoothing),
        OptimizerSpec::sgd_nesterov(args.learning_rate),
        vec![MetricKind::CategoricalAccuracy],
        device,
    )?;

    println!(
        "Train on {} examples. Validate on {} examples.",
        n_train, n_val
    );

    let result = Trainer::new(compiled, device.clone())
        .with_progress(args.show_progress)
        .fit(&mut train_loader, &mut val_loader, args.epochs)?;

    let summary = ModelSummary {
        family: factory.name().to_string(),
        input_shape: factory.input_shape(),
        num_classes: factory.num_classes(),
        num_params: result.model.num_params(),
    };

    let saved_to = match &args.save_to {
        Some(name) => {
            let manifest = BundleManifest::new(
                factory.spec().clone(),
                Some(result.spec.clone()),
                train_loader.class_names().to_vec(),
                result.history.epochs_run(),
                result.history.best_val_loss,
            );
            let dir = artifacts_dir.join(name);
            Some(save_bundle(&dir, &result.model, &result.optimizer, &manifest)?)
        }
        None => None,
    };

    Ok(TrainingSummary {
        history: result.history,
        train_examples: n_train,
        val_examples: n_val,
        steps_per_epoch,
        validation_steps,
        model: summary,
        saved_to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::folder::test_support::write_split;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    fn small_config(num_classes: usize) -> AppConfig {
        let mut config = AppConfig::default();
        config.image_size = 16;
        config.num_classes = num_classes;
        config.cnn.base_filters = 2;
        config.baseline.hidden_units = 4;
        config
    }

    #[test]
    fn test_steps_for() {
        assert_eq!(steps_for(1000, 80), 13);
        assert_eq!(steps_for(960, 80), 12);
        assert_eq!(steps_for(1, 512), 1);
        assert_eq!(steps_for(0, 80), 0);
    }

    #[test]
    fn test_unknown_model_type_fails_before_io() {
        let config = small_config(2);
        let registry = ModelRegistry::from_config(&config);
        let mut args = TrainingArgs::new("/nonexistent/data");
        args.model_type = "ResNet".to_string();

        let err = run_training::<TestAutodiffBackend>(
            &registry,
            &args,
            &config,
            Path::new("/nonexistent/out"),
            &Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ClassifierError::UnknownModelType { .. }));
    }

    #[test]
    fn test_missing_dataset() {
        let config = small_config(2);
        let registry = ModelRegistry::from_config(&config);
        let args = TrainingArgs::new("/nonexistent/data");

        let err = run_training::<TestAutodiffBackend>(
            &registry,
            &args,
            &config,
            Path::new("/nonexistent/out"),
            &Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ClassifierError::DatasetDirectoryInvalid { .. }));
    }

    #[test]
    fn test_class_count_mismatch() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "train", &["a", "b", "c"], 1);
        write_split(dir.path(), "val", &["a", "b", "c"], 1);

        let config = small_config(2);
        let registry = ModelRegistry::from_config(&config);
        let args = TrainingArgs::new(dir.path());

        let err = run_training::<TestAutodiffBackend>(
            &registry,
            &args,
            &config,
            dir.path(),
            &Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ClassifierError::CompilationConfigError(_)));
    }

    #[test]
    fn test_validation_classes_must_match() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "train", &["a", "b"], 1);
        write_split(dir.path(), "val", &["a", "x"], 1);

        let config = small_config(2);
        let registry = ModelRegistry::from_config(&config);
        let args = TrainingArgs::new(dir.path());

        let err = run_training::<TestAutodiffBackend>(
            &registry,
            &args,
            &config,
            dir.path(),
            &Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ClassifierError::DatasetDirectoryInvalid { .. }));
    }

    #[test]
    fn test_short_run_without_save() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "train", &["a", "b"], 3);
        write_split(dir.path(), "val", &["a", "b"], 2);

        let config = small_config(2);
        let registry = ModelRegistry::from_config(&config);
        let mut args = TrainingArgs::new(dir.path());
        args.epochs = 2;
        args.batch_size = 4;
        args.model_type = "baseline".to_string();
        args.show_progress = false;

        let out = dir.path().join("saved_models");
        let summary = run_training::<TestAutodiffBackend>(
            &registry,
            &args,
            &config,
            &out,
            &Default::default(),
        )
        .unwrap();

        assert_eq!(summary.train_examples, 6);
        assert_eq!(summary.val_examples, 4);
        assert_eq!(summary.steps_per_epoch, 2);
        assert_eq!(summary.validation_steps, 1);
        assert_eq!(summary.history.epochs_run(), 2);
        assert!(summary.saved_to.is_none());
        assert!(!out.exists());
        assert!(summary.model.num_params > 0);
    }
}
