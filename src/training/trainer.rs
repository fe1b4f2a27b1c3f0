//! Fit loop
//!
//! Runs mini-batch SGD over the training split, evaluates on the validation
//! split after every epoch and applies the plateau and early-stopping policies
//! to the validation loss.

use burn::{
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLoss,
    optim::{GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::callbacks::{EarlyStopping, ReduceLrOnPlateau};
use super::compile::{ClassifierOptimizer, CompileSpec, CompiledModel};
use super::metrics::{correct_predictions, MetricAccumulator};
use crate::dataset::{ImageBatcher, SplitLoader};
use crate::model::ImageClassifier;
use crate::utils::error::Result;
use crate::utils::logging::TrainingLogger;

/// Metrics for one finished epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochLog {
    /// 0-indexed epoch
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    /// Learning rate used during the epoch
    pub learning_rate: f64,
}

/// Per-epoch record of a fit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    pub epochs: Vec<EpochLog>,
    pub stopped_early: bool,
    pub best_epoch: usize,
    pub best_val_loss: f64,
}

impl History {
    pub fn epochs_run(&self) -> usize {
        self.epochs.len()
    }

    pub fn last(&self) -> Option<&EpochLog> {
        self.epochs.last()
    }
}

/// What a fit hands back: the trained model, its optimizer and the history
pub struct FitResult<B: AutodiffBackend> {
    pub model: ImageClassifier<B>,
    pub optimizer: ClassifierOptimizer<B>,
    pub spec: CompileSpec,
    pub history: History,
}

/// Stream a split through `model` and accumulate loss and accuracy
pub fn evaluate_split<B: Backend>(
    model: &ImageClassifier<B>,
    loss_fn: &CrossEntropyLoss<B>,
    loader: &mut SplitLoader,
    batcher: &ImageBatcher<B>,
) -> Result<MetricAccumulator> {
    let mut metrics = MetricAccumulator::new();

    for indices in loader.epoch() {
        let batch = loader.load(&indices, batcher)?;
        let batch_size = indices.len();

        let output = model.forward(batch.images);
        let loss = loss_fn.forward(output.clone(), batch.targets.clone());
        let loss_value: f64 = loss.into_scalar().elem();
        let correct = correct_predictions(output, batch.targets);

        metrics.update(loss_value, correct, batch_size);
    }

    Ok(metrics)
}

/// Drives one compiled model through the fit loop
pub struct Trainer<B: AutodiffBackend> {
    compiled: CompiledModel<B>,
    device: B::Device,
    plateau: ReduceLrOnPlateau,
    early_stopping: EarlyStopping<ImageClassifier<B>>,
    show_progress: bool,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a trainer with the default plateau and early-stopping policies
    pub fn new(compiled: CompiledModel<B>, device: B::Device) -> Self {
        let plateau = ReduceLrOnPlateau::with_defaults(compiled.spec.optimizer.learning_rate);

        Self {
            compiled,
            device,
            plateau,
            early_stopping: EarlyStopping::with_defaults(),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Replace the default early-stopping policy
    pub fn with_early_stopping(mut self, early_stopping: EarlyStopping<ImageClassifier<B>>) -> Self {
        self.early_stopping = early_stopping;
        self
    }

    /// Fit for at most `epochs` epochs
    ///
    /// When early stopping triggers, the parameters from the epoch with the
    /// best validation loss are restored before returning.
    pub fn fit(
        self,
        train_loader: &mut SplitLoader,
        val_loader: &mut SplitLoader,
        epochs: usize,
    ) -> Result<FitResult<B>> {
        let Trainer {
            compiled,
            device,
            mut plateau,
            mut early_stopping,
            show_progress,
        } = self;
        let CompiledModel {
            mut model,
            loss: loss_fn,
            mut optimizer,
            spec,
        } = compiled;

        let train_batcher = ImageBatcher::<B>::new(device.clone(), train_loader.image_size());
        let mut logger = TrainingLogger::new(epochs);
        let mut history = History::default();
        let mut learning_rate = spec.optimizer.learning_rate;

        for epoch in 0..epochs {
            logger.start_epoch(epoch);

            let batches = train_loader.epoch();
            let bar = progress_bar(show_progress, epoch, epochs, batches.len());
            let mut train_metrics = MetricAccumulator::new();

            for indices in batches {
                let batch = train_loader.load(&indices, &train_batcher)?;
                let batch_size = indices.len();

                let output = model.forward(batch.images);
                let loss = loss_fn.forward(output.clone(), batch.targets.clone());
                let loss_value: f64 = loss.clone().into_scalar().elem();
                let correct = correct_predictions(output, batch.targets);
                train_metrics.update(loss_value, correct, batch_size);

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optimizer.step(learning_rate, model, grads);

                bar.inc(1);
                bar.set_message(format!(
                    "loss: {:.4} acc: {:.2}%",
                    train_metrics.loss(),
                    train_metrics.accuracy() * 100.0
                ));
            }
            bar.finish_and_clear();

            // Validation runs on the inner backend, without autodiff or dropout
            let valid = model.valid();
            let inner_device = valid.devices().first().cloned().unwrap_or_default();
            let val_batcher =
                ImageBatcher::<B::InnerBackend>::new(inner_device.clone(), val_loader.image_size());
            let val_loss_fn = spec.loss.init::<B::InnerBackend>(&inner_device);
            let val_metrics = evaluate_split(&valid, &val_loss_fn, val_loader, &val_batcher)?;

            let log = EpochLog {
                epoch,
                loss: train_metrics.loss(),
                accuracy: train_metrics.accuracy(),
                val_loss: val_metrics.loss(),
                val_accuracy: val_metrics.accuracy(),
                learning_rate,
            };
            logger.end_epoch(
                log.loss,
                log.accuracy,
                log.val_loss,
                log.val_accuracy,
                log.learning_rate,
            );
            history.epochs.push(log);

            if let Some(new_lr) = plateau.step(log.val_loss) {
                logger.log_lr_reduced(learning_rate, new_lr);
                learning_rate = new_lr;
            }

            if early_stopping.on_epoch_end(epoch, log.val_loss, &model) {
                logger.log_early_stop(early_stopping.wait(), early_stopping.best_epoch());
                if let Some(best) = early_stopping.take_best_state() {
                    model = best;
                }
                history.stopped_early = true;
                break;
            }

            debug!(
                "plateau wait {}, early stopping wait {}",
                plateau.wait(),
                early_stopping.wait()
            );
        }

        history.best_epoch = early_stopping.best_epoch();
        history.best_val_loss = early_stopping.best_metric();
        logger.log_complete(history.epochs_run(), history.best_val_loss);
        info!("Final learning rate: {:.2e}", learning_rate);

        Ok(FitResult {
            model,
            optimizer,
            spec,
            history,
        })
    }
}

fn progress_bar(show: bool, epoch: usize, epochs: usize, steps: usize) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(steps as u64);
    let style = ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    bar.set_style(style);
    bar.set_prefix(format!("Epoch {}/{}", epoch + 1, epochs));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::folder::test_support::write_split;
    use crate::dataset::{get_dataset, LoaderOptions, Split};
    use crate::model::BaselineConfig;
    use crate::training::compile::{compile, LossSpec, MetricKind, OptimizerSpec};
    use burn::backend::Autodiff;
    use burn::module::{ModuleVisitor, ParamId};
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;
    use std::path::Path;
    use tempfile::TempDir;

    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    const IMAGE_SIZE: usize = 16;

    #[derive(Default)]
    struct ParamValues(Vec<f32>);

    impl<B: Backend> ModuleVisitor<B> for ParamValues {
        fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
            self.0
                .extend(tensor.to_data().convert::<f32>().to_vec::<f32>().unwrap());
        }
    }

    fn params<B: Backend>(model: &ImageClassifier<B>) -> Vec<f32> {
        let mut values = ParamValues::default();
        model.visit(&mut values);
        values.0
    }

    fn loaders(root: &Path) -> (SplitLoader, SplitLoader) {
        let (train, _) =
            get_dataset(root, Split::Train, LoaderOptions::training(4, IMAGE_SIZE, 7)).unwrap();
        let (val, _) =
            get_dataset(root, Split::Val, LoaderOptions::inference(8, IMAGE_SIZE)).unwrap();
        (train, val)
    }

    fn trainer(model: ImageClassifier<TestAutodiffBackend>) -> Trainer<TestAutodiffBackend> {
        let compiled = compile(
            model,
            LossSpec::default(),
            OptimizerSpec::sgd_nesterov(0.5),
            vec![MetricKind::CategoricalAccuracy],
            &Default::default(),
        )
        .unwrap();
        Trainer::new(compiled, Default::default()).with_progress(false)
    }

    #[test]
    fn test_early_stop_restores_best_epoch_parameters() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "train", &["a", "b"], 4);
        write_split(dir.path(), "val", &["a", "b"], 2);

        let initial = ImageClassifier::Baseline(
            BaselineConfig::new()
                .with_num_classes(2)
                .with_input_size(IMAGE_SIZE)
                .with_hidden_units(4)
                .init::<TestAutodiffBackend>(&Default::default()),
        );

        // Reference: the state after exactly one epoch
        let (mut train, mut val) = loaders(dir.path());
        let one_epoch = trainer(initial.clone()).fit(&mut train, &mut val, 1).unwrap();

        // Without early stopping, the second epoch moves the parameters on
        let (mut train, mut val) = loaders(dir.path());
        let two_epochs = trainer(initial.clone()).fit(&mut train, &mut val, 2).unwrap();
        assert!(!two_epochs.history.stopped_early);
        assert_ne!(params(&two_epochs.model), params(&one_epoch.model));

        // Only the first epoch can count as an improvement, so epoch 2 stops
        // the run and the epoch-1 snapshot is restored.
        let (mut train, mut val) = loaders(dir.path());
        let stopped = trainer(initial)
            .with_early_stopping(EarlyStopping::new(1, -1e9))
            .fit(&mut train, &mut val, 5)
            .unwrap();

        assert!(stopped.history.stopped_early);
        assert_eq!(stopped.history.epochs_run(), 2);
        assert_eq!(stopped.history.best_epoch, 0);
        assert_eq!(params(&stopped.model), params(&one_epoch.model));
    }

    #[test]
    fn test_zero_epochs_leaves_history_empty() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "train", &["a", "b"], 2);
        write_split(dir.path(), "val", &["a", "b"], 1);

        let model = ImageClassifier::Baseline(
            BaselineConfig::new()
                .with_num_classes(2)
                .with_input_size(IMAGE_SIZE)
                .with_hidden_units(4)
                .init::<TestAutodiffBackend>(&Default::default()),
        );
        let (mut train, mut val) = loaders(dir.path());
        let result = trainer(model).fit(&mut train, &mut val, 0).unwrap();

        assert_eq!(result.history.epochs_run(), 0);
        assert!(!result.history.stopped_early);
        assert!(result.history.last().is_none());
    }
}
