//! Test-split evaluation

use std::fmt;
use std::path::Path;

use burn::tensor::backend::Backend;
use tracing::info;

use crate::checkpoint::InferenceModel;
use crate::dataset::{get_dataset, ImageBatcher, LoaderOptions, Split};
use crate::training::compile::{LossSpec, MetricKind};
use crate::training::evaluate_split;
use crate::utils::error::{ClassifierError, Result};

/// Aggregate metrics over the test split
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub loss: f64,
    pub accuracy: f64,
    pub examples: usize,
    pub metrics: Vec<MetricKind>,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loss: {:.4}", self.loss)?;
        for metric in &self.metrics {
            match metric {
                MetricKind::CategoricalAccuracy => write!(f, " - {}: {:.4}", metric, self.accuracy)?,
            }
        }
        write!(f, " ({} examples)", self.examples)
    }
}

/// Stream `<data_dir>/test` through the model
///
/// Uses the loss stored in the bundle when there is one, otherwise plain
/// cross-entropy.
pub fn evaluate<B: Backend>(
    loaded: &InferenceModel<B>,
    data_dir: &Path,
    batch_size: usize,
    device: &B::Device,
) -> Result<EvaluationReport> {
    let image_size = loaded.image_size();
    let (mut loader, count) = get_dataset(
        data_dir,
        Split::Test,
        LoaderOptions::inference(batch_size, image_size),
    )?;

    if loader.num_classes() != loaded.model.num_classes() {
        return Err(ClassifierError::dataset(
            data_dir.join(Split::Test.dir_name()),
            format!(
                "found {} class folders but the model predicts {} classes",
                loader.num_classes(),
                loaded.model.num_classes()
            ),
        ));
    }

    let (loss_spec, metrics) = match &loaded.compile {
        Some(spec) => (spec.loss, spec.metrics.clone()),
        None => (LossSpec::default(), vec![MetricKind::CategoricalAccuracy]),
    };

    info!("Evaluating on {} test examples", count);
    let batcher = ImageBatcher::<B>::new(device.clone(), image_size);
    let loss_fn = loss_spec.init::<B>(device);
    let totals = evaluate_split(&loaded.model, &loss_fn, &mut loader, &batcher)?;

    Ok(EvaluationReport {
        loss: totals.loss(),
        accuracy: totals.accuracy(),
        examples: totals.count(),
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::folder::test_support::write_split;
    use crate::model::{CnnConfig, ModelSpec};
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn loaded(num_classes: usize) -> InferenceModel<TestBackend> {
        let spec = ModelSpec::Cnn(
            CnnConfig::new()
                .with_num_classes(num_classes)
                .with_input_size(16)
                .with_base_filters(2),
        );
        InferenceModel {
            model: spec.build(&Default::default()),
            spec,
            class_names: Vec::new(),
            compile: None,
        }
    }

    #[test]
    fn test_evaluate_counts_every_example() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "test", &["a", "b"], 3);

        let report = evaluate(&loaded(2), dir.path(), 4, &Default::default()).unwrap();

        assert_eq!(report.examples, 6);
        assert!(report.loss.is_finite());
        assert!((0.0..=1.0).contains(&report.accuracy));
        assert!(report.to_string().contains("accuracy"));
    }

    #[test]
    fn test_class_mismatch() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "test", &["a", "b", "c"], 1);

        let err = evaluate(&loaded(2), dir.path(), 4, &Default::default()).unwrap_err();
        assert!(matches!(err, ClassifierError::DatasetDirectoryInvalid { .. }));
    }

    #[test]
    fn test_missing_test_split() {
        let dir = TempDir::new().unwrap();
        let err = evaluate(&loaded(2), dir.path(), 4, &Default::default()).unwrap_err();
        assert!(matches!(err, ClassifierError::DatasetDirectoryInvalid { .. }));
    }
}
