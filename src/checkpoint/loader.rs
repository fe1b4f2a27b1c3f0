//! Checkpoint loading
//!
//! Rebuilds a model either from a bundle (architecture from the manifest) or
//! from bare weights plus a model type resolved through the registry. Every
//! tensor in the checkpoint must have the shape of the freshly built model;
//! optimizer state is never read.

use std::path::{Path, PathBuf};

use burn::{
    module::{Module, ModuleVisitor, ParamId},
    record::{CompactRecorder, Recorder, RecorderError},
    tensor::{backend::Backend, Tensor},
};
use tracing::{debug, info};

use super::bundle::{BundleManifest, WEIGHTS_FILE};
use crate::model::{ImageClassifier, ModelRegistry, ModelSpec};
use crate::training::compile::CompileSpec;
use crate::utils::error::{ClassifierError, Result};

/// A model restored for inference
#[derive(Debug)]
pub struct InferenceModel<B: Backend> {
    pub model: ImageClassifier<B>,
    pub spec: ModelSpec,
    /// Class names stored in the bundle, empty for bare weights
    pub class_names: Vec<String>,
    /// Compile settings stored in the bundle
    pub compile: Option<CompileSpec>,
}

impl<B: Backend> InferenceModel<B> {
    pub fn image_size(&self) -> usize {
        self.spec.input_shape()[1]
    }
}

/// Collects the shape of every float tensor in visiting order
#[derive(Default)]
struct ShapeCollector {
    shapes: Vec<Vec<usize>>,
}

impl<B: Backend> ModuleVisitor<B> for ShapeCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.shapes.push(tensor.dims().to_vec());
    }
}

fn tensor_shapes<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<usize>> {
    let mut collector = ShapeCollector::default();
    module.visit(&mut collector);
    collector.shapes
}

/// Serde messages raised when a well-formed record has another module layout
const LAYOUT_ERRORS: &[&str] = &[
    "missing field",
    "unknown field",
    "unknown variant",
    "invalid type",
    "invalid length",
];

/// A record that decodes but does not fit is an architecture mismatch;
/// anything else (truncated, unreadable) is a damaged checkpoint.
fn decode_error(path: &Path, err: RecorderError) -> ClassifierError {
    match err {
        RecorderError::DeserializeError(msg) if LAYOUT_ERRORS.iter().any(|p| msg.contains(p)) => {
            ClassifierError::ShapeMismatch(format!(
                "{} does not match this architecture: {}",
                path.display(),
                msg
            ))
        }
        other => ClassifierError::Record(format!("{}: {:?}", path.display(), other)),
    }
}

/// Decode `path` as a record of `fresh` and load it, checking every shape
fn load_module<B: Backend, M: Module<B>>(fresh: M, path: &Path, device: &B::Device) -> Result<M> {
    let recorder = CompactRecorder::new();
    let record: M::Record =
        <CompactRecorder as Recorder<B>>::load(&recorder, path.to_path_buf(), device)
            .map_err(|e| decode_error(path, e))?;

    let expected = tensor_shapes(&fresh);
    let loaded = fresh.load_record(record);
    let found = tensor_shapes(&loaded);

    if expected.len() != found.len() {
        return Err(ClassifierError::ShapeMismatch(format!(
            "expected {} tensors, checkpoint has {}",
            expected.len(),
            found.len()
        )));
    }
    if let Some((i, (e, f))) = expected
        .iter()
        .zip(found.iter())
        .enumerate()
        .find(|(_, (e, f))| e != f)
    {
        return Err(ClassifierError::ShapeMismatch(format!(
            "tensor #{} has shape {:?}, model expects {:?}",
            i, f, e
        )));
    }

    Ok(loaded)
}

/// Build the model described by `spec` and fill it with the weights at `path`
pub fn load_weights<B: Backend>(
    spec: &ModelSpec,
    path: &Path,
    device: &B::Device,
) -> Result<ImageClassifier<B>> {
    let model = match spec.build::<B>(device) {
        ImageClassifier::Baseline(m) => ImageClassifier::Baseline(load_module(m, path, device)?),
        ImageClassifier::Cnn(m) => ImageClassifier::Cnn(load_module(m, path, device)?),
    };
    Ok(model)
}

/// Loads checkpoints against a model registry
#[derive(Debug, Clone, Copy)]
pub struct CheckpointLoader<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> CheckpointLoader<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    /// Load a model for inference
    ///
    /// With `use_bundle`, `model_path` is a bundle directory and `model_type`
    /// is ignored. Otherwise `model_type` picks the architecture and
    /// `model_path` is a weights file or a bundle directory.
    pub fn load<B: Backend>(
        &self,
        model_path: &Path,
        model_type: &str,
        use_bundle: bool,
        device: &B::Device,
    ) -> Result<InferenceModel<B>> {
        if use_bundle {
            return self.load_bundle(model_path, device);
        }

        let factory = self.registry.resolve(model_type)?;
        let weights = weights_path(model_path);
        if !weights.is_file() {
            return Err(ClassifierError::CheckpointNotFound(model_path.to_path_buf()));
        }

        info!("Loading {} weights from {:?}", factory.name(), weights);
        let model = load_weights(factory.spec(), &weights, device)?;

        Ok(InferenceModel {
            model,
            spec: factory.spec().clone(),
            class_names: Vec::new(),
            compile: None,
        })
    }

    fn load_bundle<B: Backend>(&self, dir: &Path, device: &B::Device) -> Result<InferenceModel<B>> {
        if !dir.is_dir() {
            return Err(ClassifierError::CheckpointNotFound(dir.to_path_buf()));
        }

        let manifest = BundleManifest::load(dir)?;
        let weights = dir.join(WEIGHTS_FILE);
        if !weights.is_file() {
            return Err(ClassifierError::CheckpointNotFound(weights));
        }

        info!(
            "Loading {} bundle from {:?} ({} classes)",
            manifest.model_type,
            dir,
            manifest.architecture.num_classes()
        );
        let model = load_weights(&manifest.architecture, &weights, device)?;
        debug!("Bundle created at {}", manifest.created_at);

        Ok(InferenceModel {
            model,
            spec: manifest.architecture,
            class_names: manifest.class_names,
            compile: manifest.compile,
        })
    }
}

/// Resolve a bare-weights location: a bundle directory uses its weights file
fn weights_path(model_path: &Path) -> PathBuf {
    if model_path.is_dir() {
        model_path.join(WEIGHTS_FILE)
    } else {
        model_path.with_extension("mpk")
    }
}
