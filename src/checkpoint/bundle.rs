//! Self-describing model bundles
//!
//! A bundle is a directory holding:
//! - `model.json`: manifest with the architecture, compile settings and class names
//! - `model.mpk`: weights of the family module
//! - `optimizer.mpk`: optimizer state (written for completeness, never required)

use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    optim::Optimizer,
    record::{CompactRecorder, Recorder},
    tensor::backend::{AutodiffBackend, Backend},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{ImageClassifier, ModelSpec};
use crate::training::compile::{ClassifierOptimizer, CompileSpec};
use crate::utils::error::{ClassifierError, Result};

pub const MANIFEST_FILE: &str = "model.json";
pub const WEIGHTS_FILE: &str = "model.mpk";
pub const OPTIMIZER_FILE: &str = "optimizer.mpk";

/// Contents of `model.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub model_type: String,
    pub architecture: ModelSpec,
    pub compile: Option<CompileSpec>,
    pub class_names: Vec<String>,
    pub epochs_run: usize,
    /// `None` when no epoch produced a finite validation loss
    pub best_val_loss: Option<f64>,
    pub created_at: String,
    pub version: String,
}

impl BundleManifest {
    pub fn new(
        architecture: ModelSpec,
        compile: Option<CompileSpec>,
        class_names: Vec<String>,
        epochs_run: usize,
        best_val_loss: f64,
    ) -> Self {
        Self {
            model_type: architecture.family().to_string(),
            architecture,
            compile,
            class_names,
            epochs_run,
            best_val_loss: Some(best_val_loss).filter(|v| v.is_finite()),
            created_at: chrono::Utc::now().to_rfc3339(),
            version: crate::VERSION.to_string(),
        }
    }

    /// Write the manifest into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    /// Read `dir/model.json`
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(ClassifierError::CheckpointNotFound(path));
        }
        let json = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Save the weights of `model` to `path` (extension is forced to `.mpk`)
///
/// Only the family module is written, so a weights file carries no trace of
/// which enum variant produced it.
pub fn save_weights<B: Backend>(model: &ImageClassifier<B>, path: &Path) -> Result<()> {
    let recorder = CompactRecorder::new();
    let path = path.to_path_buf();

    match model {
        ImageClassifier::Baseline(m) => m.clone().save_file(path, &recorder)?,
        ImageClassifier::Cnn(m) => m.clone().save_file(path, &recorder)?,
    }
    Ok(())
}

/// Write a full bundle (manifest, weights, optimizer state) into `dir`
pub fn save_bundle<B: AutodiffBackend>(
    dir: &Path,
    model: &ImageClassifier<B>,
    optimizer: &ClassifierOptimizer<B>,
    manifest: &BundleManifest,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    manifest.save(dir)?;
    save_weights(model, &dir.join(WEIGHTS_FILE))?;

    let recorder = CompactRecorder::new();
    <CompactRecorder as Recorder<B>>::record(&recorder, optimizer.to_record(), dir.join(OPTIMIZER_FILE))?;

    info!("Saved model bundle to {:?}", dir);
    Ok(dir.to_path_buf())
}
