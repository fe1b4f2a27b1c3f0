//! Single-image and list-file prediction
//!
//! Each prediction is reported as one tab-separated line:
//! `<file stem>\t<label>\t<confidence>\t<raw output>`.

use std::io::Write;
use std::path::{Path, PathBuf};

use burn::tensor::backend::Backend;
use tracing::debug;

use crate::checkpoint::InferenceModel;
use crate::dataset::{ImageBatcher, ImageItem};
use crate::model::ImageClassifier;
use crate::utils::error::{ClassifierError, Result};

/// Prediction for one image
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Class name, or the class index when no names are known
    pub label: String,
    pub class_index: usize,
    /// Probability of the predicted class
    pub confidence: f32,
    /// Full softmax output
    pub raw: Vec<f32>,
}

/// Runs a loaded model over individual images
pub struct Predictor<B: Backend> {
    model: ImageClassifier<B>,
    batcher: ImageBatcher<B>,
    image_size: usize,
    class_names: Vec<String>,
}

impl<B: Backend> Predictor<B> {
    /// Wrap a loaded model
    ///
    /// Labels come from the bundle's class names, then from `fallback_names`
    /// when it has one entry per class, else the class index is printed.
    pub fn new(loaded: InferenceModel<B>, fallback_names: &[String], device: B::Device) -> Self {
        let image_size = loaded.image_size();
        let num_classes = loaded.model.num_classes();

        let class_names = if loaded.class_names.len() == num_classes {
            loaded.class_names
        } else if fallback_names.len() == num_classes {
            fallback_names.to_vec()
        } else {
            Vec::new()
        };

        Self {
            model: loaded.model,
            batcher: ImageBatcher::new(device, image_size),
            image_size,
            class_names,
        }
    }

    fn label_for(&self, index: usize) -> String {
        self.class_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }

    /// Predict the class of one image file
    pub fn predict_one(&self, image_path: &Path) -> Result<Prediction> {
        let item = ImageItem::load(image_path, 0, self.image_size, false)?;
        let images = self.batcher.images_tensor(item.image, 1);

        let probs = self.model.forward_softmax(images);
        let raw: Vec<f32> = probs
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| ClassifierError::Serialization(format!("{:?}", e)))?;

        let (class_index, confidence) = raw
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });

        debug!(
            "{:?}: class {} ({:.4})",
            image_path, class_index, confidence
        );

        Ok(Prediction {
            label: self.label_for(class_index),
            class_index,
            confidence,
            raw,
        })
    }

    /// Predict every image named by `input` and write one line per image
    ///
    /// `input` ending in `.txt` is read as a list of image paths, one per line;
    /// blank lines are skipped. Any other path is treated as a single image.
    pub fn predict_to<W: Write>(&self, input: &Path, out: &mut W) -> Result<Vec<Prediction>> {
        let mut predictions = Vec::new();

        for path in image_list(input)? {
            let prediction = self.predict_one(&path)?;
            writeln!(out, "{}", format_line(&path, &prediction))?;
            predictions.push(prediction);
        }

        Ok(predictions)
    }
}

/// Expand the `--image` argument into the images to predict
pub fn image_list(input: &Path) -> Result<Vec<PathBuf>> {
    let is_list = input
        .extension()
        .map(|ext| ext == "txt")
        .unwrap_or(false);

    if !is_list {
        return Ok(vec![input.to_path_buf()]);
    }

    let content = std::fs::read_to_string(input)?;
    Ok(content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Format one output line
pub fn format_line(path: &Path, prediction: &Prediction) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let raw: Vec<String> = prediction.raw.iter().map(|p| format!("{:.6}", p)).collect();

    format!(
        "{}\t{}\t{:.6}\t[{}]",
        stem,
        prediction.label,
        prediction.confidence,
        raw.join(", ")
    )
}
