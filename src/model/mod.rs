//! Model definitions and the model registry

pub mod baseline;
pub mod classifier;
pub mod cnn;
pub mod registry;

pub use baseline::{Baseline, BaselineConfig};
pub use classifier::ImageClassifier;
pub use cnn::{Cnn, CnnConfig, ConvBlock};
pub use registry::{ModelFactory, ModelRegistry, ModelSpec, DEFAULT_MODEL_TYPE, MODEL_TYPES};
