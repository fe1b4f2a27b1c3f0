//! Inference: per-image prediction and test-split evaluation

pub mod evaluate;
pub mod predictor;

pub use evaluate::{evaluate, EvaluationReport};
pub use predictor::{format_line, image_list, Prediction, Predictor};
