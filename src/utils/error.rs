//! Error Handling Module
//!
//! Defines the error taxonomy for the classifier library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for classifier operations
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// The requested model type is not in the registry
    #[error("Unknown model type '{name}' (expected one of: {known})")]
    UnknownModelType { name: String, known: String },

    /// No checkpoint exists at the given location
    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(PathBuf),

    /// Checkpoint tensors do not fit the architecture they are loaded into
    #[error("Checkpoint does not match the model architecture: {0}")]
    ShapeMismatch(String),

    /// A dataset split directory is missing, empty or inconsistent
    #[error("Invalid dataset directory '{path}': {reason}")]
    DatasetDirectoryInvalid { path: PathBuf, reason: String },

    /// Loss, optimizer or metric configuration is unusable
    #[error("Compilation error: {0}")]
    CompilationConfigError(String),

    /// Error loading or decoding an image
    #[error("Failed to load image at '{0}': {1}")]
    Image(PathBuf, String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Recorder (weights file) error
    #[error("Record error: {0}")]
    Record(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::Serialization(err.to_string())
    }
}

impl From<burn::record::RecorderError> for ClassifierError {
    fn from(err: burn::record::RecorderError) -> Self {
        ClassifierError::Record(format!("{:?}", err))
    }
}

/// Convenience Result type for classifier operations
pub type Result<T> = std::result::Result<T, ClassifierError>;

impl ClassifierError {
    /// Build a `DatasetDirectoryInvalid` error
    pub fn dataset(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ClassifierError::DatasetDirectoryInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
