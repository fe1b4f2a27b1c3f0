//! Application configuration
//!
//! An optional TOML file tunes the model families and the image pipeline.
//! Every field has a default, so an empty file (or no file) is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::{ClassifierError, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Side length images are resized to (square)
    pub image_size: usize,
    /// Number of classes the registered models predict
    pub num_classes: usize,
    /// Optional class names used to label predictions
    pub class_names: Vec<String>,
    /// Seed for shuffling, augmentation and weight init
    pub seed: u64,
    /// Default log level when `--verbose` is not given
    pub log_level: String,
    pub cnn: CnnSettings,
    pub baseline: BaselineSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            image_size: 128,
            num_classes: 10,
            class_names: Vec::new(),
            seed: 42,
            log_level: "info".to_string(),
            cnn: CnnSettings::default(),
            baseline: BaselineSettings::default(),
        }
    }
}

/// Settings for the `CNN` family
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CnnSettings {
    pub base_filters: usize,
    pub dropout_rate: f64,
}

impl Default for CnnSettings {
    fn default() -> Self {
        Self {
            base_filters: 32,
            dropout_rate: 0.3,
        }
    }
}

/// Settings for the `baseline` family
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BaselineSettings {
    pub hidden_units: usize,
}

impl Default for BaselineSettings {
    fn default() -> Self {
        Self { hidden_units: 128 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| ClassifierError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.image_size < 16 {
            return Err(ClassifierError::Config(format!(
                "image_size must be at least 16, got {}",
                self.image_size
            )));
        }
        if self.num_classes == 0 {
            return Err(ClassifierError::Config(
                "num_classes must be greater than zero".to_string(),
            ));
        }
        if !self.class_names.is_empty() && self.class_names.len() != self.num_classes {
            return Err(ClassifierError::Config(format!(
                "class_names has {} entries but num_classes is {}",
                self.class_names.len(),
                self.num_classes
            )));
        }
        if !(0.0..1.0).contains(&self.cnn.dropout_rate) {
            return Err(ClassifierError::Config(format!(
                "cnn.dropout_rate must be in [0, 1), got {}",
                self.cnn.dropout_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = AppConfig::from_toml(
            r#"
            image_size = 64
            num_classes = 3
            class_names = ["cat", "dog", "bird"]

            [cnn]
            base_filters = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.image_size, 64);
        assert_eq!(config.num_classes, 3);
        assert_eq!(config.cnn.base_filters, 8);
        assert_eq!(config.cnn.dropout_rate, 0.3);
        assert_eq!(config.baseline.hidden_units, 128);
    }

    #[test]
    fn test_class_names_must_match_count() {
        let err = AppConfig::from_toml("num_classes = 2\nclass_names = [\"a\"]").unwrap_err();
        assert!(matches!(err, ClassifierError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ClassifierError::Config(_)));
    }
}
