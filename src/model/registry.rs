//! Model registry
//!
//! Maps the model-type names accepted on the command line to factories that
//! build untrained models. The registry is built once from [`AppConfig`] and
//! handed by reference to whoever needs to construct a model.

use std::collections::BTreeMap;

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use super::{baseline::BaselineConfig, classifier::ImageClassifier, cnn::CnnConfig};
use crate::config::AppConfig;
use crate::utils::error::{ClassifierError, Result};
use crate::IMAGE_CHANNELS;

/// Names of the registered model families, in CLI order
pub const MODEL_TYPES: &[&str] = &["baseline", "CNN"];

/// Default model family
pub const DEFAULT_MODEL_TYPE: &str = "CNN";

/// Architecture of one model family with its typed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", content = "config")]
pub enum ModelSpec {
    #[serde(rename = "baseline")]
    Baseline(BaselineConfig),
    #[serde(rename = "CNN")]
    Cnn(CnnConfig),
}

impl ModelSpec {
    /// Registry name of the family
    pub fn family(&self) -> &'static str {
        match self {
            ModelSpec::Baseline(_) => "baseline",
            ModelSpec::Cnn(_) => "CNN",
        }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            ModelSpec::Baseline(c) => c.num_classes,
            ModelSpec::Cnn(c) => c.num_classes,
        }
    }

    /// Declared input shape `[channels, size, size]`
    pub fn input_shape(&self) -> [usize; 3] {
        match self {
            ModelSpec::Baseline(c) => [c.in_channels, c.input_size, c.input_size],
            ModelSpec::Cnn(c) => [c.in_channels, c.input_size, c.input_size],
        }
    }

    /// Build a fresh, untrained model
    pub fn build<B: Backend>(&self, device: &B::Device) -> ImageClassifier<B> {
        match self {
            ModelSpec::Baseline(c) => ImageClassifier::Baseline(c.init(device)),
            ModelSpec::Cnn(c) => ImageClassifier::Cnn(c.init(device)),
        }
    }
}

/// Named factory for one model family
#[derive(Debug, Clone)]
pub struct ModelFactory {
    name: &'static str,
    spec: ModelSpec,
}

impl ModelFactory {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn num_classes(&self) -> usize {
        self.spec.num_classes()
    }

    pub fn input_shape(&self) -> [usize; 3] {
        self.spec.input_shape()
    }

    pub fn build<B: Backend>(&self, device: &B::Device) -> ImageClassifier<B> {
        self.spec.build(device)
    }
}

/// Immutable name -> factory mapping
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    factories: BTreeMap<&'static str, ModelFactory>,
}

impl ModelRegistry {
    /// Register every model family using the settings from `config`
    pub fn from_config(config: &AppConfig) -> Self {
        let baseline = BaselineConfig::new()
            .with_num_classes(config.num_classes)
            .with_input_size(config.image_size)
            .with_in_channels(IMAGE_CHANNELS)
            .with_hidden_units(config.baseline.hidden_units);

        let cnn = CnnConfig::new()
            .with_num_classes(config.num_classes)
            .with_input_size(config.image_size)
            .with_in_channels(IMAGE_CHANNELS)
            .with_base_filters(config.cnn.base_filters)
            .with_dropout_rate(config.cnn.dropout_rate);

        let mut factories = BTreeMap::new();
        for spec in [ModelSpec::Baseline(baseline), ModelSpec::Cnn(cnn)] {
            let name = spec.family();
            factories.insert(name, ModelFactory { name, spec });
        }

        Self { factories }
    }

    /// Look up a factory by model-type name
    pub fn resolve(&self, name: &str) -> Result<&ModelFactory> {
        self.factories
            .get(name)
            .ok_or_else(|| ClassifierError::UnknownModelType {
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }

    /// Registered names
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
