//! Compilation step
//!
//! Binds a loss, an optimizer and a metric set to a freshly built model. All
//! hyperparameters are validated here so that a bad configuration fails before
//! any data is touched.

use burn::{
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{adaptor::OptimizerAdaptor, momentum::MomentumConfig, Sgd, SgdConfig},
    tensor::backend::{AutodiffBackend, Backend},
};
use serde::{Deserialize, Serialize};

use crate::model::ImageClassifier;
use crate::utils::error::{ClassifierError, Result};

/// Categorical cross-entropy with optional label smoothing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossSpec {
    pub label_smoothing: f32,
}

impl Default for LossSpec {
    fn default() -> Self {
        Self {
            label_smoothing: 0.0,
        }
    }
}

impl LossSpec {
    pub fn new(label_smoothing: f32) -> Self {
        Self { label_smoothing }
    }

    fn validate(&self) -> Result<()> {
        let s = self.label_smoothing;
        if !s.is_finite() || !(0.0..=1.0).contains(&s) {
            return Err(ClassifierError::CompilationConfigError(format!(
                "label smoothing must be in [0, 1], got {}",
                s
            )));
        }
        Ok(())
    }

    /// Build the loss module; a smoothing of exactly 0 uses the plain loss
    pub fn init<B: Backend>(&self, device: &B::Device) -> CrossEntropyLoss<B> {
        let smoothing = if self.label_smoothing == 0.0 {
            None
        } else {
            Some(self.label_smoothing)
        };
        CrossEntropyLossConfig::new()
            .with_smoothing(smoothing)
            .init(device)
    }
}

/// SGD with (Nesterov) momentum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSpec {
    pub learning_rate: f64,
    pub momentum: f64,
    pub nesterov: bool,
}

impl OptimizerSpec {
    /// SGD, momentum 0.9, Nesterov
    pub fn sgd_nesterov(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            momentum: 0.9,
            nesterov: true,
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ClassifierError::CompilationConfigError(format!(
                "learning rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if !self.momentum.is_finite() || !(0.0..1.0).contains(&self.momentum) {
            return Err(ClassifierError::CompilationConfigError(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }
        Ok(())
    }

    fn init<B: AutodiffBackend, M: AutodiffModule<B>>(&self) -> OptimizerAdaptor<Sgd<B::InnerBackend>, M, B> {
        let momentum = MomentumConfig::new()
            .with_momentum(self.momentum)
            .with_dampening(0.0)
            .with_nesterov(self.nesterov);

        SgdConfig::new().with_momentum(Some(momentum)).init()
    }
}

/// Metrics tracked during fit and evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    CategoricalAccuracy,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::CategoricalAccuracy => write!(f, "accuracy"),
        }
    }
}

/// Everything `compile` was called with, kept for the bundle manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileSpec {
    pub loss: LossSpec,
    pub optimizer: OptimizerSpec,
    pub metrics: Vec<MetricKind>,
}

/// Optimizer type bound by [`compile`]
pub type ClassifierOptimizer<B> =
    OptimizerAdaptor<Sgd<<B as AutodiffBackend>::InnerBackend>, ImageClassifier<B>, B>;

/// A model ready to be fitted
pub struct CompiledModel<B: AutodiffBackend> {
    pub model: ImageClassifier<B>,
    pub loss: CrossEntropyLoss<B>,
    pub optimizer: ClassifierOptimizer<B>,
    pub spec: CompileSpec,
}

/// Bind loss, optimizer and metrics to `model`
pub fn compile<B: AutodiffBackend>(
    model: ImageClassifier<B>,
    loss: LossSpec,
    optimizer: OptimizerSpec,
    metrics: Vec<MetricKind>,
    device: &B::Device,
) -> Result<CompiledModel<B>> {
    loss.validate()?;
    optimizer.validate()?;

    if model.num_classes() == 0 {
        return Err(ClassifierError::CompilationConfigError(
            "model has zero output classes".to_string(),
        ));
    }

    Ok(CompiledModel {
        model,
        loss: loss.init(device),
        optimizer: optimizer.init::<B, ImageClassifier<B>>(),
        spec: CompileSpec {
            loss,
            optimizer,
            metrics,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CnnConfig;
    use burn::backend::Autodiff;
    use burn::tensor::{Int, Tensor, TensorData};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    fn tiny_model(num_classes: usize) -> ImageClassifier<TestAutodiffBackend> {
        let config = CnnConfig::new()
            .with_num_classes(num_classes)
            .with_input_size(16)
            .with_base_filters(2);
        ImageClassifier::Cnn(config.init(&Default::default()))
    }

    fn compile_with(
        loss: LossSpec,
        optimizer: OptimizerSpec,
    ) -> Result<CompiledModel<TestAutodiffBackend>> {
        compile(
            tiny_model(3),
            loss,
            optimizer,
            vec![MetricKind::CategoricalAccuracy],
            &Default::default(),
        )
    }

    #[test]
    fn test_compile_valid() {
        let compiled = compile_with(LossSpec::new(0.1), OptimizerSpec::sgd_nesterov(1e-4)).unwrap();
        assert_eq!(compiled.spec.optimizer.momentum, 0.9);
        assert!(compiled.spec.optimizer.nesterov);
        assert_eq!(compiled.spec.metrics, vec![MetricKind::CategoricalAccuracy]);
    }

    #[test]
    fn test_invalid_label_smoothing() {
        for smoothing in [-0.1, 1.5, f32::NAN] {
            let result = compile_with(LossSpec::new(smoothing), OptimizerSpec::sgd_nesterov(1e-4));
            assert!(matches!(
                result,
                Err(ClassifierError::CompilationConfigError(_))
            ));
        }
    }

    #[test]
    fn test_invalid_learning_rate() {
        for lr in [0.0, -1e-3, f64::INFINITY] {
            let result = compile_with(LossSpec::default(), OptimizerSpec::sgd_nesterov(lr));
            assert!(matches!(
                result,
                Err(ClassifierError::CompilationConfigError(_))
            ));
        }
    }

    #[test]
    fn test_invalid_momentum() {
        let mut spec = OptimizerSpec::sgd_nesterov(1e-3);
        spec.momentum = 1.0;
        assert!(compile_with(LossSpec::default(), spec).is_err());
    }

    #[test]
    fn test_zero_smoothing_matches_plain_cross_entropy() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats(
            TensorData::new(vec![2.0f32, 0.5, -1.0, 0.1, 0.2, 3.0], [2, 3]),
            &device,
        );
        let targets =
            Tensor::<TestBackend, 1, Int>::from_data(TensorData::new(vec![0i64, 2], [2]), &device);

        let smoothed_zero = LossSpec::new(0.0)
            .init::<TestBackend>(&device)
            .forward(logits.clone(), targets.clone())
            .into_scalar();
        let plain = CrossEntropyLossConfig::new()
            .init::<TestBackend>(&device)
            .forward(logits.clone(), targets.clone())
            .into_scalar();
        let smoothed = LossSpec::new(0.2)
            .init::<TestBackend>(&device)
            .forward(logits, targets)
            .into_scalar();

        assert!((smoothed_zero - plain).abs() < 1e-6);
        assert!((smoothed - plain).abs() > 1e-4);
    }

    #[test]
    fn test_compile_spec_serializes() {
        let spec = CompileSpec {
            loss: LossSpec::new(0.1),
            optimizer: OptimizerSpec::sgd_nesterov(1e-4),
            metrics: vec![MetricKind::CategoricalAccuracy],
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("categorical_accuracy"));
        let back: CompileSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
