//! Baseline fully-connected classifier
//!
//! Flattens the image and runs it through a single hidden dense layer.

use burn::{
    config::Config,
    module::Module,
    nn::{Linear, LinearConfig, Relu},
    tensor::{backend::Backend, Tensor},
};

/// Configuration for the baseline model
#[derive(Config, Debug)]
pub struct BaselineConfig {
    /// Number of output classes
    #[config(default = "10")]
    pub num_classes: usize,

    /// Input image size (assumes square images)
    #[config(default = "128")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Width of the hidden dense layer
    #[config(default = "128")]
    pub hidden_units: usize,
}

impl BaselineConfig {
    /// Build the model on `device`
    pub fn init<B: Backend>(&self, device: &B::Device) -> Baseline<B> {
        Baseline::new(self, device)
    }
}

/// Flatten -> Dense(ReLU) -> Dense
#[derive(Module, Debug)]
pub struct Baseline<B: Backend> {
    pub hidden: Linear<B>,
    pub relu: Relu,
    pub head: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> Baseline<B> {
    pub fn new(config: &BaselineConfig, device: &B::Device) -> Self {
        let flat = config.in_channels * config.input_size * config.input_size;

        Self {
            hidden: LinearConfig::new(flat, config.hidden_units).init(device),
            relu: Relu::new(),
            head: LinearConfig::new(config.hidden_units, config.num_classes).init(device),
            num_classes: config.num_classes,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, channels, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.hidden.forward(x);
        let x = self.relu.forward(x);
        self.head.forward(x)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}
