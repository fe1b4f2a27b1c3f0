//! A single module type covering every registered model family

use burn::{
    module::Module,
    tensor::{activation::softmax, backend::Backend, Tensor},
};

use super::{baseline::Baseline, cnn::Cnn};

/// Image classifier of any registered family
///
/// Dispatches the forward pass to the wrapped architecture so that training,
/// checkpointing and inference are written once for all families.
#[derive(Module, Debug)]
pub enum ImageClassifier<B: Backend> {
    Baseline(Baseline<B>),
    Cnn(Cnn<B>),
}

impl<B: Backend> ImageClassifier<B> {
    /// Logits of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            ImageClassifier::Baseline(m) => m.forward(x),
            ImageClassifier::Cnn(m) => m.forward(x),
        }
    }

    /// Class probabilities of shape [batch_size, num_classes]
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        match self {
            ImageClassifier::Baseline(m) => m.num_classes(),
            ImageClassifier::Cnn(m) => m.num_classes(),
        }
    }
}
