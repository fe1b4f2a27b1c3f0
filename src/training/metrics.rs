//! Example-weighted loss and accuracy accumulation

use burn::tensor::{backend::Backend, ElementConversion, Int, Tensor};

/// Running totals over a sequence of batches
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricAccumulator {
    loss_sum: f64,
    correct: usize,
    count: usize,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one batch given its mean loss, number of correct predictions and size
    pub fn update(&mut self, mean_loss: f64, correct: usize, batch_size: usize) {
        self.loss_sum += mean_loss * batch_size as f64;
        self.correct += correct;
        self.count += batch_size;
    }

    /// Mean loss per example
    pub fn loss(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.loss_sum / self.count as f64
        }
    }

    /// Fraction of correct predictions
    pub fn accuracy(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.correct as f64 / self.count as f64
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Number of rows whose argmax matches the target class
pub fn correct_predictions<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predictions = logits.argmax(1).squeeze::<1>(1);
    let correct: i64 = predictions
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem();
    correct.max(0) as usize
}
