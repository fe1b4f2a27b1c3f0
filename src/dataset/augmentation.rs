//! Training-time augmentation
//!
//! Only random horizontal flips are applied; they keep the label valid for
//! natural images and need no extra parameters.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Seeded augmentation policy
#[derive(Debug, Clone)]
pub struct Augmenter {
    flip_probability: f64,
}

impl Default for Augmenter {
    fn default() -> Self {
        Self {
            flip_probability: 0.5,
        }
    }
}

impl Augmenter {
    pub fn new(flip_probability: f64) -> Self {
        Self {
            flip_probability: flip_probability.clamp(0.0, 1.0),
        }
    }

    /// Decide whether the next image is flipped
    pub fn should_flip(&self, rng: &mut ChaCha8Rng) -> bool {
        rng.gen_bool(self.flip_probability)
    }
}
