//! Split loading
//!
//! Images are decoded lazily, one batch at a time, so a split never has to fit
//! in memory.

use std::path::Path;

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::augmentation::Augmenter;
use super::batcher::{ImageBatch, ImageBatcher, ImageItem};
use super::folder::{ImageFolder, Split};
use crate::utils::error::{ClassifierError, Result};

/// How a split is batched
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub batch_size: usize,
    pub shuffle: bool,
    pub augmentation: bool,
    pub image_size: usize,
    pub seed: u64,
}

impl LoaderOptions {
    /// Shuffled and augmented
    pub fn training(batch_size: usize, image_size: usize, seed: u64) -> Self {
        Self {
            batch_size,
            shuffle: true,
            augmentation: true,
            image_size,
            seed,
        }
    }

    /// In order, no augmentation
    pub fn inference(batch_size: usize, image_size: usize) -> Self {
        Self {
            batch_size,
            shuffle: false,
            augmentation: false,
            image_size,
            seed: 0,
        }
    }
}

/// Batched access to one split
#[derive(Debug, Clone)]
pub struct SplitLoader {
    folder: ImageFolder,
    options: LoaderOptions,
    augmenter: Augmenter,
    rng: ChaCha8Rng,
}

impl SplitLoader {
    pub fn new(folder: ImageFolder, options: LoaderOptions) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(ClassifierError::Config(
                "batch size must be greater than zero".to_string(),
            ));
        }

        let rng = ChaCha8Rng::seed_from_u64(options.seed);
        Ok(Self {
            folder,
            options,
            augmenter: Augmenter::default(),
            rng,
        })
    }

    pub fn len(&self) -> usize {
        self.folder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folder.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.folder.num_classes()
    }

    pub fn class_names(&self) -> &[String] {
        &self.folder.class_names
    }

    pub fn batch_size(&self) -> usize {
        self.options.batch_size
    }

    pub fn image_size(&self) -> usize {
        self.options.image_size
    }

    /// Sample indices for one pass over the split, grouped into batches
    ///
    /// The order is reshuffled on every call when shuffling is enabled. The
    /// last batch may be smaller than the batch size.
    pub fn epoch(&mut self) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..self.folder.len()).collect();
        if self.options.shuffle {
            indices.shuffle(&mut self.rng);
        }

        indices
            .chunks(self.options.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Decode the given samples and assemble a batch
    pub fn load<B: Backend>(
        &mut self,
        indices: &[usize],
        batcher: &ImageBatcher<B>,
    ) -> Result<ImageBatch<B>> {
        let mut items = Vec::with_capacity(indices.len());
        for &idx in indices {
            let sample = &self.folder.samples[idx];
            let flip = self.options.augmentation && self.augmenter.should_flip(&mut self.rng);
            items.push(ImageItem::load(
                &sample.path,
                sample.label,
                self.options.image_size,
                flip,
            )?);
        }

        debug!("Loaded batch of {} images", items.len());
        Ok(batcher.batch(items))
    }
}

/// Open `<data_dir>/<split>` and return its loader with the example count
pub fn get_dataset(
    data_dir: &Path,
    split: Split,
    options: LoaderOptions,
) -> Result<(SplitLoader, usize)> {
    let folder = ImageFolder::open(data_dir, split)?;
    let count = folder.len();
    Ok((SplitLoader::new(folder, options)?, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::folder::test_support::write_split;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_epoch_batches_cover_split() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "train", &["a", "b"], 5);

        let (mut loader, count) =
            get_dataset(dir.path(), Split::Train, LoaderOptions::training(4, 8, 1)).unwrap();
        assert_eq!(count, 10);

        let batches = loader.epoch();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 2);

        let mut seen: Vec<usize> = batches.into_iter().flatten().collect();
        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_inference_order_is_stable() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "test", &["a", "b"], 3);

        let (mut loader, _) =
            get_dataset(dir.path(), Split::Test, LoaderOptions::inference(4, 8)).unwrap();

        assert_eq!(loader.epoch(), vec![vec![0, 1, 2, 3], vec![4, 5]]);
        assert_eq!(loader.epoch(), vec![vec![0, 1, 2, 3], vec![4, 5]]);
    }

    #[test]
    fn test_load_batch() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "val", &["a", "b", "c"], 1);

        let (mut loader, _) =
            get_dataset(dir.path(), Split::Val, LoaderOptions::inference(8, 8)).unwrap();
        let batcher = ImageBatcher::<TestBackend>::new(Default::default(), 8);
        let indices = loader.epoch().remove(0);
        let batch = loader.load(&indices, &batcher).unwrap();

        assert_eq!(batch.images.dims(), [3, 3, 8, 8]);
        assert_eq!(loader.class_names(), ["a", "b", "c"]);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dir = TempDir::new().unwrap();
        write_split(dir.path(), "train", &["a"], 1);

        let err = get_dataset(dir.path(), Split::Train, LoaderOptions::training(0, 8, 1));
        assert!(err.is_err());
    }
}
