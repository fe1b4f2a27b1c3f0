//! Dataset module
//!
//! Provides the on-disk split convention (`<data_dir>/<split>/<class>/<image>`),
//! image preprocessing, augmentation and lazy batch loading.

pub mod augmentation;
pub mod batcher;
pub mod folder;
pub mod loader;

pub use augmentation::Augmenter;
pub use batcher::{ImageBatch, ImageBatcher, ImageItem, IMAGENET_MEAN, IMAGENET_STD};
pub use folder::{ImageFolder, ImageSample, Split, IMAGE_EXTENSIONS};
pub use loader::{get_dataset, LoaderOptions, SplitLoader};
