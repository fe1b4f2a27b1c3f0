//! Image preprocessing and Burn batching
//!
//! Images are resized to a square, converted to CHW floats in [0, 1], and
//! normalized with the ImageNet statistics when a batch is assembled.

use std::path::{Path, PathBuf};

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};

use crate::utils::error::{ClassifierError, Result};

/// ImageNet channel means
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decode an image from disk
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .map_err(|e| ClassifierError::Image(path.to_path_buf(), e.to_string()))?
        .with_guessed_format()
        .map_err(|e| ClassifierError::Image(path.to_path_buf(), e.to_string()))?
        .decode()
        .map_err(|e| ClassifierError::Image(path.to_path_buf(), e.to_string()))
}

/// Resize to `size`x`size` and flatten to CHW floats in [0, 1]
pub fn to_chw(img: &DynamicImage, size: usize) -> Vec<f32> {
    let rgb = img
        .resize_exact(size as u32, size as u32, FilterType::Triangle)
        .to_rgb8();

    let plane = size * size;
    let mut data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = y as usize * size + x as usize;
        data[offset] = pixel[0] as f32 / 255.0;
        data[plane + offset] = pixel[1] as f32 / 255.0;
        data[2 * plane + offset] = pixel[2] as f32 / 255.0;
    }
    data
}

/// A single preprocessed image ready for batching
#[derive(Clone, Debug)]
pub struct ImageItem {
    /// Flattened CHW image data [3 * H * W]
    pub image: Vec<f32>,
    pub label: usize,
    pub path: PathBuf,
}

impl ImageItem {
    /// Load and preprocess an image, optionally mirrored horizontally
    pub fn load(path: &Path, label: usize, image_size: usize, flip: bool) -> Result<Self> {
        let img = open_image(path)?;
        let img = if flip { img.fliph() } else { img };

        Ok(Self {
            image: to_chw(&img, image_size),
            label,
            path: path.to_path_buf(),
        })
    }
}

/// A batch of images and targets
#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Class indices with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher producing normalized image tensors on a device
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    device: B::Device,
    image_size: usize,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Turn flattened CHW images into a normalized [N, 3, H, W] tensor
    pub fn images_tensor(&self, data: Vec<f32>, batch_size: usize) -> Tensor<B, 4> {
        let size = self.image_size;
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(data, [batch_size, 3, size, size]),
            &self.device,
        );

        let mean = Tensor::<B, 4>::from_floats(
            TensorData::new(IMAGENET_MEAN.to_vec(), [1, 3, 1, 1]),
            &self.device,
        );
        let std = Tensor::<B, 4>::from_floats(
            TensorData::new(IMAGENET_STD.to_vec(), [1, 3, 1, 1]),
            &self.device,
        );

        (images - mean) / std
    }
}

impl<B: Backend> Batcher<ImageItem, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>) -> ImageBatch<B> {
        let batch_size = items.len();

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let images_data: Vec<f32> = items.into_iter().flat_map(|item| item.image).collect();

        let images = self.images_tensor(images_data, batch_size);
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets_data, [batch_size]),
            &self.device,
        );

        ImageBatch { images, targets }
    }
}
