//! Backend selection
//!
//! The backend is picked at compile time: CUDA when the `cuda` feature is
//! enabled, otherwise the NdArray CPU backend.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(all(feature = "ndarray", not(feature = "cuda")))]
pub type DefaultBackend = burn_ndarray::NdArray<f32>;

#[cfg(not(any(feature = "ndarray", feature = "cuda")))]
compile_error!("Enable one of the backend features: `ndarray` or `cuda`.");

/// The autodiff backend used for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device for the selected backend
pub fn default_device() -> <DefaultBackend as Backend>::Device {
    Default::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }
    #[cfg(not(feature = "cuda"))]
    {
        "NdArray (CPU)"
    }
}
