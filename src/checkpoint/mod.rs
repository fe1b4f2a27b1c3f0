//! Saving and restoring trained models

pub mod bundle;
pub mod loader;

pub use bundle::{
    save_bundle, save_weights, BundleManifest, MANIFEST_FILE, OPTIMIZER_FILE, WEIGHTS_FILE,
};
pub use loader::{load_weights, CheckpointLoader, InferenceModel};
