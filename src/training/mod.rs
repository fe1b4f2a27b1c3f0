//! Training module
//!
//! This module provides:
//! - The compilation step binding loss, optimizer and metrics to a model
//! - The fit loop with per-epoch validation
//! - Reduce-on-plateau and early-stopping policies
//! - Orchestration of a complete `train` run

pub mod callbacks;
pub mod compile;
pub mod metrics;
pub mod orchestrator;
pub mod trainer;

pub use callbacks::{EarlyStopping, ReduceLrOnPlateau};
pub use compile::{compile, CompileSpec, CompiledModel, LossSpec, MetricKind, OptimizerSpec};
pub use metrics::MetricAccumulator;
pub use orchestrator::{run_training, steps_for, ModelSummary, TrainingArgs, TrainingSummary};
pub use trainer::{evaluate_split, EpochLog, FitResult, History, Trainer};

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 100;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 80;

/// Default learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 1e-4;
