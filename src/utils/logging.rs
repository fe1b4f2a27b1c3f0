//! Logging Module
//!
//! Structured logging with the `tracing` crate. Log lines go to stderr so that
//! stdout stays reserved for command output (predictions, reports).

use std::io::IsTerminal;
use std::str::FromStr;
use std::time::Instant;

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level used when `RUST_LOG` is not set
    pub level: Level,
    /// Print the module path of each event
    pub show_target: bool,
    /// Colored output; off when stderr is not a terminal
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            show_target: false,
            ansi: std::io::stderr().is_terminal(),
        }
    }
}

impl LogConfig {
    /// `--verbose` wins over the configured level
    pub fn for_cli(verbose: bool, configured_level: &str) -> Self {
        if verbose {
            return Self {
                level: Level::DEBUG,
                show_target: true,
                ..Default::default()
            };
        }

        Self {
            level: parse_level(configured_level),
            ..Default::default()
        }
    }
}

/// Parse a level name from the config file; unknown names log at info
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_ascii_lowercase().as_str() {
        "warning" => Level::WARN,
        other => Level::from_str(other).unwrap_or(Level::INFO),
    }
}

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` directives take precedence over `config.level`.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_ascii_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.show_target)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("logging already initialized: {}", e))
}

/// Training progress logger
pub struct TrainingLogger {
    epoch: usize,
    total_epochs: usize,
    epoch_start: Instant,
    training_start: Instant,
}

impl TrainingLogger {
    /// Create a new training logger
    pub fn new(total_epochs: usize) -> Self {
        Self {
            epoch: 0,
            total_epochs,
            epoch_start: Instant::now(),
            training_start: Instant::now(),
        }
    }

    /// Log start of an epoch (0-indexed)
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = Instant::now();

        tracing::debug!("Epoch {}/{} started", epoch + 1, self.total_epochs);
    }

    /// Log end of an epoch with metrics
    pub fn end_epoch(
        &self,
        loss: f64,
        accuracy: f64,
        val_loss: f64,
        val_accuracy: f64,
        learning_rate: f64,
    ) {
        tracing::info!(
            "Epoch {}/{} in {:.1}s | loss: {:.4} | acc: {:.2}% | val_loss: {:.4} | val_acc: {:.2}% | lr: {:.2e}",
            self.epoch + 1,
            self.total_epochs,
            self.epoch_start.elapsed().as_secs_f64(),
            loss,
            accuracy * 100.0,
            val_loss,
            val_accuracy * 100.0,
            learning_rate
        );
    }

    /// Log a learning rate reduction
    pub fn log_lr_reduced(&self, from: f64, to: f64) {
        tracing::info!(
            "Epoch {}: reducing learning rate {:.2e} -> {:.2e}",
            self.epoch + 1,
            from,
            to
        );
    }

    /// Log early stopping
    pub fn log_early_stop(&self, patience: usize, best_epoch: usize) {
        tracing::warn!(
            "Epoch {}: early stopping after {} epochs without improvement, restoring weights from epoch {}",
            self.epoch + 1,
            patience,
            best_epoch + 1
        );
    }

    /// Log training completion
    pub fn log_complete(&self, epochs_run: usize, best_val_loss: f64) {
        tracing::info!(
            "Training finished: {} epochs in {:.1}s | best val_loss: {:.4}",
            epochs_run,
            self.training_start.elapsed().as_secs_f64(),
            best_val_loss
        );
    }
}
