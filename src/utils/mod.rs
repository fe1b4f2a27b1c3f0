//! Utilities: error types, logging and small formatting helpers

pub mod error;
pub mod logging;

pub use error::{ClassifierError, Result};
pub use logging::{init_logging, parse_level, LogConfig, TrainingLogger};

/// Group digits in threes: `1234567` -> `"1,234,567"`
pub fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        let remaining = digits.len() - i;
        if i > 0 && remaining % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}
