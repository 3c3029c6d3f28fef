//! Deterministic engines behind the purchasable bundles. Each engine is pure
//! and synchronous; the orchestrator crate adapts them to its handler trait.

pub mod bom;
pub mod forecast;
pub mod payroll;
pub mod sentiment;

use rust_decimal::Decimal;
use thiserror::Error;

/// Largest magnitude accepted for any amount, rate or quantity in an engine request.
pub const MAX_INPUT_AMOUNT: i64 = 1_000_000_000_000;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BundleError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl BundleError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Validation(_) => "validation_failed",
        }
    }
}

pub(crate) fn exceeds_input_range(value: Decimal) -> bool {
    value.abs() > Decimal::from(MAX_INPUT_AMOUNT)
}
