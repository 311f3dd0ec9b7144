//! Error taxonomy for trace validation, configuration, and insertion
//!
//! The reference behavior on malformed input was undefined; every failure mode
//! here is surfaced to the caller before any tree mutation takes place.

use thiserror::Error;

/// Errors for tree construction and divergence detection
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("trace is empty")]
    EmptyTrace,

    #[error("trace sample at index {index} is not finite: {value}")]
    NonFiniteSample { index: usize, value: f32 },

    #[error("{option} must be positive, got {value}")]
    NonPositiveOption { option: &'static str, value: usize },

    #[error("sigma_multiplier must be finite and non-negative, got {0}")]
    InvalidSigmaMultiplier(f32),

    #[error("threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f32),

    #[error("trace matches the existing tree within tolerance; no attachment point found")]
    UnresolvedInsertion,
}

pub type Result<T> = std::result::Result<T, TreeError>;
