//! Detector configuration and validation

use crate::error::{Result, TreeError};
use serde::Serialize;

/// Tunables for the divergence detector
///
/// All fields are read once at tree construction and validated via
/// [`DetectorConfig::validate`]; a tree never runs with a degenerate
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorConfig {
    /// Smoothing window applied to the absolute-difference signal before
    /// threshold comparison. 1 disables smoothing.
    pub mv_window: usize,
    /// Initial static divergence threshold; overwritten once the adaptive
    /// baseline fills.
    pub threshold: f32,
    /// Number of recent sub-threshold difference samples retained for
    /// adaptive statistics.
    pub baseline_window: usize,
    /// Run length of above-threshold samples required to confirm divergence.
    pub consecutive_points: usize,
    /// Width (in standard deviations) of the adaptive threshold band above
    /// the baseline mean.
    pub sigma_multiplier: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            mv_window: 1,
            threshold: 0.05,
            baseline_window: 20,
            consecutive_points: 3,
            sigma_multiplier: 4.0,
        }
    }
}

impl DetectorConfig {
    /// Check every tunable for a degenerate value
    pub fn validate(&self) -> Result<()> {
        if self.mv_window == 0 {
            return Err(TreeError::NonPositiveOption {
                option: "mv_window",
                value: self.mv_window,
            });
        }
        if self.baseline_window == 0 {
            return Err(TreeError::NonPositiveOption {
                option: "baseline_window",
                value: self.baseline_window,
            });
        }
        if self.consecutive_points == 0 {
            return Err(TreeError::NonPositiveOption {
                option: "consecutive_points",
                value: self.consecutive_points,
            });
        }
        if !self.sigma_multiplier.is_finite() || self.sigma_multiplier < 0.0 {
            return Err(TreeError::InvalidSigmaMultiplier(self.sigma_multiplier));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(TreeError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}
