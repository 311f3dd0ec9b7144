//! Divergence detection between two sample sequences using sliding window
//! statistics
//!
//! The detector compares two traces sample by sample and reports the index of
//! the first significant, sustained difference. Its threshold is adaptive:
//! sub-threshold difference samples feed a rolling baseline, and once the
//! baseline fills the threshold is re-derived from the baseline's mean and
//! standard deviation. That baseline is state of the detector, not of an
//! individual comparison, so divergence outcomes are order-dependent across
//! calls once the baseline has filled. This is a deliberate contract: later
//! comparisons inherit the noise profile learned from earlier ones.

use crate::config::DetectorConfig;
use crate::error::Result;
use trueno::Vector;

/// Floor for the adaptive threshold so it can never collapse to near zero
/// when the baseline is very quiet.
const MIN_STATIC_THRESHOLD: f32 = 0.04;

/// Stateful divergence detector shared by every comparison a tree performs
#[derive(Debug, Clone)]
pub struct DivergenceDetector {
    config: DetectorConfig,
    /// Recent sub-threshold difference samples (rolling window, oldest first)
    baseline: Vec<f32>,
    /// Current threshold; starts at the configured static value and adapts
    /// once the baseline fills
    threshold: f32,
}

impl DivergenceDetector {
    /// Create a detector, rejecting a degenerate configuration
    ///
    /// # Errors
    ///
    /// Returns the first [`DetectorConfig::validate`] failure; a detector
    /// never runs with zero windows or run lengths.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    /// Construct from a configuration already known to be valid
    pub(crate) fn from_validated(config: DetectorConfig) -> Self {
        let baseline = Vec::with_capacity(config.baseline_window);
        let threshold = config.threshold;
        Self {
            config,
            baseline,
            threshold,
        }
    }

    /// Current threshold (static until the baseline fills, adaptive after)
    pub fn current_threshold(&self) -> f32 {
        self.threshold
    }

    /// Configuration this detector was built with
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Number of samples currently held in the adaptive baseline
    pub fn baseline_len(&self) -> usize {
        self.baseline.len()
    }

    /// Find the first sustained divergence between two traces
    ///
    /// Both traces are truncated to the shorter length. Divergence is
    /// confirmed after `consecutive_points` consecutive difference samples
    /// above the current threshold; the reported index is the first sample of
    /// that run. Returns `None` when no qualifying run occurs.
    pub fn find_divergence(&mut self, trace_a: &[f32], trace_b: &[f32]) -> Option<usize> {
        let min_length = trace_a.len().min(trace_b.len());
        if min_length == 0 {
            return None;
        }

        let mut diff: Vec<f32> = trace_a[..min_length]
            .iter()
            .zip(&trace_b[..min_length])
            .map(|(a, b)| (a - b).abs())
            .collect();

        if self.config.mv_window > 1 {
            diff = moving_average(&diff, self.config.mv_window);
        }

        let mut run = 0usize;
        for (i, &sample) in diff.iter().enumerate() {
            if sample > self.threshold {
                run += 1;
                if run >= self.config.consecutive_points {
                    return Some(i + 1 - self.config.consecutive_points);
                }
            } else {
                run = 0;
                self.absorb_baseline_sample(sample);
            }
        }

        None
    }

    /// Feed one sub-threshold sample into the rolling baseline and re-derive
    /// the threshold once the window is full
    fn absorb_baseline_sample(&mut self, sample: f32) {
        self.baseline.push(sample);

        // Remove oldest sample if exceeding window size
        if self.baseline.len() > self.config.baseline_window {
            self.baseline.remove(0);
        }

        if self.baseline.len() == self.config.baseline_window {
            let v = Vector::from_slice(&self.baseline);
            let mean = v.mean().unwrap_or(0.0);
            let stddev = v.stddev().unwrap_or(0.0);
            self.threshold =
                (mean + self.config.sigma_multiplier * stddev).max(MIN_STATIC_THRESHOLD);
        }
    }
}

/// Centered moving average with the same length as the input
///
/// Matches a same-length convolution against a box kernel: edge positions see
/// a zero-padded window, so they are attenuated rather than renormalized.
fn moving_average(samples: &[f32], window: usize) -> Vec<f32> {
    let n = samples.len();
    let offset = (window - 1) / 2;
    (0..n)
        .map(|i| {
            let center = i + offset;
            let lo = center.saturating_sub(window - 1);
            let hi = (center + 1).min(n);
            let sum: f32 = samples[lo..hi].iter().sum();
            sum / window as f32
        })
        .collect()
}
