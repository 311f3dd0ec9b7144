//! Bifurcar - divergence-tree clustering of numeric execution traces
//!
//! This library organizes execution traces (ordered sequences of real-valued
//! samples from repeated runs of a monitored process) into a binary tree keyed
//! by where traces first diverge. Each root-to-leaf path reconstructs one
//! original trace; leaves carry the input that produced it. Divergence is
//! judged by a stateful detector with an adaptive, baseline-driven threshold.

pub mod config;
pub mod detector;
pub mod error;
pub mod tree;

pub use config::DetectorConfig;
pub use detector::DivergenceDetector;
pub use error::{Result, TreeError};
pub use tree::{NodeId, TraceTree, TreeStats};
