//! Stage-by-stage progress of a pipeline run.
//!
//! A polygon run reports [`Stage::Rasterizing`] once, then one
//! [`Stage::Reducing`] per resolution. A point run skips rasterization.
//! Each stage starts with [`ProgressCallback::begin`] and its units of work
//! are features or cells respectively.

use std::fmt;
use std::sync::Arc;

/// A unit of pipeline work that can be counted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    /// Sampling features onto the lattice; one unit per feature.
    Rasterizing {
        /// Lattice spacing in degrees.
        step: f64,
    },
    /// Reducing the bins of one resolution; one unit per cell.
    Reducing {
        /// H3 resolution being reduced.
        resolution: u8,
    },
}

impl Stage {
    /// Noun for the units the stage counts.
    #[must_use]
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::Rasterizing { .. } => "features",
            Self::Reducing { .. } => "cells",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rasterizing { step } => write!(f, "Rasterizing at step {step}"),
            Self::Reducing { resolution } => write!(f, "Reducing cells at res {resolution}"),
        }
    }
}

/// Receives progress from a [`GridPipeline`](crate::GridPipeline) run.
///
/// Shared behind an [`Arc`], so implementations must be `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// A new stage starts with `total` units of work.
    fn begin(&self, stage: Stage, total: u64);

    /// `delta` more units of the current stage are done.
    fn advance(&self, delta: u64);

    /// The run completed.
    fn finish(&self, summary: String);
}

/// Ignores all progress.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn begin(&self, _stage: Stage, _total: u64) {}
    fn advance(&self, _delta: u64) {}
    fn finish(&self, _summary: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
