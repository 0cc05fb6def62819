#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Polygon-to-hex-grid aggregation engine.
//!
//! Rasterizes polygon features into a uniform lattice of sample points,
//! assigns each sample to an H3 cell at every requested resolution, and
//! reduces the payloads that land in each cell into one
//! [`AggregateRecord`](geohex_grid_models::AggregateRecord). Records can
//! optionally be enriched with an elevation sampled from a slippy-map
//! raster tile.
//!
//! Everything here operates on data that is already in memory; loading
//! and writing files is the job of the ingest crate.

pub mod binner;
pub mod pipeline;
pub mod progress;
pub mod projector;
pub mod raster;
pub mod rasterize;
pub mod reduce;

use geo::MultiPolygon;
use geohex_grid_models::{Payload, ResolutionRange};
use thiserror::Error;

pub use binner::{BinLevel, bin, cell_chain, cell_for, resolutions, sample_points};
pub use pipeline::{ElevationMode, ElevationSampling, GridPipeline, ResolutionLevel};
pub use projector::TileProjector;
pub use raster::{Raster, RasterEncoding, RasterError, RasterSampler};
pub use rasterize::{DEFAULT_STEP, rasterize, sample_features};
pub use reduce::{CompositeReducer, FieldReducer, ReduceError, Reducer};

/// Errors that abort an aggregation run.
///
/// Every variant is a configuration problem: the run is deterministic over
/// in-memory data, so nothing here is worth retrying.
#[derive(Debug, Error)]
pub enum GridError {
    /// Resolution is outside the range supported by H3.
    #[error("Invalid H3 resolution {value}")]
    InvalidResolution {
        /// The rejected resolution.
        value: u8,
    },

    /// The minimum resolution is greater than the maximum.
    #[error("Invalid resolution range {range}: minimum exceeds maximum")]
    InvalidResolutionRange {
        /// The rejected range.
        range: ResolutionRange,
    },

    /// Sampling step is zero, negative, or not finite.
    #[error("Invalid sampling step {step}: must be a finite positive number of degrees")]
    InvalidStep {
        /// The rejected step.
        step: f64,
    },

    /// A sample coordinate could not be converted to an H3 lat/lng.
    #[error("Invalid coordinate (lat {lat}, lng {lng})")]
    InvalidCoordinate {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lng: f64,
    },

    /// A reducer rejected the payloads of a cell.
    #[error("Reduce error: {0}")]
    Reduce(#[from] ReduceError),

    /// Elevation lookup failed.
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),
}

/// A polygon (or multi-polygon) with its attribute payload.
///
/// Interior rings of each polygon are treated as holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: MultiPolygon<f64>,
    pub payload: Payload,
}

impl Feature {
    #[must_use]
    pub fn new(geometry: impl Into<MultiPolygon<f64>>, payload: Payload) -> Self {
        Self {
            geometry: geometry.into(),
            payload,
        }
    }
}

/// A discrete event (e.g. a wildfire detection) that carries its own
/// payload and is binned without rasterization.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub lng: f64,
    pub lat: f64,
    pub payload: Payload,
}

/// A lattice sample tagged with the index of the feature it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub lng: f64,
    pub lat: f64,
    /// Index into the feature (or point feature) slice of the run.
    pub source: usize,
}
