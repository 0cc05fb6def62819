#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loading and writing around the hex grid engine.
//!
//! A job is described by a TOML file ([`config::JobConfig`]): which
//! `GeoJSON` file to read, which properties to aggregate and how, the
//! resolution range, optional elevation raster, and where to write the
//! result. [`job::run_job`] wires those pieces into a
//! [`GridPipeline`](geohex_grid::GridPipeline) run and writes the
//! per-resolution JSON artifact the front end reads.
//!
//! Several artifacts can later be merged cell-by-cell with
//! [`combine::combine`].

pub mod combine;
pub mod config;
pub mod features;
pub mod job;
pub mod join;
pub mod output;
pub mod raster;

use geohex_grid::{GridError, RasterError};
use thiserror::Error;

/// Errors that can occur while loading inputs, running a job, or writing
/// its output.
#[derive(Debug, Error)]
pub enum IngestError {
    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Job configuration could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `GeoJSON` parsing or geometry conversion failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Raster image could not be decoded.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// The aggregation run failed.
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// The raster could not be used for sampling.
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    /// Job configuration is inconsistent.
    #[error("Invalid job configuration: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// Input data could not be converted to the declared shape.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
