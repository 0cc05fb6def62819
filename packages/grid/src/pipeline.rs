//! End-to-end aggregation: rasterize, bin, reduce, and attach elevation.

use std::collections::BTreeMap;
use std::sync::Arc;

use geohex_grid_models::{
    AggregateRecord, AggregateValue, ELEVATION_FIELD, Payload, ResolutionRange,
};
use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};

use crate::binner::{bin, resolutions, sample_points};
use crate::progress::{ProgressCallback, Stage, null_progress};
use crate::raster::RasterSampler;
use crate::rasterize::{DEFAULT_STEP, sample_features, validate_step};
use crate::reduce::{Reducer, mean};
use crate::{Feature, GridError, PointFeature, SamplePoint};

/// Where elevation is sampled for each cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevationMode {
    /// Sample once at the cell's centroid.
    #[default]
    Centroid,
    /// Sample every point binned into the cell and take the mean.
    SampleMean,
}

/// Elevation enrichment settings for a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationSampling {
    pub sampler: RasterSampler,
    pub mode: ElevationMode,
}

/// The aggregated cells of one resolution, in H3 index order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionLevel {
    pub resolution: Resolution,
    pub cells: BTreeMap<CellIndex, AggregateRecord>,
}

/// Rasterizes features, bins the samples at each resolution of a range,
/// and reduces every non-empty cell with `R`.
pub struct GridPipeline<R: Reducer> {
    reducer: R,
    range: ResolutionRange,
    step: f64,
    elevation: Option<ElevationSampling>,
    progress: Arc<dyn ProgressCallback>,
}

impl<R: Reducer> GridPipeline<R> {
    /// Creates a pipeline with the default step, no elevation, and no
    /// progress reporting.
    #[must_use]
    pub fn new(reducer: R, range: ResolutionRange) -> Self {
        Self {
            reducer,
            range,
            step: DEFAULT_STEP,
            elevation: None,
            progress: null_progress(),
        }
    }

    /// Sets the rasterization lattice spacing in degrees.
    #[must_use]
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    #[must_use]
    pub fn with_elevation(mut self, elevation: ElevationSampling) -> Self {
        self.elevation = Some(elevation);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Aggregates polygon features.
    ///
    /// Each feature contributes its payload once per lattice sample inside
    /// it, so a cell's record is weighted by how much of each polygon's
    /// sampled area it covers.
    ///
    /// # Errors
    ///
    /// Returns a [`GridError`] if the step or range is invalid, a reducer
    /// rejects a cell's payloads, or elevation sampling fails.
    pub fn run(&self, features: &[Feature]) -> Result<Vec<ResolutionLevel>, GridError> {
        validate_step(self.step)?;
        resolutions(self.range)?;

        log::info!(
            "Rasterizing {} features at step {}",
            features.len(),
            self.step
        );
        let samples = sample_features(features, self.step, self.progress.as_ref())?;
        log::info!("Generated {} sample points", samples.len());

        let payloads: Vec<&Payload> = features.iter().map(|f| &f.payload).collect();
        self.aggregate(&samples, &payloads)
    }

    /// Aggregates point features, binning each point's payload directly.
    ///
    /// # Errors
    ///
    /// Returns a [`GridError`] if the range is invalid, a point coordinate
    /// is not finite, a reducer rejects a cell's payloads, or elevation
    /// sampling fails.
    pub fn run_points(
        &self,
        points: &[PointFeature],
    ) -> Result<Vec<ResolutionLevel>, GridError> {
        resolutions(self.range)?;

        log::info!("Binning {} point features", points.len());
        let samples = sample_points(points);

        let payloads: Vec<&Payload> = points.iter().map(|p| &p.payload).collect();
        self.aggregate(&samples, &payloads)
    }

    fn aggregate(
        &self,
        samples: &[SamplePoint],
        payloads: &[&Payload],
    ) -> Result<Vec<ResolutionLevel>, GridError> {
        let levels = bin(samples, self.range)?;

        let sample_elevations = match &self.elevation {
            Some(ElevationSampling {
                sampler,
                mode: ElevationMode::SampleMean,
            }) => Some(
                samples
                    .iter()
                    .map(|s| sampler.sample(s.lat, s.lng))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            _ => None,
        };

        let mut output = Vec::with_capacity(levels.len());

        for level in levels {
            let mut cells = BTreeMap::new();
            self.progress.begin(
                Stage::Reducing {
                    resolution: u8::from(level.resolution),
                },
                level.bins.len() as u64,
            );

            for (cell, members) in level.bins {
                let cell_payloads: Vec<&Payload> = members
                    .iter()
                    .map(|&index| payloads[samples[index].source])
                    .collect();

                let mut record = self.reducer.reduce(&cell_payloads)?;

                if let Some(elevation) = &self.elevation {
                    let value = match &sample_elevations {
                        Some(values) => mean(members.iter().map(|&index| values[index])),
                        None => {
                            let center = LatLng::from(cell);
                            elevation.sampler.sample(center.lat(), center.lng())?
                        }
                    };
                    record.insert(ELEVATION_FIELD, AggregateValue::Scalar(value));
                }

                cells.insert(cell, record);
                self.progress.advance(1);
            }

            log::info!(
                "Resolution {}: {} cells",
                u8::from(level.resolution),
                cells.len()
            );

            output.push(ResolutionLevel {
                resolution: level.resolution,
                cells,
            });
        }

        self.progress.finish(format!(
            "Aggregated {} samples into {} levels",
            samples.len(),
            output.len()
        ));

        Ok(output)
    }
}
