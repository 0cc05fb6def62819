//! Hex binning of sample points across a range of H3 resolutions.
//!
//! Each sample is located once at the finest resolution of the range and
//! its coarser cells are that cell's ancestors. H3 children do not tile
//! their parent exactly, so independent lookups per resolution could put
//! a sample in a coarse cell that is not the parent of its fine cell.

use std::collections::BTreeMap;

use geohex_grid_models::ResolutionRange;
use h3o::{CellIndex, LatLng, Resolution};

use crate::{GridError, PointFeature, SamplePoint};

/// The bins of one resolution.
///
/// Each bin lists indices into the sample slice that was binned, in input
/// order. A feature rasterized into many samples appears once per sample,
/// which weights its payload by the share of its area inside the cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinLevel {
    pub resolution: Resolution,
    pub bins: BTreeMap<CellIndex, Vec<usize>>,
}

/// Validates `range` against H3 and returns its resolutions, coarsest
/// first.
///
/// # Errors
///
/// * [`GridError::InvalidResolutionRange`] if `min > max`
/// * [`GridError::InvalidResolution`] if either bound is not an H3
///   resolution
pub fn resolutions(range: ResolutionRange) -> Result<Vec<Resolution>, GridError> {
    if range.min() > range.max() {
        return Err(GridError::InvalidResolutionRange { range });
    }

    range
        .levels()
        .map(|value| {
            Resolution::try_from(value).map_err(|_| GridError::InvalidResolution { value })
        })
        .collect()
}

/// Returns the H3 cell containing `(lat, lng)` at `resolution`.
///
/// # Errors
///
/// Returns [`GridError::InvalidCoordinate`] if the coordinate is not finite.
pub fn cell_for(lat: f64, lng: f64, resolution: Resolution) -> Result<CellIndex, GridError> {
    LatLng::new(lat, lng)
        .map(|coord| coord.to_cell(resolution))
        .map_err(|_| GridError::InvalidCoordinate { lat, lng })
}

/// Returns the cells containing `(lat, lng)` at every resolution of
/// `range`, coarsest first. Each cell is the parent of the next.
///
/// # Errors
///
/// Returns an error if the range is invalid or the coordinate is not
/// finite.
pub fn cell_chain(
    lat: f64,
    lng: f64,
    range: ResolutionRange,
) -> Result<Vec<CellIndex>, GridError> {
    let resolutions = resolutions(range)?;
    let Some(&finest) = resolutions.last() else {
        return Ok(Vec::new());
    };

    let cell = cell_for(lat, lng, finest)?;
    Ok(resolutions
        .into_iter()
        .filter_map(|resolution| cell.parent(resolution))
        .collect())
}

/// Bins `points` at every resolution of `range`.
///
/// Returns one [`BinLevel`] per resolution, coarsest first. Cells are keyed
/// in H3 index order.
///
/// # Errors
///
/// Returns an error if the range is invalid or a sample coordinate is not
/// finite.
pub fn bin(points: &[SamplePoint], range: ResolutionRange) -> Result<Vec<BinLevel>, GridError> {
    let resolutions = resolutions(range)?;
    let Some(&finest) = resolutions.last() else {
        return Ok(Vec::new());
    };

    let cells = points
        .iter()
        .map(|point| cell_for(point.lat, point.lng, finest))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(resolutions
        .into_iter()
        .map(|resolution| {
            let mut bins: BTreeMap<CellIndex, Vec<usize>> = BTreeMap::new();

            for (index, cell) in cells.iter().enumerate() {
                if let Some(ancestor) = cell.parent(resolution) {
                    bins.entry(ancestor).or_default().push(index);
                }
            }

            log::debug!(
                "Resolution {}: {} samples in {} cells",
                u8::from(resolution),
                cells.len(),
                bins.len()
            );

            BinLevel { resolution, bins }
        })
        .collect())
}

/// Turns point features into samples that reference themselves, so their
/// payloads are binned directly.
#[must_use]
pub fn sample_points(points: &[PointFeature]) -> Vec<SamplePoint> {
    points
        .iter()
        .enumerate()
        .map(|(source, point)| SamplePoint {
            lng: point.lng,
            lat: point.lat,
            source,
        })
        .collect()
}
