//! Polygon rasterization into a uniform lattice of sample points.
//!
//! Sample points are the lattice coordinates `i * step` (in degrees) that
//! fall inside or on the boundary of a polygon. The lattice is walked with
//! integer indices and each coordinate is computed independently as
//! `i / scale`, so no rounding error accumulates across a row.

use geo::{BoundingRect, Coord, Intersects, MultiPolygon, Point};

use crate::progress::{ProgressCallback, Stage};
use crate::{Feature, GridError, SamplePoint};

/// Default lattice spacing in degrees (roughly 1 km at mid latitudes).
pub const DEFAULT_STEP: f64 = 0.01;

/// Slack applied when snapping bbox bounds to lattice indices, so a bound
/// that is an exact multiple of the step is not lost to rounding.
const LATTICE_TOLERANCE: f64 = 1e-9;

/// Rejects steps that are not finite positive numbers.
///
/// # Errors
///
/// Returns [`GridError::InvalidStep`] if `step <= 0` or is not finite.
pub fn validate_step(step: f64) -> Result<(), GridError> {
    if step.is_finite() && step > 0.0 {
        Ok(())
    } else {
        Err(GridError::InvalidStep { step })
    }
}

/// Samples `geometry` on a lattice with spacing `step`.
///
/// Points are returned row by row, south to north, west to east within a
/// row. Points on a ring are kept; points inside a hole are not. A
/// geometry whose bounding box has zero width or height yields no points.
///
/// # Errors
///
/// Returns [`GridError::InvalidStep`] if `step` is not a finite positive
/// number.
pub fn rasterize(
    geometry: &MultiPolygon<f64>,
    step: f64,
) -> Result<Vec<Coord<f64>>, GridError> {
    validate_step(step)?;

    let Some(rect) = geometry.bounding_rect() else {
        return Ok(Vec::new());
    };

    if rect.width() <= 0.0 || rect.height() <= 0.0 {
        return Ok(Vec::new());
    }

    let scale = 1.0 / step;
    let (lat_start, lat_end) = lattice_bounds(rect.min().y, rect.max().y, scale);
    let (lng_start, lng_end) = lattice_bounds(rect.min().x, rect.max().x, scale);

    let mut coords = Vec::new();

    for lat_index in lat_start..=lat_end {
        #[allow(clippy::cast_precision_loss)]
        let lat = lat_index as f64 / scale;

        for lng_index in lng_start..=lng_end {
            #[allow(clippy::cast_precision_loss)]
            let point = Point::new(lng_index as f64 / scale, lat);

            if geometry.intersects(&point) {
                coords.push(point.0);
            }
        }
    }

    Ok(coords)
}

/// First and last lattice index covering `[min, max]`.
#[allow(clippy::cast_possible_truncation)]
fn lattice_bounds(min: f64, max: f64, scale: f64) -> (i64, i64) {
    let start = (min * scale - LATTICE_TOLERANCE).ceil() as i64;
    let end = (max * scale + LATTICE_TOLERANCE).floor() as i64;
    (start, end)
}

/// Rasterizes every feature and concatenates the samples in feature order,
/// tagging each with its feature index.
///
/// # Errors
///
/// Returns [`GridError::InvalidStep`] if `step` is not a finite positive
/// number.
pub fn sample_features(
    features: &[Feature],
    step: f64,
    progress: &dyn ProgressCallback,
) -> Result<Vec<SamplePoint>, GridError> {
    validate_step(step)?;

    progress.begin(Stage::Rasterizing { step }, features.len() as u64);

    let mut samples = Vec::new();

    for (source, feature) in features.iter().enumerate() {
        let coords = rasterize(&feature.geometry, step)?;

        if coords.is_empty() {
            log::debug!("Feature {source} produced no sample points at step {step}");
        } else {
            log::trace!("Feature {source}: {} sample points", coords.len());
        }

        samples.extend(coords.into_iter().map(|coord| SamplePoint {
            lng: coord.x,
            lat: coord.y,
            source,
        }));

        progress.advance(1);
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Polygon};
    use geohex_grid_models::Payload;

    use super::*;
    use crate::progress::NullProgress;

    fn polygon(exterior: &[(f64, f64)], holes: &[&[(f64, f64)]]) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Polygon::new(
            LineString::from(exterior.to_vec()),
            holes
                .iter()
                .map(|hole| LineString::from(hole.to_vec()))
                .collect(),
        )])
    }

    fn as_pairs(coords: &[Coord<f64>]) -> Vec<(f64, f64)> {
        coords.iter().map(|c| (c.x, c.y)).collect()
    }

    #[test]
    fn square_is_boundary_inclusive() {
        let square = polygon(&[(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0)], &[]);
        let mut points = as_pairs(&rasterize(&square, 1.0).unwrap());
        points.sort_by(|a, b| a.partial_cmp(b).unwrap());

        assert_eq!(
            points,
            vec![
                (0.0, 0.0),
                (0.0, 1.0),
                (0.0, 2.0),
                (1.0, 0.0),
                (1.0, 1.0),
                (1.0, 2.0),
                (2.0, 0.0),
                (2.0, 1.0),
                (2.0, 2.0),
            ]
        );
    }

    #[test]
    fn rows_run_south_to_north() {
        let square = polygon(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)], &[]);
        let points = as_pairs(&rasterize(&square, 1.0).unwrap());
        assert_eq!(points, vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
    }

    #[test]
    fn holes_are_excluded() {
        let donut = polygon(
            &[(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0)],
            &[&[(1.5, 1.5), (1.5, 2.5), (2.5, 2.5), (2.5, 1.5)]],
        );
        let points = as_pairs(&rasterize(&donut, 1.0).unwrap());

        assert_eq!(points.len(), 24);
        assert!(!points.contains(&(2.0, 2.0)));
        assert!(points.contains(&(1.0, 1.0)));
    }

    #[test]
    fn multipolygon_parts_skip_the_gap_between_them() {
        let mut parts = polygon(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)], &[]);
        parts
            .0
            .extend(polygon(&[(3.0, 0.0), (3.0, 1.0), (4.0, 1.0), (4.0, 0.0)], &[]).0);

        let points = as_pairs(&rasterize(&parts, 1.0).unwrap());

        assert_eq!(
            points,
            vec![
                (0.0, 0.0),
                (1.0, 0.0),
                (3.0, 0.0),
                (4.0, 0.0),
                (0.0, 1.0),
                (1.0, 1.0),
                (3.0, 1.0),
                (4.0, 1.0),
            ]
        );
        assert!(points.iter().all(|&(x, _)| x != 2.0));
    }

    #[test]
    fn triangle_excludes_outside_corner() {
        let triangle = polygon(&[(0.0, 0.0), (0.0, 2.0), (2.0, 0.0)], &[]);
        let points = as_pairs(&rasterize(&triangle, 1.0).unwrap());

        assert_eq!(points.len(), 6);
        assert!(!points.contains(&(2.0, 2.0)));
        assert!(points.contains(&(1.0, 1.0)));
    }

    #[test]
    fn fine_step_does_not_drift() {
        let square = polygon(
            &[(-121.0, 37.0), (-121.0, 37.5), (-120.5, 37.5), (-120.5, 37.0)],
            &[],
        );
        let points = rasterize(&square, 0.01).unwrap();

        // 51 x 51 lattice, both bounds inclusive
        assert_eq!(points.len(), 51 * 51);
        let last = points.last().unwrap();
        assert!((last.x - -120.5).abs() < 1e-12);
        assert!((last.y - 37.5).abs() < 1e-12);
    }

    #[test]
    fn degenerate_geometry_is_empty() {
        let line = polygon(&[(0.0, 1.0), (3.0, 1.0), (5.0, 1.0)], &[]);
        assert!(rasterize(&line, 1.0).unwrap().is_empty());
        assert!(rasterize(&MultiPolygon::new(vec![]), 1.0).unwrap().is_empty());
    }

    #[test]
    fn invalid_step_is_rejected() {
        let square = polygon(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)], &[]);
        for step in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            assert!(
                matches!(rasterize(&square, step), Err(GridError::InvalidStep { .. })),
                "step {step} should be rejected"
            );
        }
    }

    #[test]
    fn samples_are_tagged_with_feature_index() {
        let features = vec![
            Feature::new(
                polygon(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)], &[]),
                Payload::new(),
            ),
            Feature::new(
                polygon(&[(5.0, 5.0), (5.0, 5.0), (5.0, 5.0)], &[]),
                Payload::new(),
            ),
            Feature::new(
                polygon(&[(3.0, 0.0), (3.0, 1.0), (4.0, 1.0), (4.0, 0.0)], &[]),
                Payload::new(),
            ),
        ];

        let samples = sample_features(&features, 1.0, &NullProgress).unwrap();

        assert_eq!(samples.len(), 8);
        assert!(samples[..4].iter().all(|s| s.source == 0));
        assert!(samples[4..].iter().all(|s| s.source == 2));
    }
}
