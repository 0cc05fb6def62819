//! Geographic to slippy-map tile projection.
//!
//! Elevation rasters are single spherical-Mercator tiles at a fixed zoom
//! level. [`TileProjector`] maps a lat/lng to its fractional position
//! inside whichever tile contains it, which the raster sampler then scales
//! to pixel coordinates.

use std::f64::consts::PI;

/// Zoom level of the elevation tiles used by the processing jobs.
pub const DEFAULT_ZOOM: u8 = 5;

/// Forward spherical-Mercator projection at a fixed zoom level.
///
/// Latitudes of exactly ±90° are outside the projection's domain (the
/// secant diverges) and must not be passed in. Study regions never reach
/// the poles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileProjector {
    zoom: u8,
}

impl Default for TileProjector {
    fn default() -> Self {
        Self::new(DEFAULT_ZOOM)
    }
}

impl TileProjector {
    #[must_use]
    pub const fn new(zoom: u8) -> Self {
        Self { zoom }
    }

    #[must_use]
    pub const fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Unwrapped tile-space coordinates (tile index plus fraction).
    fn tile_space(&self, lat: f64, lng: f64) -> (f64, f64) {
        let n = 2f64.powi(i32::from(self.zoom));
        let lat_rad = lat.to_radians();

        let x = n * ((lng + 180.0) / 360.0);
        let y = n * (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;

        (x, y)
    }

    /// Returns the `(u, v)` position of a point inside its tile, each in
    /// `[0, 1)`. `v` grows southward.
    #[must_use]
    pub fn project(&self, lat: f64, lng: f64) -> (f64, f64) {
        let (x, y) = self.tile_space(lat, lng);
        (x - x.floor(), y - y.floor())
    }

    /// Returns the `(x, y)` index of the tile containing the point, or
    /// `None` if the projection is not finite or falls off the tile grid.
    #[must_use]
    pub fn tile(&self, lat: f64, lng: f64) -> Option<(u32, u32)> {
        let (x, y) = self.tile_space(lat, lng);
        let (x, y) = (x.floor(), y.floor());

        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return None;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some((x as u32, y as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_a_tile_corner() {
        let projector = TileProjector::default();
        assert_eq!(projector.project(0.0, 0.0), (0.0, 0.0));
        assert_eq!(projector.tile(0.0, 0.0), Some((16, 16)));
    }

    #[test]
    fn longitude_fraction() {
        let projector = TileProjector::default();

        // 32 * (185.625 / 360) = 16.5
        let (u, v) = projector.project(0.0, 5.625);
        assert!((u - 0.5).abs() < 1e-12, "u = {u}");
        assert!(v.abs() < 1e-12, "v = {v}");

        // 32 * (59 / 360) = 5.2444...
        let (u, _) = projector.project(37.5, -121.0);
        assert!((u - 0.244_444).abs() < 1e-5, "u = {u}");
    }

    #[test]
    fn fractions_stay_in_unit_interval() {
        let projector = TileProjector::default();
        for lat in [-60.0, -12.3, 0.5, 38.2, 71.9] {
            for lng in [-179.5, -121.4, 0.0, 45.1, 179.9] {
                let (u, v) = projector.project(lat, lng);
                assert!((0.0..1.0).contains(&u), "u = {u} for ({lat}, {lng})");
                assert!((0.0..1.0).contains(&v), "v = {v} for ({lat}, {lng})");
            }
        }
    }

    #[test]
    fn northern_tiles_have_smaller_row() {
        let projector = TileProjector::default();
        let (_, equator_row) = projector.tile(0.0, 10.0).unwrap();
        let (_, north_row) = projector.tile(60.0, 10.0).unwrap();
        let (_, south_row) = projector.tile(-60.0, 10.0).unwrap();
        assert!(north_row < equator_row);
        assert!(south_row > equator_row);
    }

    #[test]
    fn non_finite_input_has_no_tile() {
        let projector = TileProjector::default();
        assert_eq!(projector.tile(f64::NAN, 0.0), None);
    }
}
