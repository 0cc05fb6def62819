//! Elevation lookup from a slippy-map raster tile.
//!
//! A [`Raster`] is one decoded tile image. [`RasterSampler`] projects a
//! lat/lng into the tile with [`TileProjector`], floors to a pixel, and
//! decodes the pixel according to its [`RasterEncoding`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::projector::TileProjector;

/// Errors from building or sampling a raster.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RasterError {
    /// Channel count is not 1, 3, or 4.
    #[error("Unsupported raster channel count {channels}")]
    Channels {
        /// The rejected channel count.
        channels: u8,
    },

    /// The encoding needs more channels than the raster has.
    #[error("Encoding {encoding:?} needs at least {needed} channels, raster has {channels}")]
    EncodingChannels {
        /// The configured encoding.
        encoding: RasterEncoding,
        /// Channels required by the encoding.
        needed: u8,
        /// Channels present in the raster.
        channels: u8,
    },

    /// The pixel buffer is shorter than `width * height * channels`.
    #[error("Raster buffer holds {found} bytes, expected {expected}")]
    BufferSize {
        /// Bytes required.
        expected: usize,
        /// Bytes provided.
        found: usize,
    },

    /// The projected pixel falls outside the raster.
    #[error(
        "Point (lat {lat}, lng {lng}) maps to pixel ({x}, {y}) outside the {width}x{height} raster"
    )]
    PixelOutOfBounds {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lng: f64,
        /// Pixel column before bounds checking.
        x: f64,
        /// Pixel row before bounds checking.
        y: f64,
        /// Raster width.
        width: u32,
        /// Raster height.
        height: u32,
    },

    /// The point lies in a different tile than the one the raster covers.
    #[error("Point (lat {lat}, lng {lng}) is in tile {found:?}, raster covers tile {expected:?}")]
    OutsideTile {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lng: f64,
        /// Tile the raster covers.
        expected: (u32, u32),
        /// Tile containing the point, if any.
        found: Option<(u32, u32)>,
    },
}

/// How elevation is packed into pixel values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterEncoding {
    /// Elevation is the first channel's 8-bit value.
    #[default]
    Grayscale,
    /// Terrarium RGB: `r * 256 + g + b / 256 - 32768` meters.
    Terrarium,
}

impl RasterEncoding {
    /// Minimum channel count the encoding reads.
    #[must_use]
    pub const fn channels_needed(&self) -> u8 {
        match self {
            Self::Grayscale => 1,
            Self::Terrarium => 3,
        }
    }

    /// Decodes one pixel. `pixel` must hold at least
    /// [`channels_needed`](Self::channels_needed) bytes.
    #[must_use]
    pub fn decode(&self, pixel: &[u8]) -> f64 {
        match self {
            Self::Grayscale => f64::from(pixel[0]),
            Self::Terrarium => {
                let (r, g, b) = (f64::from(pixel[0]), f64::from(pixel[1]), f64::from(pixel[2]));
                r * 256.0 + g + b / 256.0 - 32768.0
            }
        }
    }
}

/// A decoded 8-bit raster tile with interleaved channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Raster {
    /// Wraps a row-major interleaved pixel buffer.
    ///
    /// # Errors
    ///
    /// * [`RasterError::Channels`] if `channels` is not 1, 3, or 4
    /// * [`RasterError::BufferSize`] if `data` is too short
    pub fn from_raw(
        width: u32,
        height: u32,
        channels: u8,
        data: Vec<u8>,
    ) -> Result<Self, RasterError> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(RasterError::Channels { channels });
        }

        let expected = width as usize * height as usize * usize::from(channels);
        if data.len() < expected {
            return Err(RasterError::BufferSize {
                expected,
                found: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub const fn channels(&self) -> u8 {
        self.channels
    }

    /// Returns the channels of the pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let channels = usize::from(self.channels);
        let start = (y as usize * self.width as usize + x as usize) * channels;
        self.data.get(start..start + channels)
    }
}

/// Samples elevation from a raster tile.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSampler {
    raster: Raster,
    encoding: RasterEncoding,
    projector: TileProjector,
    tile: Option<(u32, u32)>,
}

impl RasterSampler {
    /// Creates a sampler using the default zoom and no tile check.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::EncodingChannels`] if the raster has fewer
    /// channels than `encoding` reads.
    pub fn new(raster: Raster, encoding: RasterEncoding) -> Result<Self, RasterError> {
        let needed = encoding.channels_needed();
        if raster.channels() < needed {
            return Err(RasterError::EncodingChannels {
                encoding,
                needed,
                channels: raster.channels(),
            });
        }

        Ok(Self {
            raster,
            encoding,
            projector: TileProjector::default(),
            tile: None,
        })
    }

    #[must_use]
    pub const fn with_projector(mut self, projector: TileProjector) -> Self {
        self.projector = projector;
        self
    }

    /// Restricts sampling to points inside tile `(x, y)` at the
    /// projector's zoom. Points elsewhere fail with
    /// [`RasterError::OutsideTile`] instead of silently reading the
    /// matching pixel of a different tile.
    #[must_use]
    pub const fn with_tile(mut self, x: u32, y: u32) -> Self {
        self.tile = Some((x, y));
        self
    }

    #[must_use]
    pub const fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Returns the decoded elevation at `(lat, lng)`.
    ///
    /// # Errors
    ///
    /// * [`RasterError::OutsideTile`] if a covering tile is configured and
    ///   the point lies elsewhere
    /// * [`RasterError::PixelOutOfBounds`] if the projected pixel is not
    ///   inside the raster
    pub fn sample(&self, lat: f64, lng: f64) -> Result<f64, RasterError> {
        if let Some(expected) = self.tile {
            let found = self.projector.tile(lat, lng);
            if found != Some(expected) {
                return Err(RasterError::OutsideTile {
                    lat,
                    lng,
                    expected,
                    found,
                });
            }
        }

        let (u, v) = self.projector.project(lat, lng);
        let x = (u * f64::from(self.raster.width)).floor();
        let y = (v * f64::from(self.raster.height)).floor();

        let out_of_bounds = || RasterError::PixelOutOfBounds {
            lat,
            lng,
            x,
            y,
            width: self.raster.width,
            height: self.raster.height,
        };

        if !(x.is_finite() && y.is_finite() && x >= 0.0 && y >= 0.0) {
            return Err(out_of_bounds());
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pixel = self
            .raster
            .pixel(x as u32, y as u32)
            .ok_or_else(out_of_bounds)?;

        Ok(self.encoding.decode(pixel))
    }
}
