//! Loading elevation rasters from image files.

use std::path::Path;

use geohex_grid::{ElevationSampling, Raster, RasterSampler, TileProjector};
use image::DynamicImage;

use crate::IngestError;
use crate::config::ElevationConfig;

/// Decodes an image into a [`Raster`]. Grayscale images keep a single
/// channel; everything else is expanded to RGBA.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_raster(path: &Path) -> Result<Raster, IngestError> {
    log::info!("Loading raster {}", path.display());
    let image = image::open(path)?;
    Ok(to_raster(image)?)
}

fn to_raster(image: DynamicImage) -> Result<Raster, geohex_grid::RasterError> {
    let (width, height) = (image.width(), image.height());

    if image.color().has_color() {
        Raster::from_raw(width, height, 4, image.to_rgba8().into_raw())
    } else {
        Raster::from_raw(width, height, 1, image.to_luma8().into_raw())
    }
}

/// Loads the configured raster and wraps it in a sampler.
///
/// # Errors
///
/// Returns an error if the raster cannot be loaded or lacks the channels
/// the encoding reads.
pub fn elevation_sampling(config: &ElevationConfig) -> Result<ElevationSampling, IngestError> {
    let raster = load_raster(&config.raster)?;
    log::debug!(
        "Raster is {}x{} with {} channel(s)",
        raster.width(),
        raster.height(),
        raster.channels()
    );

    let mut sampler = RasterSampler::new(raster, config.encoding)?
        .with_projector(TileProjector::new(config.zoom));
    if let Some([x, y]) = config.tile {
        sampler = sampler.with_tile(x, y);
    }

    Ok(ElevationSampling {
        sampler,
        mode: config.mode,
    })
}

#[cfg(test)]
mod tests {
    use geohex_grid::{ElevationMode, RasterEncoding};
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;

    fn temp_png(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("geohex_{name}_{}.png", std::process::id()))
    }

    #[test]
    fn grayscale_png_keeps_one_channel() {
        let path = temp_png("gray");
        GrayImage::from_pixel(4, 2, Luma([42])).save(&path).unwrap();

        let raster = load_raster(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!((raster.width(), raster.height(), raster.channels()), (4, 2, 1));
        assert_eq!(raster.pixel(3, 1), Some(&[42][..]));
    }

    #[test]
    fn rgb_png_expands_to_rgba() {
        let path = temp_png("rgb");
        RgbImage::from_pixel(2, 2, Rgb([128, 10, 128])).save(&path).unwrap();

        let raster = load_raster(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(raster.channels(), 4);
        assert_eq!(raster.pixel(1, 1), Some(&[128, 10, 128, 255][..]));
    }

    #[test]
    fn builds_terrarium_sampler() {
        let path = temp_png("terrarium");
        RgbImage::from_pixel(2, 2, Rgb([128, 10, 128])).save(&path).unwrap();

        let sampling = elevation_sampling(&ElevationConfig {
            raster: path.clone(),
            encoding: RasterEncoding::Terrarium,
            mode: ElevationMode::SampleMean,
            zoom: 5,
            tile: Some([16, 16]),
        })
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(sampling.mode, ElevationMode::SampleMean);
        assert!((sampling.sampler.sample(-1.0, 1.0).unwrap() - 10.5).abs() < f64::EPSILON);
        assert!(sampling.sampler.sample(38.0, -121.0).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_raster(Path::new("/nonexistent/geohex/elev.png")).is_err());
    }
}
