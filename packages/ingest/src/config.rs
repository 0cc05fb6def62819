//! TOML job definitions.
//!
//! ```toml
//! name = "groundwater"
//! input = "Baseline_Groundwater.geojson"
//! id_field = "DU_ID"
//! step = 0.1
//! resolutions = [5, 5]
//!
//! [[fields]]
//! name = "Groundwater"
//! kind = "series"
//!
//! [elevation]
//! raster = "elev.png"
//! mode = "sample_mean"
//!
//! [output]
//! path = "groundwater_hex.json"
//! layout = "pairs"
//! ```
//!
//! Relative paths are resolved against the directory containing the job
//! file.

use std::path::{Path, PathBuf};

use geohex_grid::projector::DEFAULT_ZOOM;
use geohex_grid::{CompositeReducer, DEFAULT_STEP, ElevationMode, RasterEncoding};
use geohex_grid_models::{ELEVATION_FIELD, FieldKind, ResolutionRange};
use serde::{Deserialize, Serialize};

use crate::IngestError;
use crate::output::OutputLayout;

/// One aggregation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name used in log output.
    pub name: String,
    /// `GeoJSON` `FeatureCollection` to aggregate.
    pub input: PathBuf,
    /// Whether the input holds polygons to rasterize or points to bin
    /// directly.
    #[serde(default)]
    pub kind: InputKind,
    /// Property identifying each feature. Features without a non-empty
    /// value are dropped before aggregation.
    pub id_field: Option<String>,
    /// Rasterization lattice spacing in degrees (polygon jobs only).
    #[serde(default = "default_step")]
    pub step: f64,
    /// Inclusive H3 resolution range, e.g. `[7, 9]`.
    pub resolutions: ResolutionRange,
    /// Properties to aggregate.
    pub fields: Vec<FieldSpec>,
    /// Optional per-feature series table joined on `id_field`.
    pub join: Option<JoinConfig>,
    /// Optional elevation enrichment.
    pub elevation: Option<ElevationConfig>,
    pub output: OutputConfig,
}

const fn default_step() -> f64 {
    DEFAULT_STEP
}

/// What the input features are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Polygon or multi-polygon features, rasterized before binning.
    #[default]
    Polygons,
    /// Point features (e.g. wildfire detections), binned as-is.
    Points,
}

/// A property to aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Property name in the input.
    pub name: String,
    /// Declared shape; selects the reducer.
    pub kind: FieldKind,
    /// Name to write in the output, if different from `name`.
    pub rename: Option<String>,
}

impl FieldSpec {
    /// Name of the field in payloads and output records.
    #[must_use]
    pub fn output_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }
}

/// A JSON table keyed by feature id, attached to each feature as a
/// series property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConfig {
    /// JSON object mapping id to an array (or integer-keyed object) of
    /// values.
    pub table: PathBuf,
    /// Property name to store the joined series under.
    pub field: String,
}

/// Elevation raster settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevationConfig {
    /// Image covering the study region as one slippy-map tile.
    pub raster: PathBuf,
    #[serde(default)]
    pub encoding: RasterEncoding,
    #[serde(default)]
    pub mode: ElevationMode,
    /// Zoom level of the raster tile.
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    /// `[x, y]` of the tile the raster covers. When set, points outside
    /// it fail the run instead of reading the wrong pixel.
    pub tile: Option<[u32; 2]>,
}

const fn default_zoom() -> u8 {
    DEFAULT_ZOOM
}

/// Where and how to write the aggregated levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub layout: OutputLayout,
}

impl JobConfig {
    /// Reads and validates a job file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// configuration is inconsistent.
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        log::debug!("Reading job file {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&text, base_dir)
    }

    /// Parses and validates a job definition, resolving relative paths
    /// against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or the configuration is
    /// inconsistent.
    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self, IngestError> {
        let mut config: Self = toml::de::from_str(text)?;
        config.resolve_paths(base_dir);
        config.normalize()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        };

        resolve(&mut self.input);
        resolve(&mut self.output.path);
        if let Some(join) = &mut self.join {
            resolve(&mut join.table);
        }
        if let Some(elevation) = &mut self.elevation {
            resolve(&mut elevation.raster);
        }
    }

    /// Checks cross-field constraints and declares the joined field if the
    /// job did not list it.
    fn normalize(&mut self) -> Result<(), IngestError> {
        if let Some(join) = &self.join {
            if self.id_field.is_none() {
                return Err(IngestError::Config {
                    message: format!(
                        "job '{}' joins '{}' but has no id_field to join on",
                        self.name,
                        join.table.display()
                    ),
                });
            }

            if !self.fields.iter().any(|f| f.name == join.field) {
                self.fields.push(FieldSpec {
                    name: join.field.clone(),
                    kind: FieldKind::Series,
                    rename: None,
                });
            }
        }

        if self.fields.is_empty() {
            return Err(IngestError::Config {
                message: format!("job '{}' declares no fields to aggregate", self.name),
            });
        }

        let mut seen = std::collections::BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(field.output_name()) {
                return Err(IngestError::Config {
                    message: format!(
                        "job '{}' writes field '{}' more than once",
                        self.name,
                        field.output_name()
                    ),
                });
            }
        }

        if self.elevation.is_some() && seen.contains(ELEVATION_FIELD) {
            return Err(IngestError::Config {
                message: format!(
                    "job '{}' samples elevation, so no field may be written as '{ELEVATION_FIELD}'",
                    self.name
                ),
            });
        }

        Ok(())
    }

    /// Builds the reducer for the declared fields.
    #[must_use]
    pub fn reducer(&self) -> CompositeReducer {
        CompositeReducer::from_fields(
            self.fields
                .iter()
                .map(|field| (field.output_name(), field.kind)),
        )
    }
}

#[cfg(test)]
mod tests {
    use geohex_grid::FieldReducer;

    use super::*;

    const WILDFIRE: &str = r#"
        name = "wildfire"
        input = "wildfire.geojson"
        kind = "points"
        resolutions = [7, 9]

        [[fields]]
        name = "confidence"
        kind = "scalar"

        [[fields]]
        name = "frp"
        kind = "scalar"
        rename = "power"

        [elevation]
        raster = "/data/elevcorr.png"
        encoding = "terrarium"
        tile = [5, 12]

        [output]
        path = "out/wildfire_hex_res.json"
    "#;

    #[test]
    fn parses_point_job() {
        let config = JobConfig::from_toml_str(WILDFIRE, Path::new("/jobs")).unwrap();

        assert_eq!(config.kind, InputKind::Points);
        assert_eq!(config.resolutions, ResolutionRange::new(7, 9));
        assert!((config.step - DEFAULT_STEP).abs() < f64::EPSILON);
        assert_eq!(config.input, Path::new("/jobs/wildfire.geojson"));
        assert_eq!(config.output.path, Path::new("/jobs/out/wildfire_hex_res.json"));
        assert_eq!(config.output.layout, OutputLayout::Object);

        let elevation = config.elevation.as_ref().unwrap();
        assert_eq!(elevation.raster, Path::new("/data/elevcorr.png"));
        assert_eq!(elevation.encoding, RasterEncoding::Terrarium);
        assert_eq!(elevation.mode, ElevationMode::Centroid);
        assert_eq!(elevation.zoom, DEFAULT_ZOOM);
        assert_eq!(elevation.tile, Some([5, 12]));
    }

    #[test]
    fn reducer_uses_output_names() {
        let config = JobConfig::from_toml_str(WILDFIRE, Path::new("/jobs")).unwrap();
        assert_eq!(
            config.reducer().reducers(),
            &[
                FieldReducer::ScalarMean {
                    field: "confidence".to_string()
                },
                FieldReducer::ScalarMean {
                    field: "power".to_string()
                },
            ]
        );
    }

    #[test]
    fn join_declares_series_field() {
        let config = JobConfig::from_toml_str(
            r#"
            name = "unmet"
            input = "demand_units.geojson"
            id_field = "DU_ID"
            resolutions = [5, 7]
            fields = []

            [join]
            table = "baseline_deliveries.json"
            field = "UnmetDemand"

            [output]
            path = "unmet.json"
            layout = "pairs"
            "#,
            Path::new("data"),
        )
        .unwrap();

        assert_eq!(config.join.unwrap().table, Path::new("data/baseline_deliveries.json"));
        assert_eq!(
            config.fields,
            vec![FieldSpec {
                name: "UnmetDemand".to_string(),
                kind: FieldKind::Series,
                rename: None,
            }]
        );
        assert_eq!(config.output.layout, OutputLayout::Pairs);
    }

    #[test]
    fn join_without_id_field_is_rejected() {
        let result = JobConfig::from_toml_str(
            r#"
            name = "unmet"
            input = "demand_units.geojson"
            resolutions = [5, 7]
            fields = []

            [join]
            table = "baseline_deliveries.json"
            field = "UnmetDemand"

            [output]
            path = "unmet.json"
            "#,
            Path::new("."),
        );

        assert!(matches!(result, Err(IngestError::Config { .. })));
    }

    #[test]
    fn duplicate_output_names_are_rejected() {
        let result = JobConfig::from_toml_str(
            r#"
            name = "dup"
            input = "a.geojson"
            resolutions = [5, 5]

            [[fields]]
            name = "a"
            kind = "scalar"

            [[fields]]
            name = "b"
            kind = "scalar"
            rename = "a"

            [output]
            path = "a.json"
            "#,
            Path::new("."),
        );

        assert!(matches!(result, Err(IngestError::Config { .. })));
    }

    #[test]
    fn elevation_field_name_is_reserved_when_sampling() {
        let job = |elevation: &str| {
            JobConfig::from_toml_str(
                &format!(
                    r#"
                    name = "heights"
                    input = "a.geojson"
                    resolutions = [5, 5]

                    [[fields]]
                    name = "height"
                    kind = "scalar"
                    rename = "Elevation"

                    [output]
                    path = "a.json"
                    {elevation}
                    "#
                ),
                Path::new("."),
            )
        };

        assert!(job("").is_ok());
        assert!(matches!(
            job("[elevation]\nraster = \"elev.png\""),
            Err(IngestError::Config { .. })
        ));
    }

    #[test]
    fn unknown_kinds_fail_to_parse() {
        let result = JobConfig::from_toml_str(
            r#"
            name = "bad"
            input = "a.geojson"
            resolutions = [5, 5]

            [[fields]]
            name = "a"
            kind = "histogram"

            [output]
            path = "a.json"
            "#,
            Path::new("."),
        );

        assert!(matches!(result, Err(IngestError::Toml(_))));
    }
}
