//! Merging fields from other hex artifacts into a base artifact.
//!
//! Levels are matched by position and cells by id, so overlays must have
//! been produced with the same resolution range as the base.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use geohex_grid_models::AggregateRecord;

use crate::IngestError;
use crate::output::{LevelOutput, read_levels};

/// An overlay artifact and the fields to copy from it, parsed from
/// `path:field[,field...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySpec {
    pub path: PathBuf,
    pub fields: Vec<String>,
}

impl FromStr for OverlaySpec {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IngestError::Config {
            message: format!("overlay '{s}' must look like <path>:<field>[,<field>...]"),
        };

        let (path, fields) = s.rsplit_once(':').ok_or_else(invalid)?;
        let fields: Vec<String> = fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(ToString::to_string)
            .collect();

        if path.is_empty() || fields.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            path: PathBuf::from(path),
            fields,
        })
    }
}

/// Levels of an overlay artifact plus the fields to take from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub levels: Vec<LevelOutput>,
    pub fields: Vec<String>,
}

impl Overlay {
    /// Reads the artifact named by `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be read or parsed.
    pub fn load(spec: &OverlaySpec) -> Result<Self, IngestError> {
        log::info!(
            "Reading overlay {} for fields {:?}",
            spec.path.display(),
            spec.fields
        );

        Ok(Self {
            levels: read_levels(&spec.path)?,
            fields: spec.fields.clone(),
        })
    }
}

/// Copies each overlay's fields into the base cells they share, level by
/// level. Overlay values replace base values of the same name. Cells or
/// fields absent from an overlay are left untouched.
///
/// Returns the number of field values copied.
pub fn combine(base: &mut [LevelOutput], overlays: &[Overlay]) -> usize {
    let mut copied = 0;

    for overlay in overlays {
        if overlay.levels.len() != base.len() {
            log::warn!(
                "Overlay has {} levels, base has {}; combining the first {}",
                overlay.levels.len(),
                base.len(),
                overlay.levels.len().min(base.len())
            );
        }

        for (base_level, overlay_level) in base.iter_mut().zip(&overlay.levels) {
            let by_cell: BTreeMap<&str, &AggregateRecord> = overlay_level.records().collect();

            for (cell, record) in base_level.records_mut() {
                let Some(source) = by_cell.get(cell) else {
                    continue;
                };

                for field in &overlay.fields {
                    if let Some(value) = source.get(field) {
                        record.insert(field.clone(), value.clone());
                        copied += 1;
                    }
                }
            }
        }
    }

    log::info!("Copied {copied} field values from {} overlays", overlays.len());
    copied
}
