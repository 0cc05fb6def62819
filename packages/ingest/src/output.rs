//! The per-resolution JSON artifact.
//!
//! The file is a JSON array with one entry per resolution, lowest first.
//! Each entry maps H3 cell ids (hex strings) to their aggregate record,
//! either as an object or as an array of `[cell, record]` pairs.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use geohex_grid::ResolutionLevel;
use geohex_grid_models::AggregateRecord;
use serde::{Deserialize, Serialize};

use crate::IngestError;

/// How each level is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// `{ "<cell>": { ... }, ... }`
    #[default]
    Object,
    /// `[["<cell>", { ... }], ...]`
    Pairs,
}

/// One resolution's cells as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LevelOutput {
    Object(BTreeMap<String, AggregateRecord>),
    Pairs(Vec<(String, AggregateRecord)>),
}

impl LevelOutput {
    /// Renders a pipeline level in the given layout, in cell index order.
    #[must_use]
    pub fn from_level(level: &ResolutionLevel, layout: OutputLayout) -> Self {
        let cells = level
            .cells
            .iter()
            .map(|(cell, record)| (cell.to_string(), record.clone()));

        match layout {
            OutputLayout::Object => Self::Object(cells.collect()),
            OutputLayout::Pairs => Self::Pairs(cells.collect()),
        }
    }

    #[must_use]
    pub const fn layout(&self) -> OutputLayout {
        match self {
            Self::Object(_) => OutputLayout::Object,
            Self::Pairs(_) => OutputLayout::Pairs,
        }
    }

    /// Converts to `layout`, keeping cell order.
    #[must_use]
    pub fn into_layout(self, layout: OutputLayout) -> Self {
        match (self, layout) {
            (Self::Object(cells), OutputLayout::Pairs) => Self::Pairs(cells.into_iter().collect()),
            (Self::Pairs(cells), OutputLayout::Object) => Self::Object(cells.into_iter().collect()),
            (same, _) => same,
        }
    }

    #[must_use]
    pub fn get(&self, cell: &str) -> Option<&AggregateRecord> {
        match self {
            Self::Object(cells) => cells.get(cell),
            Self::Pairs(cells) => cells.iter().find(|(id, _)| id == cell).map(|(_, r)| r),
        }
    }

    /// Iterates over `(cell, record)` in stored order.
    pub fn records(&self) -> Box<dyn Iterator<Item = (&str, &AggregateRecord)> + '_> {
        match self {
            Self::Object(cells) => Box::new(cells.iter().map(|(id, r)| (id.as_str(), r))),
            Self::Pairs(cells) => Box::new(cells.iter().map(|(id, r)| (id.as_str(), r))),
        }
    }

    /// Iterates mutably over `(cell, record)` in stored order.
    pub fn records_mut(&mut self) -> Box<dyn Iterator<Item = (&str, &mut AggregateRecord)> + '_> {
        match self {
            Self::Object(cells) => Box::new(cells.iter_mut().map(|(id, r)| (id.as_str(), r))),
            Self::Pairs(cells) => Box::new(cells.iter_mut().map(|(id, r)| (id.as_str(), r))),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Object(cells) => cells.len(),
            Self::Pairs(cells) => cells.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renders every level of a run.
#[must_use]
pub fn to_levels(levels: &[ResolutionLevel], layout: OutputLayout) -> Vec<LevelOutput> {
    levels
        .iter()
        .map(|level| LevelOutput::from_level(level, layout))
        .collect()
}

/// Writes levels to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_levels(path: &Path, levels: &[LevelOutput]) -> Result<(), IngestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, levels)?;
    writer.flush()?;

    log::info!("Wrote {} levels to {}", levels.len(), path.display());
    Ok(())
}

/// Reads a previously written artifact.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_levels(path: &Path) -> Result<Vec<LevelOutput>, IngestError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
