//! Running a configured job end to end.

use std::sync::Arc;

use geohex_grid::progress::ProgressCallback;
use geohex_grid::{GridPipeline, ResolutionLevel};

use crate::IngestError;
use crate::config::{InputKind, JobConfig};
use crate::features::{
    point_features, polygon_features, read_feature_collection, retain_identified,
};
use crate::join::{attach_table, read_table};
use crate::output::{to_levels, write_levels};
use crate::raster::elevation_sampling;

/// Cell count of one written level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelSummary {
    pub resolution: u8,
    pub cells: usize,
}

/// What a job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub name: String,
    /// Features that survived filtering and joining.
    pub features: usize,
    pub levels: Vec<LevelSummary>,
}

impl std::fmt::Display for JobSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} features ->", self.name, self.features)?;
        for level in &self.levels {
            write!(f, " res {}: {} cells;", level.resolution, level.cells)?;
        }
        Ok(())
    }
}

/// Loads the job's inputs, runs the pipeline, and writes the artifact.
///
/// # Errors
///
/// Returns an error if any input cannot be loaded, the pipeline fails, or
/// the output cannot be written.
pub fn run_job(
    config: &JobConfig,
    progress: Arc<dyn ProgressCallback>,
) -> Result<JobSummary, IngestError> {
    log::info!("Running job '{}'", config.name);

    let mut features = read_feature_collection(&config.input)?.features;

    if let Some(id_field) = &config.id_field {
        features = retain_identified(features, id_field);
    }

    if let (Some(join), Some(id_field)) = (&config.join, &config.id_field) {
        let table = read_table(&join.table)?;
        features = attach_table(features, id_field, &table, &join.field);
    }

    let mut pipeline = GridPipeline::new(config.reducer(), config.resolutions)
        .with_step(config.step)
        .with_progress(progress);
    if let Some(elevation) = &config.elevation {
        pipeline = pipeline.with_elevation(elevation_sampling(elevation)?);
    }

    let (count, levels) = match config.kind {
        InputKind::Polygons => {
            let polygons = polygon_features(&features, &config.fields)?;
            (polygons.len(), pipeline.run(&polygons)?)
        }
        InputKind::Points => {
            let points = point_features(&features, &config.fields)?;
            (points.len(), pipeline.run_points(&points)?)
        }
    };

    write_levels(&config.output.path, &to_levels(&levels, config.output.layout))?;

    let summary = JobSummary {
        name: config.name.clone(),
        features: count,
        levels: levels.iter().map(summarize).collect(),
    };
    log::info!("{summary}");

    Ok(summary)
}

fn summarize(level: &ResolutionLevel) -> LevelSummary {
    LevelSummary {
        resolution: u8::from(level.resolution),
        cells: level.cells.len(),
    }
}
