#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the geohex toolchain.
//!
//! `geohex run` executes one or more TOML job files, each producing a
//! per-resolution hex artifact. `geohex combine` merges fields from other
//! artifacts into a base artifact cell by cell.
//!
//! Uses `indicatif-log-bridge` (via [`geohex_cli_utils::init_logger`]) to
//! route `log` output through `indicatif::MultiProgress` so that log lines
//! and progress bars never fight for the terminal.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use geohex_cli_utils::{JobProgress, jobs_bar};
use geohex_ingest::combine::{Overlay, OverlaySpec, combine};
use geohex_ingest::config::JobConfig;
use geohex_ingest::job::run_job;
use geohex_ingest::output::{OutputLayout, read_levels, write_levels};

/// Aggregate polygon and point data onto H3 hex grids.
#[derive(Parser)]
#[command(name = "geohex")]
#[command(about = "Aggregate polygon and point data onto H3 hex grids")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run one or more job files.
    Run {
        /// Job TOML files, run in order.
        #[arg(required = true)]
        configs: Vec<PathBuf>,
    },

    /// Copy fields from overlay artifacts into a base artifact.
    Combine {
        /// Artifact to copy fields into.
        #[arg(long)]
        base: PathBuf,

        /// Overlay as `<path>:<field>[,<field>...]`. Repeatable.
        #[arg(long, required = true)]
        overlay: Vec<OverlaySpec>,

        /// Where to write the combined artifact.
        #[arg(long)]
        output: PathBuf,

        /// Layout of the written levels (default: same as the base).
        #[arg(long, value_enum)]
        layout: Option<Layout>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Layout {
    Object,
    Pairs,
}

impl From<Layout> for OutputLayout {
    fn from(value: Layout) -> Self {
        match value {
            Layout::Object => Self::Object,
            Layout::Pairs => Self::Pairs,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = geohex_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { configs } => {
            let jobs = configs
                .iter()
                .map(|path| JobConfig::load(path))
                .collect::<Result<Vec<_>, _>>()?;

            let finished = (jobs.len() > 1).then(|| jobs_bar(&multi, jobs.len() as u64));

            for config in &jobs {
                let summary = run_job(config, JobProgress::new(&multi, &config.name))?;
                log::info!("Finished {summary}");

                if let Some(finished) = &finished {
                    finished.inc(1);
                }
            }

            if let Some(finished) = finished {
                finished.finish();
            }
        }
        Commands::Combine {
            base,
            overlay,
            output,
            layout,
        } => {
            let mut levels = read_levels(&base)?;
            let overlays = overlay
                .iter()
                .map(Overlay::load)
                .collect::<Result<Vec<_>, _>>()?;

            let copied = combine(&mut levels, &overlays);

            if let Some(layout) = layout {
                let layout = OutputLayout::from(layout);
                levels = levels
                    .into_iter()
                    .map(|level| level.into_layout(layout))
                    .collect();
            }

            write_levels(&output, &levels)?;
            log::info!(
                "Combined {} overlays into {} ({copied} values copied)",
                overlays.len(),
                output.display()
            );
        }
    }

    Ok(())
}
