#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the geohex binaries.
//!
//! [`JobProgress`] draws one `indicatif` bar per job and relabels it as the
//! pipeline moves from rasterizing features to reducing each resolution.
//! [`init_logger`] routes `log` output through the same [`MultiProgress`]
//! so log lines print above the bars instead of through them.

use std::sync::Arc;
use std::time::Duration;

use geohex_grid::progress::{ProgressCallback, Stage};
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Progress bar for one job's pipeline run.
pub struct JobProgress {
    bar: ProgressBar,
    job: String,
}

impl JobProgress {
    /// Adds a bar for job `job`. It spins until the first stage begins.
    #[must_use]
    pub fn new(multi: &MultiProgress, job: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("{job}: loading inputs"));

        Arc::new(Self {
            bar,
            job: job.to_string(),
        })
    }

    fn stage_style(stage: Stage) -> ProgressStyle {
        let color = match stage {
            Stage::Rasterizing { .. } => "yellow",
            Stage::Reducing { .. } => "cyan",
        };

        ProgressStyle::with_template(&format!(
            "  {{msg}} {{wide_bar:.{color}/dim}} {{pos}}/{{len}} {} [{{eta}}]",
            stage.unit()
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
    }
}

impl ProgressCallback for JobProgress {
    fn begin(&self, stage: Stage, total: u64) {
        self.bar.set_style(Self::stage_style(stage));
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_message(format!("{}: {stage}", self.job));
    }

    fn advance(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn finish(&self, summary: String) {
        self.bar.finish_with_message(format!("{}: {summary}", self.job));
    }
}

/// Adds a bar counting finished jobs out of `total`.
#[must_use]
pub fn jobs_bar(multi: &MultiProgress, total: u64) -> ProgressBar {
    let bar = multi.add(ProgressBar::new(total));
    bar.set_style(
        ProgressStyle::with_template("Jobs {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    bar
}

/// Installs `pretty_env_logger` (filtered by `RUST_LOG`) behind
/// `indicatif-log-bridge` and returns the [`MultiProgress`] every bar must
/// be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set when called twice (e.g. in tests).
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
