#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing shared by the road-safety binaries.
//!
//! [`IndicatifProgress`] renders [`StageProgress`] updates as `indicatif`
//! bars, and [`init_logger`] routes `log` output through the same
//! [`MultiProgress`] so log lines never tear a bar mid-redraw.
//! [`select_years`] is the year picker used by interactive runs.

use std::sync::Arc;
use std::time::Duration;

use dialoguer::MultiSelect;
use indicatif::{ProgressBar, ProgressStyle};
use road_safety_source::progress::StageProgress;

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`StageProgress`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style applied once `start()` provides a length.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Bar for loading the additional traffic-count years. The number of
    /// years is known up front.
    #[must_use]
    pub fn years_bar(multi: &MultiProgress, total: u64) -> Arc<dyn StageProgress> {
        let bar = multi.add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        bar.set_message("Traffic-count years");

        let bar_style = bar.style();

        Arc::new(Self { bar, bar_style })
    }

    /// Bar for writing route partitions. Spins until the partition count
    /// arrives through `start()`.
    #[must_use]
    pub fn routes_bar(multi: &MultiProgress) -> Arc<dyn StageProgress> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.yellow} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Route partitions");

        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.yellow/dim} {pos}/{len} {percent}% [{eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }
}

impl StageProgress for IndicatifProgress {
    fn start(&self, units: u64) {
        self.bar.set_length(units);
        self.bar.reset();
        self.bar.set_style(self.bar_style.clone());
    }

    fn working_on(&self, item: &str) {
        self.bar.set_message(item.to_string());
    }

    fn done_one(&self) {
        self.bar.inc(1);
    }

    fn finish(&self, summary: &str) {
        self.bar.finish_with_message(summary.to_string());
    }
}

/// Initializes `pretty_env_logger` (honouring `RUST_LOG`) wrapped in
/// `indicatif-log-bridge`.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set when called twice, e.g. from tests.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

/// Asks which of `candidates` to load, with `selected` pre-checked.
/// Returns the chosen years in the order of `candidates`.
///
/// # Errors
///
/// Returns [`dialoguer::Error`] if the terminal prompt fails.
pub fn select_years(candidates: &[u16], selected: &[u16]) -> Result<Vec<u16>, dialoguer::Error> {
    let labels: Vec<String> = candidates.iter().map(ToString::to_string).collect();
    let defaults: Vec<bool> = candidates.iter().map(|y| selected.contains(y)).collect();

    let picked = MultiSelect::new()
        .with_prompt("Traffic-count years (space=toggle, enter=confirm)")
        .items(&labels)
        .defaults(&defaults)
        .interact()?;

    Ok(picked.into_iter().map(|i| candidates[i]).collect())
}
