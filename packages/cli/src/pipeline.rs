//! End-to-end pipeline: load, average, match, aggregate, export.
//!
//! Only a missing baseline table or an unwritable output stops a run.
//! Missing optional inputs are logged and the run continues with what it
//! has.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use road_safety_analytics::{RunSummary, aggregate};
use road_safety_analytics_models::SegmentSafetyRecord;
use road_safety_catalog::{SegmentCatalog, averager::YearObservations, enrich::RouteIndex};
use road_safety_cli_utils::{IndicatifProgress, MultiProgress};
use road_safety_generate::{
    ExportError,
    county::{CountyReport, write_county_tables},
    layers::write_layers,
    rankings::{RankingReport, write_rankings},
    read_merged_table,
    routes::{default_concurrency, export_routes, partition_routes},
    write_merged_tables, write_summary,
};
use road_safety_matcher::CorridorIndex;
use road_safety_source::{
    DataLayout, SourceError,
    geometry::load_geometry_years,
    load_additional_years, load_baseline, load_crashes, load_route_metadata,
    progress::{StageProgress, null_progress},
};
use road_safety_spatial::GeometryCatalog;

use crate::config::{ConfigError, PipelineConfig};

/// Errors that stop a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Progress reporters for the long-running stages.
pub struct PipelineProgress {
    pub years: Arc<dyn StageProgress>,
    pub routes: Arc<dyn StageProgress>,
}

impl PipelineProgress {
    /// Terminal bars registered with `multi`.
    #[must_use]
    pub fn terminal(multi: &MultiProgress, additional_years: usize) -> Self {
        Self {
            years: IndicatifProgress::years_bar(multi, additional_years as u64),
            routes: IndicatifProgress::routes_bar(multi),
        }
    }

    /// No output.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            years: null_progress(),
            routes: null_progress(),
        }
    }
}

/// Runs the merge pipeline and writes every output under
/// `config.out_dir`.
///
/// # Errors
///
/// Returns [`PipelineError`] if no years are configured, the baseline
/// table is missing, an input file exists but cannot be read, or an
/// output cannot be written.
pub async fn run(
    config: &PipelineConfig,
    progress: &PipelineProgress,
) -> Result<RunSummary, PipelineError> {
    let start = Instant::now();
    let (baseline_year, additional_years) = config.baseline_and_rest()?;
    let layout = DataLayout::new(&config.data_dir);

    // Catalog
    let baseline = load_baseline(&layout, baseline_year)?;
    let mut catalog = SegmentCatalog::from_rows(&baseline.rows);

    let routes = RouteIndex::from_rows(&load_route_metadata(&config.route_metadata)?);
    catalog.enrich(&routes);

    // Averaging
    let tables = load_additional_years(&layout, &additional_years, &progress.years)?;
    let years_loaded: Vec<u16> = tables.iter().map(|t| t.year).collect();
    catalog.average_years(
        tables
            .iter()
            .map(|t| YearObservations::from_rows(t.year, &t.rows))
            .collect(),
    );

    // Matching
    let crash_table = load_crashes(&config.crash_csv)?;
    let crashes = crash_table.crashes;
    let index = CorridorIndex::build(catalog.segments(), config.match_policy);
    let matches = index.match_all(&crashes);

    // Aggregation
    let records = aggregate(catalog.segments(), &crashes, &matches, &config.metrics());
    write_merged_tables(&config.out_dir, &records)?;

    // Geometry
    let geometry_years = load_geometry_years(&layout, &config.years_newest_first()?);
    let geometry = GeometryCatalog::from_years(geometry_years.iter().map(|y| y.features.as_slice()));
    write_layers(
        &config.out_dir,
        &records,
        &geometry,
        config.placement,
        &config.layer_filter(),
    )?;

    // Route fan-out
    let partitions = partition_routes(&records, &crashes, &matches);
    let route_report = export_routes(
        &config.out_dir,
        partitions,
        Arc::new(geometry),
        config.concurrency.unwrap_or_else(default_concurrency),
        Arc::clone(&progress.routes),
    )
    .await?;

    write_rankings(&config.rankings_dir(), &records, &config.ranking())?;
    write_county_tables(&config.counties_dir(), &crashes)?;

    let mut summary = RunSummary::new(baseline_year, &records, &matches, config.match_policy);
    summary.years_requested = additional_years;
    summary.years_loaded = years_loaded;
    summary.duplicate_segment_keys = catalog.duplicates().len();
    summary.segments_without_range = index.excluded();
    summary.routes_exported = route_report.written;
    summary.routes_failed = route_report.failed;
    summary.unreadable_crash_rows = crash_table.unreadable_rows;

    if !summary.is_conserved() {
        log::error!(
            "Crash totals do not balance: {} matched + {} unmatched of {} read, {} rows unreadable",
            summary.matched_crashes,
            summary.unmatched_crashes.total(),
            summary.total_crashes,
            summary.unreadable_crash_rows
        );
    }
    write_summary(&config.out_dir, &summary)?;

    log::info!(
        "Pipeline finished in {:.1}s: {} of {} crashes matched to {} segments",
        start.elapsed().as_secs_f64(),
        summary.matched_crashes,
        summary.total_crashes,
        summary.segments
    );

    Ok(summary)
}

/// Rewrites the ranking tables from an existing merged table.
///
/// # Errors
///
/// Returns [`PipelineError::Export`] if the merged table cannot be read or
/// a ranking cannot be written.
pub fn rank(config: &PipelineConfig, merged: &Path) -> Result<Vec<RankingReport>, PipelineError> {
    let records: Vec<SegmentSafetyRecord> = read_merged_table(merged)?;
    log::info!("Read {} segments from {}", records.len(), merged.display());
    Ok(write_rankings(&config.rankings_dir(), &records, &config.ranking())?)
}

/// Rewrites the county tallies from the crash table.
///
/// # Errors
///
/// Returns [`PipelineError`] if the crash table cannot be read or a tally
/// cannot be written.
pub fn counties(config: &PipelineConfig) -> Result<CountyReport, PipelineError> {
    let table = load_crashes(&config.crash_csv)?;
    Ok(write_county_tables(&config.counties_dir(), &table.crashes)?)
}
