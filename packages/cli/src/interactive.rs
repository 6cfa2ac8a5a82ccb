//! Interactive menu shown when no subcommand is given.
//!
//! Starts from the loaded configuration and lets the user adjust the
//! common settings before running.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};
use road_safety_cli_utils::{MultiProgress, select_years};
use road_safety_segment_models::MatchPolicy;

use crate::config::PipelineConfig;
use crate::pipeline::{self, PipelineProgress};

/// Traffic-count years offered in the year picker.
const CANDIDATE_YEARS: &[u16] = &[2023, 2022, 2021, 2020, 2019, 2018, 2017];

enum Tool {
    RunPipeline,
    Rankings,
    Counties,
}

impl Tool {
    const ALL: &[Self] = &[Self::RunPipeline, Self::Rankings, Self::Counties];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunPipeline => "Run full pipeline",
            Self::Rankings => "Rebuild rankings from merged table",
            Self::Counties => "Rebuild county crash tallies",
        }
    }
}

fn prompt_path(prompt: &str, current: &std::path::Path) -> Result<PathBuf, dialoguer::Error> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .default(current.display().to_string())
        .interact_text()?;
    Ok(PathBuf::from(value))
}

fn configure_run(config: &mut PipelineConfig) -> Result<bool, Box<dyn std::error::Error>> {
    config.data_dir = prompt_path("Data directory", &config.data_dir)?;
    config.crash_csv = prompt_path("Crash table", &config.crash_csv)?;
    config.out_dir = prompt_path("Output directory", &config.out_dir)?;

    let mut candidates: Vec<u16> = CANDIDATE_YEARS.to_vec();
    for year in &config.years {
        if !candidates.contains(year) {
            candidates.push(*year);
        }
    }
    candidates.sort_unstable_by(|a, b| b.cmp(a));
    config.years = select_years(&candidates, &config.years)?;
    if config.years.is_empty() {
        println!("No years selected.");
        return Ok(false);
    }
    let (baseline, _) = config.baseline_and_rest()?;
    println!("Baseline year: {baseline}");

    let policies = [MatchPolicy::CatalogOrder, MatchPolicy::Narrowest];
    let labels = [
        "First segment in table order",
        "Narrowest containing segment",
    ];
    let current = policies
        .iter()
        .position(|p| *p == config.match_policy)
        .unwrap_or(0);
    let idx = Select::new()
        .with_prompt("When a crash falls in overlapping segments, use the")
        .items(&labels)
        .default(current)
        .interact()?;
    config.match_policy = policies[idx];

    Ok(Confirm::new()
        .with_prompt(format!(
            "Run with {} traffic-count years into {}?",
            config.years.len(),
            config.out_dir.display()
        ))
        .default(true)
        .interact()?)
}

/// Shows the tool menu and runs the selection.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected tool fails.
#[allow(clippy::future_not_send)]
pub async fn run(
    mut config: PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Road Safety Toolchain");
    println!();

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Tool::ALL[idx] {
        Tool::RunPipeline => {
            if !configure_run(&mut config)? {
                return Ok(());
            }
            let (_, additional) = config.baseline_and_rest()?;
            let progress = PipelineProgress::terminal(multi, additional.len());
            let summary = pipeline::run(&config, &progress).await?;
            println!(
                "Matched {} of {} crashes; {} routes written ({} failed).",
                summary.matched_crashes,
                summary.total_crashes,
                summary.routes_exported,
                summary.routes_failed
            );
        }
        Tool::Rankings => {
            let merged = prompt_path(
                "Merged table",
                &config.out_dir.join(road_safety_generate::MERGED_TABLE),
            )?;
            let reports = pipeline::rank(&config, &merged)?;
            for report in reports {
                println!("{}: {} segments ranked", report.metric, report.ranked);
            }
        }
        Tool::Counties => {
            config.crash_csv = prompt_path("Crash table", &config.crash_csv)?;
            let report = pipeline::counties(&config)?;
            println!(
                "Tallied {} counties over {} crash years.",
                report.counties, report.years
            );
        }
    }

    Ok(())
}
