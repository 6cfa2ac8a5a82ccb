#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the road-safety crash-rate pipeline.
//!
//! `road_safety run` builds the merged segment table and every export from
//! it. `rank` and `counties` rebuild their outputs alone. With no
//! subcommand an interactive menu is shown.
//!
//! Log output goes through `indicatif-log-bridge` (via
//! [`road_safety_cli_utils::init_logger`]) so it never collides with
//! progress bars.

mod config;
mod interactive;
mod pipeline;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use road_safety_segment_models::MatchPolicy;
use road_safety_spatial::Placement;

use crate::config::PipelineConfig;
use crate::pipeline::PipelineProgress;

#[derive(Parser)]
#[command(name = "road_safety", about = "Road-segment crash-rate pipeline")]
struct Cli {
    /// TOML pipeline configuration. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags that override the configuration file.
#[derive(Args, Default)]
struct Overrides {
    /// Directory holding the `Traffic_Yearly_Counts_<year>` folders
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Crash table CSV
    #[arg(long, global = true)]
    crash_csv: Option<PathBuf>,

    /// Route metadata CSV
    #[arg(long, global = true)]
    route_metadata: Option<PathBuf>,

    /// Output directory
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Traffic-count years (comma-separated); the newest is the baseline
    #[arg(long, global = true, value_delimiter = ',')]
    years: Option<Vec<u16>>,

    /// How a crash chooses among overlapping segments
    #[arg(long, global = true)]
    match_policy: Option<MatchPolicy>,

    /// Where on the centerline point features are placed
    #[arg(long, global = true)]
    placement: Option<Placement>,

    /// Route partitions written at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,
}

impl Overrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(v) = self.data_dir {
            config.data_dir = v;
        }
        if let Some(v) = self.crash_csv {
            config.crash_csv = v;
        }
        if let Some(v) = self.route_metadata {
            config.route_metadata = v;
        }
        if let Some(v) = self.out_dir {
            config.out_dir = v;
        }
        if let Some(v) = self.years {
            config.years = v;
        }
        if let Some(v) = self.match_policy {
            config.match_policy = v;
        }
        if let Some(v) = self.placement {
            config.placement = v;
        }
        if let Some(v) = self.concurrency {
            config.concurrency = Some(v);
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the merged table, map layers, route partitions, rankings, and
    /// county tallies
    Run,
    /// Rebuild the ranking tables from an existing merged table
    Rank {
        /// Merged table to rank. Defaults to the one in the output
        /// directory.
        #[arg(long)]
        merged: Option<PathBuf>,

        /// Only segments with average AADT above this are ranked
        #[arg(long)]
        aadt_cutoff: Option<f64>,

        /// Rows kept per ranking
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Rebuild the county crash tallies from the crash table
    Counties,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = road_safety_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load_or_default(cli.config.as_deref())?;
    cli.overrides.apply(&mut config);

    match cli.command {
        None => interactive::run(config, &multi).await?,
        Some(Commands::Run) => {
            let (_, additional) = config.baseline_and_rest()?;
            let progress = PipelineProgress::terminal(&multi, additional.len());
            pipeline::run(&config, &progress).await?;
        }
        Some(Commands::Rank {
            merged,
            aadt_cutoff,
            top_n,
        }) => {
            if let Some(v) = aadt_cutoff {
                config.ranking.aadt_cutoff = v;
            }
            if let Some(v) = top_n {
                config.ranking.top_n = v;
            }
            let merged =
                merged.unwrap_or_else(|| config.out_dir.join(road_safety_generate::MERGED_TABLE));
            pipeline::rank(&config, &merged)?;
        }
        Some(Commands::Counties) => {
            pipeline::counties(&config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_enum_flags_from_their_names() {
        let cli = Cli::try_parse_from([
            "road_safety",
            "--match-policy",
            "narrowest",
            "--placement",
            "start",
            "--years",
            "2021,2023",
            "run",
        ])
        .unwrap();

        assert_eq!(cli.overrides.match_policy, Some(MatchPolicy::Narrowest));
        assert_eq!(cli.overrides.placement, Some(Placement::Start));
        assert_eq!(cli.overrides.years, Some(vec![2021, 2023]));
        assert!(matches!(cli.command, Some(Commands::Run)));
    }

    #[test]
    fn rejects_unknown_match_policy() {
        assert!(Cli::try_parse_from(["road_safety", "--match-policy", "widest", "run"]).is_err());
    }
}
