//! Pipeline configuration.
//!
//! Every field has a default, so a TOML file only needs the values it
//! changes. Command-line flags are applied on top.

use std::path::{Path, PathBuf};

use road_safety_analytics::{MetricsConfig, RankingConfig};
use road_safety_generate::layers::LayerFilter;
use road_safety_segment_models::MatchPolicy;
use road_safety_spatial::Placement;
use serde::{Deserialize, Serialize};

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },

    #[error("No traffic-count years configured")]
    NoYears,
}

/// Ranking cutoffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankingSettings {
    pub aadt_cutoff: f64,
    pub min_length_mi: f64,
    pub top_n: usize,
    pub require_signed_route: bool,
}

impl Default for RankingSettings {
    fn default() -> Self {
        let defaults = RankingConfig::default();
        Self {
            aadt_cutoff: defaults.aadt_cutoff,
            min_length_mi: defaults.min_length_mi,
            top_n: defaults.top_n,
            require_signed_route: defaults.require_signed_route,
        }
    }
}

impl From<&RankingSettings> for RankingConfig {
    fn from(settings: &RankingSettings) -> Self {
        Self {
            aadt_cutoff: settings.aadt_cutoff,
            min_length_mi: settings.min_length_mi,
            top_n: settings.top_n,
            require_signed_route: settings.require_signed_route,
        }
    }
}

/// Map layer filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayerSettings {
    pub min_aadt: f64,
    pub excluded_department_prefixes: Vec<String>,
    pub kept_departments: Vec<String>,
}

impl Default for LayerSettings {
    fn default() -> Self {
        let defaults = LayerFilter::default();
        Self {
            min_aadt: defaults.min_aadt,
            excluded_department_prefixes: defaults.excluded_department_prefixes,
            kept_departments: defaults.kept_departments,
        }
    }
}

impl From<&LayerSettings> for LayerFilter {
    fn from(settings: &LayerSettings) -> Self {
        Self {
            min_aadt: settings.min_aadt,
            excluded_department_prefixes: settings
                .excluded_department_prefixes
                .iter()
                .map(|p| p.trim().to_uppercase())
                .collect(),
            kept_departments: settings
                .kept_departments
                .iter()
                .map(|d| d.trim().to_uppercase())
                .collect(),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root of the `Traffic_Yearly_Counts_<year>` directories.
    pub data_dir: PathBuf,
    pub crash_csv: PathBuf,
    /// Optional; a missing file leaves segments without route names.
    pub route_metadata: PathBuf,
    pub out_dir: PathBuf,
    /// Traffic-count years in any order. The newest is the baseline.
    pub years: Vec<u16>,
    pub crash_window_years: u32,
    pub days_per_year: f64,
    pub match_policy: MatchPolicy,
    pub placement: Placement,
    /// Route partitions written at once. Defaults to twice the available
    /// parallelism.
    pub concurrency: Option<usize>,
    pub ranking: RankingSettings,
    pub layers: LayerSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let metrics = MetricsConfig::default();
        Self {
            data_dir: PathBuf::from("data"),
            crash_csv: PathBuf::from("raw-mdt-source-data/2019-2023-crash-data.csv"),
            route_metadata: PathBuf::from("raw-mdt-source-data/Montana_On_System_Routes_OD.csv"),
            out_dir: PathBuf::from("output/merged_data"),
            years: vec![2023, 2022, 2021, 2020, 2019],
            crash_window_years: metrics.crash_window_years,
            days_per_year: metrics.days_per_year,
            match_policy: MatchPolicy::default(),
            placement: Placement::default(),
            concurrency: None,
            ranking: RankingSettings::default(),
            layers: LayerSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Toml {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reads `path` if given, otherwise returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Baseline year (the newest configured) and the other distinct years,
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoYears`] if no years are configured.
    pub fn baseline_and_rest(&self) -> Result<(u16, Vec<u16>), ConfigError> {
        let mut years = self.years.clone();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        let (baseline, rest) = years.split_first().ok_or(ConfigError::NoYears)?;
        Ok((*baseline, rest.to_vec()))
    }

    /// Every distinct year, baseline first. Geometry from earlier entries
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoYears`] if no years are configured.
    pub fn years_newest_first(&self) -> Result<Vec<u16>, ConfigError> {
        let (baseline, rest) = self.baseline_and_rest()?;
        Ok(std::iter::once(baseline).chain(rest).collect())
    }

    #[must_use]
    pub const fn metrics(&self) -> MetricsConfig {
        MetricsConfig {
            crash_window_years: self.crash_window_years,
            days_per_year: self.days_per_year,
        }
    }

    #[must_use]
    pub fn ranking(&self) -> RankingConfig {
        RankingConfig::from(&self.ranking)
    }

    #[must_use]
    pub fn layer_filter(&self) -> LayerFilter {
        LayerFilter::from(&self.layers)
    }

    /// Where ranking tables are written.
    #[must_use]
    pub fn rankings_dir(&self) -> PathBuf {
        self.out_dir.join("rankings")
    }

    /// Where county tallies are written.
    #[must_use]
    pub fn counties_dir(&self) -> PathBuf {
        self.out_dir.join("counties")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(
            config.baseline_and_rest().unwrap(),
            (2023, vec![2022, 2021, 2020, 2019])
        );
        assert_eq!(config.crash_window_years, 5);
    }

    #[test]
    fn partial_file_overrides_named_fields() {
        let config: PipelineConfig = toml::from_str(
            r#"
            years = [2022, 2021]
            match_policy = "narrowest"
            placement = "start"

            [ranking]
            top_n = 25

            [layers]
            kept_departments = ["u-5832", "x-1"]
            "#,
        )
        .unwrap();

        assert_eq!(config.years, vec![2022, 2021]);
        assert_eq!(config.match_policy, MatchPolicy::Narrowest);
        assert_eq!(config.placement, Placement::Start);
        assert_eq!(config.ranking().top_n, 25);
        assert!((config.ranking().aadt_cutoff - 1000.0).abs() < f64::EPSILON);
        assert_eq!(config.layer_filter().kept_departments, vec!["U-5832", "X-1"]);
    }

    #[test]
    fn newest_year_is_the_baseline_whatever_the_order() {
        let config = PipelineConfig {
            years: vec![2021, 2023, 2022],
            ..PipelineConfig::default()
        };
        assert_eq!(config.baseline_and_rest().unwrap(), (2023, vec![2022, 2021]));
        assert_eq!(config.years_newest_first().unwrap(), vec![2023, 2022, 2021]);
    }

    #[test]
    fn repeated_years_are_folded_once() {
        let config = PipelineConfig {
            years: vec![2023, 2023],
            ..PipelineConfig::default()
        };
        assert_eq!(config.baseline_and_rest().unwrap(), (2023, Vec::new()));

        let config = PipelineConfig {
            years: vec![2022, 2023, 2022, 2021],
            ..PipelineConfig::default()
        };
        assert_eq!(config.baseline_and_rest().unwrap(), (2023, vec![2022, 2021]));
    }

    #[test]
    fn unknown_keys_and_empty_years_are_rejected() {
        assert!(toml::from_str::<PipelineConfig>("yeras = [2023]").is_err());

        let config = PipelineConfig {
            years: Vec::new(),
            ..PipelineConfig::default()
        };
        assert!(matches!(config.baseline_and_rest(), Err(ConfigError::NoYears)));
    }
}
