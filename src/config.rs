use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assemble::{AssembleOptions, LabelSource};
use crate::booster::BoosterConfig;
use crate::error::{PipelineError, Result};
use crate::evaluate::EvaluationConfig;
use crate::split::SplitConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub player_totals: PathBuf,
    pub player_advanced: PathBuf,
    pub team_standings: PathBuf,
    /// Intermediate tables, the model artifact and reports land here.
    pub output_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            player_totals: PathBuf::from("data/player_totals.csv"),
            player_advanced: PathBuf::from("data/player_advanced.csv"),
            team_standings: PathBuf::from("data/team_standings.csv"),
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataPaths,
    pub first_season: i32,
    pub label: LabelSource,
    pub split: SplitConfig,
    pub booster: BoosterConfig,
    pub evaluation: EvaluationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let assemble = AssembleOptions::default();
        Self {
            data: DataPaths::default(),
            first_season: assemble.first_season,
            label: assemble.label,
            split: SplitConfig::default(),
            booster: BoosterConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, overlaid by the JSON file when given, then by `MVP_*`
    /// environment variables. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Config(format!("invalid config {}: {e}", path.display()))
        })
    }

    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse::<i32>("MVP_FIRST_SEASON") {
            self.first_season = v;
        }
        if let Some(v) = opt_env("MVP_OUTPUT_DIR") {
            self.data.output_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse::<usize>("MVP_N_ESTIMATORS") {
            self.booster.n_estimators = v;
        }
        if let Some(v) = env_parse::<f64>("MVP_LEARNING_RATE") {
            self.booster.learning_rate = v;
        }
        if let Some(v) = env_parse::<usize>("MVP_MAX_DEPTH") {
            self.booster.max_depth = v;
        }
        if let Some(v) = env_parse::<u64>("MVP_SEED") {
            self.booster.seed = v;
        }
        if let Some(v) = env_parse::<usize>("MVP_RECENT_SEASONS") {
            self.evaluation.recent_seasons = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_season < 1946 {
            return Err(PipelineError::Config(format!(
                "first_season {} predates the league",
                self.first_season
            )));
        }
        self.booster.validate()?;
        self.evaluation.validate()?;
        if self
            .split
            .validation_seasons
            .iter()
            .any(|s| self.split.excluded_seasons.contains(s))
        {
            return Err(PipelineError::Config(
                "split: a season cannot be both validation and excluded".to_string(),
            ));
        }
        Ok(())
    }

    pub fn assemble_options(&self) -> AssembleOptions {
        AssembleOptions {
            first_season: self.first_season,
            label: self.label,
        }
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|val| if val.trim().is_empty() { None } else { Some(val) })
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    opt_env(key).and_then(|val| val.trim().parse::<T>().ok())
}
