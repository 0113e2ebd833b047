use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoastError};
use crate::model::{ModelKind, TrainingConfig};
use crate::roast::GeminiConfig;
use crate::log_info;

const ENABLE_LOGS: bool = true;

pub const ENV_CONFIG_PATH: &str = "ROAST_CONFIG";
pub const ENV_DATA_PATH: &str = "ROAST_DATA_PATH";
pub const ENV_OUTPUT_DIR: &str = "ROAST_OUTPUT_DIR";
pub const ENV_MODEL_KIND: &str = "ROAST_MODEL_KIND";
pub const ENV_TEST_SIZE: &str = "ROAST_TEST_SIZE";
pub const ENV_MAX_DEPTH: &str = "ROAST_MAX_DEPTH";
pub const ENV_RANDOM_SEED: &str = "ROAST_RANDOM_SEED";
pub const ENV_DEMO_USERS: &str = "ROAST_DEMO_USERS";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_path: PathBuf,
    /// Results are only written when this is set.
    pub output_dir: Option<PathBuf>,
    pub training: TrainingConfig,
    /// 0 skips cross-validation.
    pub cv_folds: usize,
    /// How many leading rows get a prediction and a roast.
    pub demo_users: usize,
    /// Fail the load on the first bad row instead of dropping it
    pub strict_rows: bool,
    pub cap_outliers: bool,
    pub save_model: bool,
    pub gemini: GeminiConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/sample_roast_data.csv"),
            output_dir: None,
            training: TrainingConfig::default(),
            cv_folds: 5,
            demo_users: 5,
            strict_rows: false,
            cap_outliers: false,
            save_model: false,
            gemini: GeminiConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads `path` when given (defaults otherwise), then applies the
    /// environment overrides and validates.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// [`PipelineConfig::load`] with overrides taken from `lookup`.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                let config: PipelineConfig = serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse config from {}", path.display()))?;
                log_info!("[config] loaded {}", path.display());
                config
            }
            None => PipelineConfig::default(),
        };

        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(path) = get(ENV_DATA_PATH) {
            self.data_path = PathBuf::from(path);
        }
        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(kind) = get(ENV_MODEL_KIND) {
            self.training.model_kind = kind.parse::<ModelKind>()?;
        }
        if let Some(size) = get(ENV_TEST_SIZE) {
            self.training.test_size = parse_env(ENV_TEST_SIZE, &size)?;
        }
        if let Some(depth) = get(ENV_MAX_DEPTH) {
            self.training.max_depth = if depth.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_env(ENV_MAX_DEPTH, &depth)?)
            };
        }
        if let Some(seed) = get(ENV_RANDOM_SEED) {
            self.training.random_seed = parse_env(ENV_RANDOM_SEED, &seed)?;
        }
        if let Some(users) = get(ENV_DEMO_USERS) {
            self.demo_users = parse_env(ENV_DEMO_USERS, &users)?;
        }
        if let Some(key) = get(ENV_GEMINI_API_KEY) {
            self.gemini.api_key = Some(key.trim().to_string());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        if self.cv_folds == 1 {
            return Err(RoastError::InvalidConfig(
                "cv_folds must be 0 (disabled) or at least 2".to_string(),
            ));
        }
        if self.gemini.timeout_secs == 0 {
            return Err(RoastError::InvalidConfig(
                "gemini.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RoastError::InvalidConfig(format!("{name} has invalid value {value:?}")))
}
