//! Startup configuration
//!
//! Loaded from a JSON file; missing optional keys take their defaults.
//! Missing required parameters are reported by [`EnvConfig::validate`] and
//! stop the environment from being built.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::action::{ActionCatalog, ActionDecoder, ContinuousDecoder};
use super::bot_car::BotCarConfig;
use super::error::ConfigError;
use super::types::{CRASH_DISTANCE_THRESHOLD, ROUND_ROBIN_ADVANCE_DIST};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobType {
    Training,
    Evaluation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    #[serde(default)]
    pub world_name: String,
    pub job_type: JobType,
    /// Identifier passed to job control on cancellation
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub metrics_path: PathBuf,

    /// Training ends after this many episodes, 0 disables the target
    #[serde(default)]
    pub target_number_of_episodes: u64,
    /// Training ends once an episode's reward reaches this score
    #[serde(default)]
    pub target_reward_score: Option<f64>,

    /// Defaults to true for training and false for evaluation
    #[serde(default)]
    pub change_start_position: Option<bool>,
    #[serde(default)]
    pub alternate_driving_direction: bool,
    #[serde(default = "default_round_robin_advance_dist")]
    pub round_robin_advance_dist: f64,

    /// Forward actions to the actuation sink
    #[serde(default)]
    pub allow_servo_step_signals: bool,

    /// Use a discrete action catalog instead of the continuous space
    #[serde(default)]
    pub discrete_action_space: bool,
    /// Catalog file for the discrete space; implies `discrete_action_space`
    #[serde(default)]
    pub action_space_path: Option<PathBuf>,

    #[serde(default = "default_crash_distance_threshold")]
    pub crash_distance_threshold: f64,

    #[serde(default = "BotCarConfig::defaults")]
    pub bot_cars: Vec<BotCarConfig>,
}

fn default_round_robin_advance_dist() -> f64 {
    ROUND_ROBIN_ADVANCE_DIST
}

fn default_crash_distance_threshold() -> f64 {
    CRASH_DISTANCE_THRESHOLD
}

impl EnvConfig {
    /// Configuration with every optional parameter at its default
    pub fn new(
        world_name: impl Into<String>,
        job_type: JobType,
        job_id: impl Into<String>,
        metrics_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            world_name: world_name.into(),
            job_type,
            job_id: job_id.into(),
            metrics_path: metrics_path.into(),
            target_number_of_episodes: 0,
            target_reward_score: None,
            change_start_position: None,
            alternate_driving_direction: false,
            round_robin_advance_dist: ROUND_ROBIN_ADVANCE_DIST,
            allow_servo_step_signals: false,
            discrete_action_space: false,
            action_space_path: None,
            crash_distance_threshold: CRASH_DISTANCE_THRESHOLD,
            bot_cars: BotCarConfig::defaults(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EnvConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_name.trim().is_empty() {
            return Err(ConfigError::Missing("world_name"));
        }
        if self.job_id.trim().is_empty() {
            return Err(ConfigError::Missing("job_id"));
        }
        if self.metrics_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("metrics_path"));
        }
        if !(0.0..1.0).contains(&self.round_robin_advance_dist) {
            return Err(ConfigError::Invalid {
                name: "round_robin_advance_dist",
                reason: format!("{} is outside [0, 1)", self.round_robin_advance_dist),
            });
        }
        if !(self.crash_distance_threshold.is_finite() && self.crash_distance_threshold >= 0.0) {
            return Err(ConfigError::Invalid {
                name: "crash_distance_threshold",
                reason: format!("{} is not a non-negative distance", self.crash_distance_threshold),
            });
        }
        if let Some(bot) = self
            .bot_cars
            .iter()
            .find(|b| !(b.speed.is_finite() && b.start_dist.is_finite()))
        {
            return Err(ConfigError::Invalid {
                name: "bot_cars",
                reason: format!("non-finite bot parameters {bot:?}"),
            });
        }
        Ok(())
    }

    pub fn change_start(&self) -> bool {
        self.change_start_position
            .unwrap_or(self.job_type == JobType::Training)
    }

    /// Catalog decoder for a discrete space, falling back to the built-in
    /// catalog when the file is absent or invalid
    pub fn action_decoder(&self) -> Box<dyn ActionDecoder> {
        if self.discrete_action_space || self.action_space_path.is_some() {
            Box::new(ActionCatalog::load_or_default(
                self.action_space_path.as_deref(),
            ))
        } else {
            Box::new(ContinuousDecoder)
        }
    }
}
