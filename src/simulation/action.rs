//! Decoding learner actions into steering and speed
//!
//! The state machine has one `step`. What the learner's action means is
//! decided by the [`ActionDecoder`] it was built with.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::error::EnvError;

/// Action as produced by the learner
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Steering in `[-1, 1]`, speed in `[0, 1]`
    Continuous { steering: f64, speed: f64 },
    /// Index into an action catalog
    Discrete(usize),
}

/// Action ready for the actuation sink
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecodedAction {
    /// Radians
    pub steering_angle: f64,
    pub speed: f64,
    /// Catalog index for discrete actions
    pub index: Option<usize>,
}

pub trait ActionDecoder: Send {
    fn decode(&self, action: Action) -> Result<DecodedAction, EnvError>;

    /// Number of discrete actions, `None` for a continuous space
    fn action_count(&self) -> Option<usize>;
}

/// Box action space: steering `[-1, 1]`, speed `[0, 1]`
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuousDecoder;

impl ActionDecoder for ContinuousDecoder {
    fn decode(&self, action: Action) -> Result<DecodedAction, EnvError> {
        match action {
            Action::Continuous { steering, speed } => {
                if !steering.is_finite() || !speed.is_finite() {
                    return Err(EnvError::InvalidAction(format!(
                        "non-finite action ({steering}, {speed})"
                    )));
                }
                Ok(DecodedAction {
                    steering_angle: steering.clamp(-1.0, 1.0),
                    speed: speed.clamp(0.0, 1.0),
                    index: None,
                })
            }
            Action::Discrete(index) => Err(EnvError::InvalidAction(format!(
                "discrete action {index} given to a continuous action space"
            ))),
        }
    }

    fn action_count(&self) -> Option<usize> {
        None
    }
}

/// One catalog entry. Steering is in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub steering_angle: f64,
    pub speed: f64,
}

/// Finite ordered list of discrete actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCatalog {
    pub action_space: Vec<ActionEntry>,
}

impl Default for ActionCatalog {
    /// Five steering angles at two speeds
    fn default() -> Self {
        let action_space = [-30.0, -15.0, 0.0, 15.0, 30.0]
            .into_iter()
            .flat_map(|steering_angle| {
                [0.4, 0.8].into_iter().map(move |speed| ActionEntry {
                    steering_angle,
                    speed,
                })
            })
            .collect();
        Self { action_space }
    }
}

impl ActionCatalog {
    /// Load a `{"action_space": [...]}` model metadata file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let catalog: ActionCatalog = serde_json::from_str(&data)?;
        if catalog.action_space.is_empty() {
            anyhow::bail!("action space is empty");
        }
        Ok(catalog)
    }

    /// Load from `path`, falling back to the built-in catalog on any problem
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            let catalog = Self::default();
            info!("No custom action space, using default: {:?}", catalog.action_space);
            return catalog;
        };
        match Self::from_file(path) {
            Ok(catalog) => {
                info!("Loaded action space from file: {:?}", catalog.action_space);
                catalog
            }
            Err(e) => {
                let catalog = Self::default();
                info!(
                    "Exception {} on loading custom action space, using default: {:?}",
                    e, catalog.action_space
                );
                catalog
            }
        }
    }

    pub fn len(&self) -> usize {
        self.action_space.len()
    }

    pub fn is_empty(&self) -> bool {
        self.action_space.is_empty()
    }
}

impl ActionDecoder for ActionCatalog {
    fn decode(&self, action: Action) -> Result<DecodedAction, EnvError> {
        let Action::Discrete(index) = action else {
            return Err(EnvError::InvalidAction(
                "continuous action given to a discrete action space".to_string(),
            ));
        };
        let entry = self.action_space.get(index).ok_or_else(|| {
            EnvError::InvalidAction(format!(
                "action {index} outside catalog of {}",
                self.action_space.len()
            ))
        })?;
        Ok(DecodedAction {
            steering_angle: entry.steering_angle.to_radians(),
            speed: entry.speed,
            index: Some(index),
        })
    }

    fn action_count(&self) -> Option<usize> {
        Some(self.action_space.len())
    }
}
