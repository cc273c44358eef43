//! Reward function plugin
//!
//! The reward function is user code. If it fails, every reward it produced
//! in this run is suspect, so a failure ends the process instead of the
//! episode.

use serde::Serialize;

use super::error::{log_structured_error, ErrorCategory, RewardError};

/// Everything the reward function gets to see about one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardParams {
    pub all_wheels_on_track: bool,
    pub x: f64,
    pub y: f64,
    /// Degrees
    pub heading: f64,
    pub distance_from_center: f64,
    /// 0 to 100
    pub progress: f64,
    pub steps: u64,
    pub speed: f64,
    /// Degrees
    pub steering_angle: f64,
    pub track_width: f64,
    pub waypoints: Vec<(f64, f64)>,
    pub closest_waypoints: [usize; 2],
    pub is_left_of_center: bool,
    pub is_reversed: bool,
    pub is_crashed: bool,
    pub dist_closest_bot: f64,
    pub bot_x: f64,
    pub bot_y: f64,
    /// Degrees
    pub bot_heading: f64,
    pub bot_closest_waypoints: [usize; 2],
}

pub trait RewardFunction: Send {
    fn reward(&self, params: &RewardParams) -> anyhow::Result<f64>;
}

impl<F> RewardFunction for F
where
    F: Fn(&RewardParams) -> anyhow::Result<f64> + Send,
{
    fn reward(&self, params: &RewardParams) -> anyhow::Result<f64> {
        self(params)
    }
}

/// Call the reward function and reject failures and non-finite rewards
pub fn call_reward_function(
    reward_function: &dyn RewardFunction,
    params: &RewardParams,
) -> Result<f64, RewardError> {
    let reward = reward_function
        .reward(params)
        .map_err(RewardError::Raised)?;
    if reward.is_finite() {
        Ok(reward)
    } else {
        Err(RewardError::NonFinite(reward))
    }
}

/// Log the failure as a user error and terminate the process
pub fn abort_on_reward_failure(err: &RewardError) -> ! {
    log_structured_error(
        &format!("Exception {err} in customer reward function. Job failed!"),
        ErrorCategory::User,
    );
    std::process::exit(1)
}

/// Follow the center line: full reward near it, tapering towards the edge
pub fn default_reward(params: &RewardParams) -> anyhow::Result<f64> {
    let markers = [
        (0.1 * params.track_width, 1.0),
        (0.25 * params.track_width, 0.5),
        (0.5 * params.track_width, 0.1),
    ];
    let reward = markers
        .iter()
        .find(|(marker, _)| params.distance_from_center <= *marker)
        .map_or(1e-3, |&(_, reward)| reward);
    Ok(reward)
}
