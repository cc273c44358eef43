//! Error types and structured error events

use std::path::PathBuf;

use log::error;
use serde::Serialize;
use thiserror::Error;

/// Startup configuration problems. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required parameter `{0}`")]
    Missing(&'static str),

    #[error("invalid parameter `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Problems with the waypoint table
#[derive(Error, Debug, PartialEq)]
pub enum TrackError {
    #[error("need at least 2 waypoints, got {0}")]
    TooFewWaypoints(usize),

    #[error("waypoint rows need 6 columns, got {0}")]
    Columns(usize),

    #[error("waypoint array of {len} values cannot be shaped {rows}x{cols}")]
    Shape { rows: usize, cols: usize, len: usize },

    #[error("waypoint table contains non-finite values")]
    NonFinite,

    #[error("centerline has zero length")]
    Degenerate,
}

/// Failures talking to the simulator
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("unable to retrieve waypoints: {0}")]
    Waypoints(#[source] anyhow::Error),

    #[error("unable to read state of `{body}`: {source}")]
    Pose {
        body: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unable to reset the car: {0}")]
    Reset(#[source] anyhow::Error),

    #[error(transparent)]
    Track(#[from] TrackError),
}

/// The user-supplied reward function failed
#[derive(Error, Debug)]
pub enum RewardError {
    #[error("reward function raised: {0}")]
    Raised(#[source] anyhow::Error),

    #[error("reward function returned non-finite value {0}")]
    NonFinite(f64),
}

/// Errors surfaced by the environment API
#[derive(Error, Debug)]
pub enum EnvError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("track error: {0}")]
    Track(#[from] TrackError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("episode is not running; call reset first")]
    NotRunning,
}

/// Who is at fault, so upstream can route the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Internal or simulator fault
    Environment,
    /// Fault in user-supplied code
    User,
}

impl ErrorCategory {
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorCategory::Environment => "500",
            ErrorCategory::User => "400",
        }
    }
}

/// Log one structured error event as a JSON object
pub fn log_structured_error(message: &str, category: ErrorCategory) {
    let event = serde_json::json!({
        "message": message,
        "category": category,
        "error_code": category.error_code(),
    });
    error!("{}", event);
}
