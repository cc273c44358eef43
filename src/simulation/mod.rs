//! Racetrack simulation module
//!
//! Track geometry, bot cars and the episode state machine. Nothing in here
//! depends on a live simulator; the world is reached through the
//! [`Transport`] trait so everything can be driven from tests or the
//! headless binary.

mod action;
mod bot_car;
mod collision;
mod config;
mod env;
mod error;
mod geometry;
mod mailbox;
mod metrics;
mod progress;
mod reward;
mod track;
mod transport;
mod types;
mod waypoint_index;

// Re-export public types for external use
pub use action::{
    Action, ActionCatalog, ActionDecoder, ActionEntry, ContinuousDecoder, DecodedAction,
};
pub use bot_car::{BotCar, BotCarConfig, BotFleet, BotPose, BotSnapshot};
pub use collision::{CollisionModel, NearestBot, WheelStatus};
pub use config::{EnvConfig, JobType};
pub use env::{EpisodeState, RacetrackEnv, StepOutcome};
pub use error::{
    log_structured_error, ConfigError, EnvError, ErrorCategory, RewardError, TrackError,
    TransportError,
};
pub use geometry::{Polygon, Polyline};
pub use mailbox::Mailbox;
pub use metrics::{
    FileMetricsSink, JobControl, LoggingJobControl, MetricRecord, MetricsDocument, MetricsSink,
};
pub use progress::{lap_progress, resolve_progress, ProgressTracker};
pub use reward::{
    abort_on_reward_failure, call_reward_function, default_reward, RewardFunction, RewardParams,
};
pub use track::{
    circular_waypoints, waypoints_from_flat, BorderDistances, LanePath, TrackModel, Waypoint,
    WAYPOINT_COLUMNS,
};
pub use transport::{
    NullTransport, Simulator, SimulatorTransport, Transport, WaypointArray, EFFORT_JOINTS,
    RACECAR_MODEL, STEERING_TOPICS, VELOCITY_TOPICS, WHEEL_LINKS,
};
pub use types::{
    BotId, Frame, Point, Pose, Position, Quaternion, SimId, CRASHED, CRASH_DISTANCE_THRESHOLD,
    LAP_COMPLETE_BONUS, NO_BOT_DISTANCE, NUM_STEPS_TO_CHECK_STUCK,
    RELATIVE_POSITION_OF_FRONT_OF_CAR, ROUND_ROBIN_ADVANCE_DIST, STUCK_EPSILON,
    TRAINING_IMAGE_SIZE, WHEEL_RADIUS,
};
pub use waypoint_index::{find_bracket, Bracket, DistanceTable};
