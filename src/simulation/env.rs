//! Episode state machine
//!
//! `Idle -> Running -> Done`, then back to `Running` on the next reset, or
//! to `Terminated` once the training job has met its target. `reset` and
//! `step` are driven synchronously by one training loop; each call runs one
//! inference pass that locates the car, scores the step and decides whether
//! the episode is over.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::info;

use super::action::{Action, ActionDecoder, DecodedAction};
use super::bot_car::{BotFleet, BotPose, BotSnapshot};
use super::collision::{CollisionModel, NearestBot};
use super::config::{EnvConfig, JobType};
use super::error::{log_structured_error, EnvError, ErrorCategory};
use super::metrics::{JobControl, MetricRecord, MetricsDocument, MetricsSink};
use super::progress::ProgressTracker;
use super::reward::{abort_on_reward_failure, call_reward_function, RewardFunction, RewardParams};
use super::track::TrackModel;
use super::transport::Transport;
use super::types::{
    Frame, Point, Pose, CRASHED, LAP_COMPLETE_BONUS, NUM_STEPS_TO_CHECK_STUCK,
    RELATIVE_POSITION_OF_FRONT_OF_CAR, STUCK_EPSILON,
};
use super::waypoint_index::Bracket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EpisodeState {
    /// Before the first reset
    #[default]
    Idle,
    Running,
    /// Episode finished, waiting for the next reset
    Done,
    /// Job targets reached; no further episodes will run
    Terminated,
}

/// Result of a reset or a step, handed back to the training loop
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Option<Frame>,
    pub reward: f64,
    pub done: bool,
}

/// Bot fields of the reward parameters
#[derive(Debug, Clone, Copy, Default)]
struct BotTelemetry {
    point: Point,
    heading: f64,
    bracket: Bracket,
}

/// The racetrack environment
pub struct RacetrackEnv<T> {
    config: EnvConfig,
    transport: T,
    track: TrackModel,
    center_coords: Vec<(f64, f64)>,
    collision: CollisionModel,
    decoder: Box<dyn ActionDecoder>,
    reward_function: Box<dyn RewardFunction>,
    metrics_sink: Box<dyn MetricsSink>,
    job_control: Box<dyn JobControl>,
    bots: Vec<BotSnapshot>,

    state: EpisodeState,
    episodes: u64,
    trials: u64,
    start_ndist: f64,
    reverse_dir: bool,
    change_start: bool,
    is_simulation_done: bool,
    allow_servo_step_signals: bool,

    action: DecodedAction,
    progress: ProgressTracker,
    prev_point: Point,
    prev_point_2: Point,
    next_state: Option<Frame>,
    reward: f64,
    reward_in_episode: f64,
    done: bool,
    steps: u64,
    episode_start: DateTime<Utc>,
    metrics: MetricsDocument,
    last_pose: Pose,
    last_wheels: [Point; 4],
}

impl<T: Transport> RacetrackEnv<T> {
    /// Validate the configuration, fetch the waypoints and build the track
    pub fn new(
        config: EnvConfig,
        mut transport: T,
        reward_function: Box<dyn RewardFunction>,
        metrics_sink: Box<dyn MetricsSink>,
        job_control: Box<dyn JobControl>,
    ) -> Result<Self, EnvError> {
        config.validate()?;

        let waypoints = transport.waypoints().map_err(|e| {
            log_structured_error(&e.to_string(), ErrorCategory::Environment);
            e
        })?;
        let track = TrackModel::build(waypoints)?;
        info!(
            "Track {}: {} waypoints, loop={}, length {:.2}",
            config.world_name,
            track.waypoints().len(),
            track.is_loop(),
            track.track_length()
        );

        let decoder = config.action_decoder();
        let collision = CollisionModel::new(config.crash_distance_threshold);
        let change_start = config.change_start();
        let allow_servo_step_signals = config.allow_servo_step_signals;
        let center_coords = track.center_coords();

        Ok(Self {
            config,
            transport,
            track,
            center_coords,
            collision,
            decoder,
            reward_function,
            metrics_sink,
            job_control,
            bots: Vec::new(),
            state: EpisodeState::Idle,
            episodes: 0,
            trials: 0,
            start_ndist: 0.0,
            reverse_dir: false,
            change_start,
            is_simulation_done: false,
            allow_servo_step_signals,
            action: DecodedAction::default(),
            progress: ProgressTracker::new(),
            prev_point: Point::default(),
            prev_point_2: Point::default(),
            next_state: None,
            reward: 0.0,
            reward_in_episode: 0.0,
            done: false,
            steps: 0,
            episode_start: Utc::now(),
            metrics: MetricsDocument::default(),
            last_pose: Pose::default(),
            last_wheels: [Point::default(); 4],
        })
    }

    /// Replace the action decoder chosen from the configuration
    pub fn with_action_decoder(mut self, decoder: Box<dyn ActionDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Spawn the configured bot cars at simulated time `now`. The caller
    /// owns the fleet and advances it from its clock; the environment only
    /// reads the published poses.
    pub fn spawn_bot_fleet(&mut self, now: f64) -> BotFleet {
        let fleet = BotFleet::new(&self.config.bot_cars, self.track.lanes(), now);
        self.bots.extend(fleet.snapshots());
        fleet
    }

    /// Read bot poses from externally owned bots
    pub fn attach_bots(&mut self, bots: impl IntoIterator<Item = BotSnapshot>) {
        self.bots.extend(bots);
    }

    pub fn set_allow_servo_step_signals(&mut self, allow: bool) {
        self.allow_servo_step_signals = allow;
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn track(&self) -> &TrackModel {
        &self.track
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn state(&self) -> EpisodeState {
        self.state
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn start_ndist(&self) -> f64 {
        self.start_ndist
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse_dir
    }

    pub fn progress(&self) -> f64 {
        self.progress.progress()
    }

    pub fn reward_in_episode(&self) -> f64 {
        self.reward_in_episode
    }

    pub fn is_simulation_done(&self) -> bool {
        self.is_simulation_done
    }

    pub fn metrics(&self) -> &MetricsDocument {
        &self.metrics
    }

    pub fn action_count(&self) -> Option<usize> {
        self.decoder.action_count()
    }

    /// Start a new episode and return its first observation.
    ///
    /// The first inference pass can already end the episode (the car starts
    /// crashed, off track or on top of a bot); `done` is then set and the
    /// caller has to reset again before stepping.
    ///
    /// Once the job is done this never returns: the process idles until it
    /// is shut down from outside, so no further metrics are produced.
    pub fn reset(&mut self) -> Result<StepOutcome, EnvError> {
        if let Some(frame) = self.transport.detached_observation() {
            return Ok(StepOutcome {
                observation: Some(frame),
                reward: 0.0,
                done: false,
            });
        }
        if self.is_simulation_done {
            self.quiesce();
        }

        self.action = DecodedAction::default();
        self.progress.reset();
        self.prev_point = Point::default();
        self.prev_point_2 = Point::default();
        self.next_state = None;
        self.reward = 0.0;
        self.reward_in_episode = 0.0;
        self.done = false;

        if self.allow_servo_step_signals {
            self.transport.send_action(0.0, 0.0);
        }
        self.reset_vehicle();
        self.steps = 0;
        self.episode_start = Utc::now();
        self.state = EpisodeState::Running;
        self.infer();

        Ok(self.outcome())
    }

    /// Apply one action and score the result
    pub fn step(&mut self, action: Action) -> Result<StepOutcome, EnvError> {
        if let Some(frame) = self.transport.detached_observation() {
            return Ok(StepOutcome {
                observation: Some(frame),
                reward: 0.0,
                done: false,
            });
        }
        if self.state != EpisodeState::Running {
            return Err(EnvError::NotRunning);
        }
        let decoded = self.decoder.decode(action)?;

        self.next_state = None;
        self.reward = 0.0;
        self.done = false;

        self.action = decoded;
        if self.allow_servo_step_signals {
            self.transport
                .send_action(decoded.steering_angle, decoded.speed);
        }
        self.steps += 1;
        self.infer();

        Ok(self.outcome())
    }

    fn outcome(&mut self) -> StepOutcome {
        StepOutcome {
            observation: self.next_state.take(),
            reward: self.reward,
            done: self.done,
        }
    }

    fn quiesce(&self) -> ! {
        info!("Simulation is done, waiting for shutdown");
        loop {
            thread::sleep(Duration::from_secs(1));
        }
    }

    fn reset_vehicle(&mut self) {
        let bracket = self.track.bracket(self.start_ndist, self.reverse_dir);
        if let Err(e) = self.transport.reset_vehicle(self.start_ndist, bracket.next) {
            log_structured_error(
                &format!("Unable to reset the car: {e}"),
                ErrorCategory::Environment,
            );
        }
    }

    fn read_pose(&mut self) -> Pose {
        match self.transport.vehicle_pose() {
            Ok(pose) => {
                self.last_pose = pose;
                pose
            }
            Err(e) => {
                log_structured_error(&e.to_string(), ErrorCategory::Environment);
                self.last_pose
            }
        }
    }

    fn read_wheels(&mut self) -> [Point; 4] {
        match self.transport.wheel_positions() {
            Ok(wheels) => {
                self.last_wheels = wheels;
                wheels
            }
            Err(e) => {
                log_structured_error(&e.to_string(), ErrorCategory::Environment);
                self.last_wheels
            }
        }
    }

    fn bot_telemetry(&self, nearest: Option<&NearestBot>) -> BotTelemetry {
        let Some(bot) = nearest else {
            return BotTelemetry::default();
        };
        let point = bot.pose.pose.point_at(RELATIVE_POSITION_OF_FRONT_OF_CAR);
        let ndist = self.track.project(&point);
        BotTelemetry {
            point,
            heading: bot.pose.pose.heading(),
            bracket: self.track.bracket(ndist, self.reverse_dir),
        }
    }

    fn infer(&mut self) {
        let steering_angle = self.action.steering_angle;
        let speed = self.action.speed;

        match self.transport.take_observation() {
            Ok(frame) => self.next_state = Some(frame),
            Err(e) => log_structured_error(
                &format!("Unable to retrieve image from queue: {e}"),
                ErrorCategory::Environment,
            ),
        }

        let pose = self.read_pose();
        let wheels = self.read_wheels();
        let model_point = pose.point_at(RELATIVE_POSITION_OF_FRONT_OF_CAR);
        let model_heading = pose.heading();

        let current_ndist = self.track.project(&model_point);
        let bracket = self.track.bracket(current_ndist, self.reverse_dir);
        let closest_waypoint = self.track.closest_waypoint(&model_point, bracket);
        let borders = self
            .track
            .nearest_border_distances(&model_point, current_ndist);

        let bot_poses: Vec<BotPose> = self.bots.iter().map(BotSnapshot::read).collect();
        let nearest = self
            .collision
            .nearest_bot(&pose.position.planar(), &bot_poses);
        let is_crashed = self.collision.is_crashed(nearest.as_ref());
        let dist_closest_bot = CollisionModel::reported_distance(nearest.as_ref());
        let bot = self.bot_telemetry(nearest.as_ref());

        let progress = self
            .progress
            .update(self.start_ndist, current_ndist, self.reverse_dir);
        let wheel_status = self.collision.wheel_status(&self.track, &wheels);

        let (mut reward, mut done) = if !is_crashed && wheel_status.any_on_track {
            let params = RewardParams {
                all_wheels_on_track: wheel_status.all_on_track,
                x: model_point.x,
                y: model_point.y,
                heading: model_heading.to_degrees(),
                distance_from_center: borders.from_center,
                progress,
                steps: self.steps,
                speed,
                steering_angle: steering_angle.to_degrees(),
                track_width: borders.track_width,
                waypoints: self.center_coords.clone(),
                closest_waypoints: bracket.as_pair(),
                is_left_of_center: borders.is_left_of_center(self.reverse_dir),
                is_reversed: self.reverse_dir,
                is_crashed,
                dist_closest_bot,
                bot_x: bot.point.x,
                bot_y: bot.point.y,
                bot_heading: bot.heading.to_degrees(),
                bot_closest_waypoints: bot.bracket.as_pair(),
            };
            match call_reward_function(self.reward_function.as_ref(), &params) {
                Ok(reward) => (reward, false),
                Err(e) => abort_on_reward_failure(&e),
            }
        } else {
            (CRASHED, true)
        };

        // Stuck: the car has not moved across the last two samples
        let moved = model_point
            .distance(&self.prev_point)
            .min(model_point.distance(&self.prev_point_2));
        if moved <= STUCK_EPSILON && self.steps % NUM_STEPS_TO_CHECK_STUCK == 0 {
            done = true;
            reward = CRASHED;
        }

        if progress >= 100.0 {
            done = true;
            reward = LAP_COMPLETE_BONUS;
        }

        self.prev_point_2 = self.prev_point;
        self.prev_point = model_point;
        self.reward = reward;
        self.reward_in_episode += reward;
        self.done = done;

        info!(
            "SIM_TRACE_LOG:{},{},{:.4},{:.4},{:.4},{:.2},{:.2},{},{:.4},{},{},{:.4},{},{:.2},{:.3},{},{:.2}",
            self.episodes,
            self.steps,
            model_point.x,
            model_point.y,
            model_heading,
            steering_angle,
            speed,
            self.action.index.unwrap_or(0),
            reward,
            done,
            wheel_status.all_on_track,
            progress,
            closest_waypoint,
            self.track.track_length(),
            Utc::now().timestamp_millis() as f64 / 1000.0,
            is_crashed,
            dist_closest_bot
        );

        if done {
            self.finish_episode(progress);
        }
    }

    fn finish_episode(&mut self, progress: f64) {
        self.episodes += 1;
        if self.change_start {
            self.start_ndist = (self.start_ndist + self.config.round_robin_advance_dist) % 1.0;
        }
        if self.config.alternate_driving_direction {
            self.reverse_dir = !self.reverse_dir;
        }
        self.stop_car();
        self.state = EpisodeState::Done;

        match self.config.job_type {
            JobType::Training => {
                if let Err(e) = self
                    .metrics_sink
                    .report_episode_reward(self.reward_in_episode)
                {
                    log_structured_error(
                        &format!("Unable to report episode reward: {e}"),
                        ErrorCategory::Environment,
                    );
                }
                let record = self.training_record(progress);
                self.metrics.metrics.push(record);
                self.upload_metrics();
                if self.is_training_done() {
                    self.cancel_job();
                }
            }
            JobType::Evaluation => {
                self.trials += 1;
                let record = self.evaluation_record(progress);
                self.metrics.metrics.push(record);
                self.upload_metrics();
            }
        }
    }

    fn stop_car(&mut self) {
        self.action = DecodedAction::default();
        self.transport.send_action(0.0, 0.0);
        self.reset_vehicle();
    }

    /// `(metric_time, start_time, elapsed)` in epoch milliseconds
    fn timing(&self) -> (i64, i64, i64) {
        let now = Utc::now().timestamp_millis();
        let start = self.episode_start.timestamp_millis();
        (now, start, now - start)
    }

    fn training_record(&self, progress: f64) -> MetricRecord {
        let (metric_time, start_time, elapsed_time_in_milliseconds) = self.timing();
        MetricRecord::Training {
            progress: progress as i64,
            reward_score: self.reward_in_episode.round() as i64,
            metric_time,
            start_time,
            elapsed_time_in_milliseconds,
            episode: self.episodes,
        }
    }

    fn evaluation_record(&self, progress: f64) -> MetricRecord {
        let (metric_time, start_time, elapsed_time_in_milliseconds) = self.timing();
        MetricRecord::Evaluation {
            completion_percentage: progress as i64,
            metric_time,
            start_time,
            elapsed_time_in_milliseconds,
            trial: self.trials,
        }
    }

    fn upload_metrics(&mut self) {
        if let Err(e) = self.metrics_sink.upload(&self.metrics) {
            log_structured_error(
                &format!("Unable to upload metrics: {e}"),
                ErrorCategory::Environment,
            );
        }
    }

    fn is_training_done(&mut self) -> bool {
        let episodes_reached = self.config.target_number_of_episodes > 0
            && self.config.target_number_of_episodes == self.episodes;
        let score_reached = self
            .config
            .target_reward_score
            .is_some_and(|target| target <= self.reward_in_episode);
        if episodes_reached || score_reached {
            self.is_simulation_done = true;
            self.state = EpisodeState::Terminated;
        }
        self.is_simulation_done
    }

    fn cancel_job(&mut self) {
        info!("Training targets reached after {} episodes", self.episodes);
        if let Err(e) = self.job_control.cancel(&self.config.job_id) {
            log_structured_error(
                &format!("Unable to cancel job {}: {e}", self.config.job_id),
                ErrorCategory::Environment,
            );
        }
    }
}
