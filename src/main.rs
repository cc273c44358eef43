use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use racetrack_env::simulation::{
    circular_waypoints, default_reward, log_structured_error, Action, EnvConfig, EpisodeState,
    ErrorCategory, FileMetricsSink, Frame, JobType, LoggingJobControl, NullTransport, Point,
    Polyline, Pose, Position, Quaternion, RacetrackEnv, TrackModel, Transport, TransportError,
    Waypoint, LAP_COMPLETE_BONUS, TRAINING_IMAGE_SIZE,
};

/// Seconds of simulated time per step, one camera frame at 15 fps
const STEP_SECONDS: f64 = 1.0 / 15.0;

const TRACK_RADIUS: f64 = 2.66;
const TRACK_WIDTH: f64 = 1.07;

#[derive(Parser)]
#[command(name = "racetrack_env")]
#[command(about = "Headless racetrack environment run")]
struct Cli {
    /// JSON environment configuration; a local training job when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of episodes to drive
    #[arg(long, default_value = "5")]
    episodes: u32,

    /// Step limit per episode
    #[arg(long, default_value = "500")]
    steps: u32,

    /// Seed for the random policy and stub frames
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Waypoints on the generated circular track
    #[arg(long, default_value = "36")]
    waypoints: usize,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        log_structured_error(&format!("{e:#}"), ErrorCategory::Environment);
        std::process::exit(1);
    }
}

/// Drives the car along the centerline at the commanded speed, drifting
/// sideways with the steering angle. Stands in for a simulator.
struct CenterlineDriver {
    waypoints: Vec<Waypoint>,
    center: Polyline,
    distance: f64,
    lateral: f64,
    speed: f64,
    steering_angle: f64,
}

impl CenterlineDriver {
    fn new(waypoints: Vec<Waypoint>, track: &TrackModel) -> Self {
        Self {
            waypoints,
            center: track.center_line().clone(),
            distance: 0.0,
            lateral: 0.0,
            speed: 0.0,
            steering_angle: 0.0,
        }
    }

    /// Centerline point and unit normal at the current distance
    fn frame_at(&self) -> (Point, Point, f64) {
        let here = self.center.interpolate(self.distance);
        let ahead = self
            .center
            .interpolate((self.distance + 0.05).rem_euclid(self.center.length()));
        let yaw = here.bearing_to(&ahead);
        let normal = Point::new(-yaw.sin(), yaw.cos());
        (here, normal, yaw)
    }

    fn chassis(&self) -> (Point, f64) {
        let (here, normal, yaw) = self.frame_at();
        (
            Point::new(
                here.x + normal.x * self.lateral,
                here.y + normal.y * self.lateral,
            ),
            yaw,
        )
    }
}

impl Transport for CenterlineDriver {
    fn waypoints(&mut self) -> Result<Vec<Waypoint>, TransportError> {
        Ok(self.waypoints.clone())
    }

    fn take_observation(&mut self) -> Result<Frame, TransportError> {
        let length = self.center.length();
        self.distance = (self.distance + self.speed * STEP_SECONDS).rem_euclid(length);
        self.lateral += self.steering_angle * self.speed * STEP_SECONDS;
        let (width, height) = TRAINING_IMAGE_SIZE;
        Ok(Frame {
            width,
            height,
            data: vec![0; (width * height * 3) as usize],
        })
    }

    fn vehicle_pose(&mut self) -> Result<Pose, TransportError> {
        let (chassis, yaw) = self.chassis();
        Ok(Pose::new(
            Position::new(chassis.x, chassis.y, 0.0),
            Quaternion::from_yaw(yaw),
        ))
    }

    fn wheel_positions(&mut self) -> Result<[Point; 4], TransportError> {
        let (chassis, yaw) = self.chassis();
        let pose = Pose::new(
            Position::new(chassis.x, chassis.y, 0.0),
            Quaternion::from_yaw(yaw),
        );
        Ok([
            pose.point_at([-0.08, 0.08, 0.0]),
            pose.point_at([0.08, 0.08, 0.0]),
            pose.point_at([-0.08, -0.08, 0.0]),
            pose.point_at([0.08, -0.08, 0.0]),
        ])
    }

    fn send_action(&mut self, steering_angle: f64, speed: f64) {
        self.steering_angle = steering_angle;
        self.speed = speed;
    }

    fn reset_vehicle(
        &mut self,
        start_ndist: f64,
        _next_index: usize,
    ) -> Result<(), TransportError> {
        self.distance = start_ndist * self.center.length();
        self.lateral = 0.0;
        self.speed = 0.0;
        self.steering_angle = 0.0;
        Ok(())
    }
}

fn load_config(cli: &Cli) -> Result<EnvConfig> {
    match &cli.config {
        Some(path) => Ok(EnvConfig::load(path)?),
        None => {
            let mut config = EnvConfig::new(
                "circular",
                JobType::Training,
                "local-run",
                std::env::temp_dir().join("racetrack_metrics.json"),
            );
            config.allow_servo_step_signals = true;
            Ok(config)
        }
    }
}

fn random_action(rng: &mut StdRng, action_count: Option<usize>) -> Action {
    match action_count {
        Some(count) => Action::Discrete(rng.random_range(0..count)),
        None => Action::Continuous {
            steering: rng.random_range(-0.3..=0.3),
            speed: rng.random_range(0.3..=1.0),
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let waypoints = circular_waypoints(cli.waypoints, TRACK_RADIUS, TRACK_WIDTH);
    let track = TrackModel::build(waypoints.clone()).context("Failed to build track")?;

    info!("Running racetrack environment in headless mode...");
    info!(
        "Track: {} waypoints, length {:.2}, loop {}",
        track.waypoints().len(),
        track.track_length(),
        track.is_loop()
    );
    for (i, lane) in track.lanes().iter().enumerate() {
        info!("Lane {}: length {:.2}", i, lane.length());
    }

    // Workers without a simulator only ever see stub frames
    let mut stub_env = RacetrackEnv::new(
        config.clone(),
        NullTransport::with_waypoints(cli.seed, waypoints.clone()),
        Box::new(default_reward),
        Box::new(FileMetricsSink::new(&config.metrics_path)),
        Box::new(LoggingJobControl),
    )?;
    if let Some(frame) = stub_env.reset()?.observation {
        info!("Stub observation: {}x{}", frame.width, frame.height);
    }

    let driver = CenterlineDriver::new(waypoints, &track);
    let mut env = RacetrackEnv::new(
        config.clone(),
        driver,
        Box::new(default_reward),
        Box::new(FileMetricsSink::new(&config.metrics_path)),
        Box::new(LoggingJobControl),
    )?;
    let mut clock = 0.0;
    let mut fleet = env.spawn_bot_fleet(clock);
    info!("Spawned {} bot cars", fleet.len());

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut total_steps = 0u64;
    let mut laps = 0u32;
    let mut episode_rewards = Vec::new();

    for _ in 0..cli.episodes {
        if env.is_simulation_done() {
            info!("Job targets reached, stopping early");
            break;
        }
        let first = env.reset()?;
        let mut last_reward = first.reward;
        if first.done {
            info!("Episode {} ended at the start line", env.episodes());
        }
        for _ in 0..cli.steps {
            if env.state() != EpisodeState::Running {
                break;
            }
            clock += STEP_SECONDS;
            fleet.advance_all(clock);
            let action = random_action(&mut rng, env.action_count());
            let outcome = env.step(action)?;
            total_steps += 1;
            last_reward = outcome.reward;
            if outcome.done {
                break;
            }
        }
        if last_reward == LAP_COMPLETE_BONUS {
            laps += 1;
        }
        info!(
            "Episode {} finished after {} steps: progress {:.2}, reward {:.4}",
            env.episodes(),
            env.steps(),
            env.progress(),
            env.reward_in_episode()
        );
        episode_rewards.push(env.reward_in_episode());
    }

    for pose in fleet.advance_all(clock) {
        info!(
            "Bot {:?}: lane {} at {:.2}",
            pose.id.0 .0, pose.lane, pose.distance
        );
    }

    let mean_reward = if episode_rewards.is_empty() {
        0.0
    } else {
        episode_rewards.iter().sum::<f64>() / episode_rewards.len() as f64
    };
    info!("=== RUN COMPLETE ===");
    info!("Simulated time: {:.2}s", clock);
    info!("Episodes: {}", episode_rewards.len());
    info!("Total steps: {}", total_steps);
    info!("Laps completed: {}", laps);
    info!("Mean episode reward: {:.4}", mean_reward);
    info!("Metrics file: {}", config.metrics_path.display());
    Ok(())
}
