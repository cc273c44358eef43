//! Simulator transport tests
//!
//! A scripted simulator reports a car on a 36-waypoint circle while a
//! camera thread keeps the frame mailbox fed, the way a live simulator's
//! camera callback does.

use std::f64::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, bail};
use racetrack_env::simulation::{
    circular_waypoints, Action, EnvConfig, EnvError, Frame, JobType, LoggingJobControl, Mailbox,
    MetricsDocument, MetricsSink, Pose, Position, Quaternion, RacetrackEnv, RewardParams,
    Simulator, SimulatorTransport, TrackError, Transport, TransportError, WaypointArray,
    EFFORT_JOINTS, LAP_COMPLETE_BONUS, RACECAR_MODEL, STEERING_TOPICS, VELOCITY_TOPICS,
    WHEEL_LINKS,
};

const RADIUS: f64 = 2.66;
const WHEEL_OFFSETS: [[f64; 3]; 4] = [
    [-0.08, 0.08, 0.0],
    [0.08, 0.08, 0.0],
    [-0.08, -0.08, 0.0],
    [0.08, -0.08, 0.0],
];

struct CircleSimulator {
    waypoints: WaypointArray,
    degrees: f64,
    fail_waypoints: bool,
    fail_links: bool,
    published: Vec<(String, f64)>,
    cleared: Vec<String>,
    resets: Vec<(f64, usize)>,
}

impl CircleSimulator {
    fn new() -> Self {
        let waypoints = circular_waypoints(36, RADIUS, 1.07);
        let values = waypoints
            .iter()
            .flat_map(|w| [w.center.x, w.center.y, w.inner.x, w.inner.y, w.outer.x, w.outer.y])
            .collect();
        Self {
            waypoints: WaypointArray {
                values,
                rows: waypoints.len(),
                cols: 6,
            },
            degrees: 0.0,
            fail_waypoints: false,
            fail_links: false,
            published: Vec::new(),
            cleared: Vec::new(),
            resets: Vec::new(),
        }
    }

    fn chassis(&self) -> Pose {
        let angle = self.degrees.to_radians();
        Pose::new(
            Position::new(RADIUS * angle.cos(), RADIUS * angle.sin(), 0.0),
            Quaternion::from_yaw(angle + FRAC_PI_2),
        )
    }

    fn published_to(&self, topic: &str) -> Vec<f64> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl Simulator for CircleSimulator {
    fn waypoints(&mut self) -> anyhow::Result<WaypointArray> {
        if self.fail_waypoints {
            bail!("waypoint service unavailable");
        }
        Ok(self.waypoints.clone())
    }

    fn model_pose(&mut self, model: &str) -> anyhow::Result<Pose> {
        if model != RACECAR_MODEL {
            bail!("unknown model {model}");
        }
        Ok(self.chassis())
    }

    fn link_pose(&mut self, link: &str) -> anyhow::Result<Pose> {
        if self.fail_links {
            bail!("link state service unavailable");
        }
        let index = WHEEL_LINKS
            .iter()
            .position(|l| *l == link)
            .ok_or_else(|| anyhow!("unknown link {link}"))?;
        let chassis = self.chassis();
        let wheel = chassis.point_at(WHEEL_OFFSETS[index]);
        Ok(Pose::new(
            Position::new(wheel.x, wheel.y, 0.0),
            chassis.orientation,
        ))
    }

    fn publish(&mut self, topic: &str, value: f64) {
        self.published.push((topic.to_string(), value));
    }

    fn clear_joint_forces(&mut self, joint: &str) -> anyhow::Result<()> {
        self.cleared.push(joint.to_string());
        Ok(())
    }

    fn reset_car(&mut self, start_ndist: f64, next_index: usize) -> anyhow::Result<()> {
        self.resets.push((start_ndist, next_index));
        self.degrees = start_ndist * 360.0;
        Ok(())
    }
}

/// Publishes frames until dropped
struct Camera {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Camera {
    fn start(sink: Mailbox<Frame>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let mut sequence = 0u8;
            while !running.load(Ordering::SeqCst) {
                sink.put_latest(Frame {
                    width: 1,
                    height: 1,
                    data: vec![sequence; 3],
                });
                sequence = sequence.wrapping_add(1);
                thread::sleep(Duration::from_millis(1));
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

struct NoMetrics;

impl MetricsSink for NoMetrics {
    fn upload(&mut self, _document: &MetricsDocument) -> anyhow::Result<()> {
        Ok(())
    }
}

type Seen = Arc<Mutex<Vec<RewardParams>>>;

fn build_env(
    simulator: CircleSimulator,
) -> Result<(RacetrackEnv<SimulatorTransport<CircleSimulator>>, Camera, Seen), EnvError> {
    let transport = SimulatorTransport::new(simulator);
    let camera = Camera::start(transport.frame_sink());
    let seen: Seen = Arc::default();
    let log = Arc::clone(&seen);
    let reward = move |params: &RewardParams| -> anyhow::Result<f64> {
        log.lock().unwrap().push(params.clone());
        Ok(1.0)
    };
    let mut config = EnvConfig::new("circle", JobType::Training, "job-sim", "unused.json");
    config.bot_cars = Vec::new();
    config.allow_servo_step_signals = true;
    let env = RacetrackEnv::new(
        config,
        transport,
        Box::new(reward),
        Box::new(NoMetrics),
        Box::new(LoggingJobControl),
    )?;
    Ok((env, camera, seen))
}

#[test]
fn test_lap_on_36_waypoint_track() {
    let (mut env, _camera, seen) = build_env(CircleSimulator::new()).unwrap();
    assert_eq!(env.track().waypoints().len(), 37);
    assert!(env.track().is_loop());

    assert!(env.reset().unwrap().observation.is_some());
    let action = Action::Continuous {
        steering: 0.1,
        speed: 0.5,
    };

    for k in 1..36 {
        env.transport_mut().simulator_mut().degrees = k as f64 * 10.0;
        let outcome = env.step(action).unwrap();
        assert!(!outcome.done, "episode ended early at step {k}");
        assert!(outcome.observation.is_some());
    }
    env.transport_mut().simulator_mut().degrees = 360.0;
    let outcome = env.step(action).unwrap();
    assert!(outcome.done);
    assert_eq!(outcome.reward, LAP_COMPLETE_BONUS);
    assert_eq!(env.episodes(), 1);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[1].closest_waypoints, [1, 2]);
    assert_eq!(seen[35].closest_waypoints, [35, 36]);
}

#[test]
fn test_actions_reach_simulator_topics() {
    let (mut env, _camera, _seen) = build_env(CircleSimulator::new()).unwrap();
    env.reset().unwrap();
    env.transport_mut().simulator_mut().degrees = 5.0;
    env.step(Action::Continuous {
        steering: 0.2,
        speed: 0.5,
    })
    .unwrap();

    let simulator = env.transport().simulator();
    for topic in VELOCITY_TOPICS {
        // Wheel angular velocity for a 0.1 m wheel
        assert_eq!(simulator.published_to(topic).last(), Some(&5.0));
    }
    for topic in STEERING_TOPICS {
        assert_eq!(simulator.published_to(topic), vec![0.0, 0.2]);
    }
}

#[test]
fn test_reset_clears_forces_and_repositions() {
    let (mut env, _camera, _seen) = build_env(CircleSimulator::new()).unwrap();
    env.reset().unwrap();

    let simulator = env.transport().simulator();
    assert_eq!(simulator.cleared, EFFORT_JOINTS.map(String::from).to_vec());
    assert_eq!(simulator.resets, vec![(0.0, 1)]);
}

#[test]
fn test_wheel_failure_uses_last_known_wheels() {
    let (mut env, _camera, seen) = build_env(CircleSimulator::new()).unwrap();
    env.reset().unwrap();

    let simulator = env.transport_mut().simulator_mut();
    simulator.fail_links = true;
    simulator.degrees = 10.0;
    let outcome = env.step(Action::Continuous {
        steering: 0.0,
        speed: 0.5,
    })
    .unwrap();

    assert!(!outcome.done);
    assert!(seen.lock().unwrap()[1].all_wheels_on_track);
    assert!(matches!(
        env.transport_mut().wheel_positions(),
        Err(TransportError::Pose { .. })
    ));
}

#[test]
fn test_waypoint_failure_is_fatal() {
    let mut simulator = CircleSimulator::new();
    simulator.fail_waypoints = true;
    let result = build_env(simulator);
    assert!(matches!(
        result,
        Err(EnvError::Transport(TransportError::Waypoints(_)))
    ));
}

#[test]
fn test_bad_waypoint_shape_is_fatal() {
    let mut simulator = CircleSimulator::new();
    simulator.waypoints.cols = 5;
    let result = build_env(simulator);
    assert!(matches!(
        result,
        Err(EnvError::Transport(TransportError::Track(TrackError::Columns(5))))
    ));
}

#[test]
fn test_mailbox_keeps_first_pending_item() {
    let mailbox = Mailbox::new();
    assert!(mailbox.put_latest(1));
    assert!(!mailbox.put_latest(2), "full slot drops the new item");
    assert!(mailbox.is_pending());
    assert_eq!(mailbox.take(), 1);
    assert!(!mailbox.is_pending());
    assert_eq!(mailbox.try_take(), None);
}

#[test]
fn test_mailbox_take_waits_for_producer() {
    let mailbox: Mailbox<u32> = Mailbox::new();
    let producer = mailbox.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        producer.put_latest(7)
    });
    assert_eq!(mailbox.take(), 7);
    assert!(handle.join().unwrap());
}

#[test]
fn test_mailbox_drain() {
    let mailbox = Mailbox::new();
    assert!(!mailbox.drain());
    mailbox.put_latest("frame");
    assert!(mailbox.drain());
    assert!(mailbox.put_latest("fresh"));
}
