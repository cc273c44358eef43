//! Access to the simulator
//!
//! The episode state machine only talks to a [`Transport`]. A
//! [`SimulatorTransport`] forwards to a live [`Simulator`] and paces
//! observations through a [`Mailbox`] fed by the camera callback. A
//! [`NullTransport`] is not attached to anything and hands out
//! deterministic stub frames.

use anyhow::Result;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::TransportError;
use super::mailbox::Mailbox;
use super::track::{circular_waypoints, waypoints_from_flat, Waypoint};
use super::types::{Frame, Point, Pose, TRAINING_IMAGE_SIZE, WHEEL_RADIUS};

/// Model name of the learning vehicle
pub const RACECAR_MODEL: &str = "racecar";

/// Wheel contact links, in the order wheel positions are reported
pub const WHEEL_LINKS: [&str; 4] = [
    "racecar::left_rear_wheel",
    "racecar::left_front_wheel",
    "racecar::right_rear_wheel",
    "racecar::right_front_wheel",
];

/// One topic per wheel
pub const VELOCITY_TOPICS: [&str; 4] = [
    "/racecar/left_rear_wheel_velocity_controller/command",
    "/racecar/right_rear_wheel_velocity_controller/command",
    "/racecar/left_front_wheel_velocity_controller/command",
    "/racecar/right_front_wheel_velocity_controller/command",
];

pub const STEERING_TOPICS: [&str; 2] = [
    "/racecar/left_steering_hinge_position_controller/command",
    "/racecar/right_steering_hinge_position_controller/command",
];

/// Joints whose forces are cleared before the car is repositioned
pub const EFFORT_JOINTS: [&str; 6] = [
    "/racecar/left_rear_wheel_joint",
    "/racecar/right_rear_wheel_joint",
    "/racecar/left_front_wheel_joint",
    "/racecar/right_front_wheel_joint",
    "/racecar/left_steering_hinge_joint",
    "/racecar/right_steering_hinge_joint",
];

/// Flat row-major waypoint array as served by the simulator
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointArray {
    pub values: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
}

/// Services exposed by a running simulator
pub trait Simulator: Send {
    fn waypoints(&mut self) -> Result<WaypointArray>;

    fn model_pose(&mut self, model: &str) -> Result<Pose>;

    fn link_pose(&mut self, link: &str) -> Result<Pose>;

    /// Fire-and-forget command publication
    fn publish(&mut self, topic: &str, value: f64);

    fn clear_joint_forces(&mut self, joint: &str) -> Result<()>;

    /// Put the car at `start_ndist` facing waypoint `next_index`
    fn reset_car(&mut self, start_ndist: f64, next_index: usize) -> Result<()>;
}

/// What the episode state machine needs from the world
pub trait Transport {
    fn waypoints(&mut self) -> Result<Vec<Waypoint>, TransportError>;

    /// Next observation, blocking until one is available
    fn take_observation(&mut self) -> Result<Frame, TransportError>;

    fn vehicle_pose(&mut self) -> Result<Pose, TransportError>;

    /// Wheel contact points in [`WHEEL_LINKS`] order
    fn wheel_positions(&mut self) -> Result<[Point; 4], TransportError>;

    /// Steering in radians, speed in track units per second
    fn send_action(&mut self, steering_angle: f64, speed: f64);

    /// Reposition the car at the start line
    fn reset_vehicle(&mut self, start_ndist: f64, next_index: usize) -> Result<(), TransportError>;

    /// Transports without a simulator return an observation here and the
    /// state machine skips inference entirely
    fn detached_observation(&mut self) -> Option<Frame> {
        None
    }
}

/// Transport backed by a live simulator
pub struct SimulatorTransport<S> {
    simulator: S,
    frames: Mailbox<Frame>,
}

impl<S: Simulator> SimulatorTransport<S> {
    pub fn new(simulator: S) -> Self {
        Self {
            simulator,
            frames: Mailbox::new(),
        }
    }

    /// Producer handle for the camera callback
    pub fn frame_sink(&self) -> Mailbox<Frame> {
        self.frames.clone()
    }

    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.simulator
    }
}

impl<S: Simulator> Transport for SimulatorTransport<S> {
    fn waypoints(&mut self) -> Result<Vec<Waypoint>, TransportError> {
        let array = self
            .simulator
            .waypoints()
            .map_err(TransportError::Waypoints)?;
        Ok(waypoints_from_flat(&array.values, array.rows, array.cols)?)
    }

    fn take_observation(&mut self) -> Result<Frame, TransportError> {
        Ok(self.frames.take())
    }

    fn vehicle_pose(&mut self) -> Result<Pose, TransportError> {
        self.simulator
            .model_pose(RACECAR_MODEL)
            .map_err(|source| TransportError::Pose {
                body: RACECAR_MODEL.to_string(),
                source,
            })
    }

    fn wheel_positions(&mut self) -> Result<[Point; 4], TransportError> {
        let mut wheels = [Point::default(); 4];
        for (slot, link) in wheels.iter_mut().zip(WHEEL_LINKS) {
            let pose = self
                .simulator
                .link_pose(link)
                .map_err(|source| TransportError::Pose {
                    body: link.to_string(),
                    source,
                })?;
            *slot = pose.position.planar();
        }
        Ok(wheels)
    }

    fn send_action(&mut self, steering_angle: f64, speed: f64) {
        let wheel_velocity = speed / WHEEL_RADIUS;
        for topic in VELOCITY_TOPICS {
            self.simulator.publish(topic, wheel_velocity);
        }
        for topic in STEERING_TOPICS {
            self.simulator.publish(topic, steering_angle);
        }
    }

    fn reset_vehicle(&mut self, start_ndist: f64, next_index: usize) -> Result<(), TransportError> {
        for joint in EFFORT_JOINTS {
            self.simulator
                .clear_joint_forces(joint)
                .map_err(TransportError::Reset)?;
        }
        self.simulator
            .reset_car(start_ndist, next_index)
            .map_err(TransportError::Reset)?;
        // The first frame after a reset may predate it
        let _stale = self.frames.take();
        debug!("Car reset to ndist {:.4} facing waypoint {}", start_ndist, next_index);
        Ok(())
    }
}

/// Transport for workers with no simulator attached
pub struct NullTransport {
    rng: StdRng,
    waypoints: Vec<Waypoint>,
}

impl NullTransport {
    /// Stub over the default circular track
    pub fn new(seed: u64) -> Self {
        Self::with_waypoints(seed, circular_waypoints(36, 2.66, 1.07))
    }

    pub fn with_waypoints(seed: u64, waypoints: Vec<Waypoint>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            waypoints,
        }
    }

    fn stub_frame(&mut self) -> Frame {
        let (width, height) = TRAINING_IMAGE_SIZE;
        let mut data = vec![0u8; (width * height * 3) as usize];
        self.rng.fill(&mut data[..]);
        Frame {
            width,
            height,
            data,
        }
    }
}

impl Transport for NullTransport {
    fn waypoints(&mut self) -> Result<Vec<Waypoint>, TransportError> {
        Ok(self.waypoints.clone())
    }

    fn take_observation(&mut self) -> Result<Frame, TransportError> {
        Ok(self.stub_frame())
    }

    fn vehicle_pose(&mut self) -> Result<Pose, TransportError> {
        Ok(Pose::default())
    }

    fn wheel_positions(&mut self) -> Result<[Point; 4], TransportError> {
        Ok([Point::default(); 4])
    }

    fn send_action(&mut self, _steering_angle: f64, _speed: f64) {}

    fn reset_vehicle(
        &mut self,
        _start_ndist: f64,
        _next_index: usize,
    ) -> Result<(), TransportError> {
        debug!("Vehicle reset requested with no simulator attached");
        Ok(())
    }

    fn detached_observation(&mut self) -> Option<Frame> {
        Some(self.stub_frame())
    }
}
