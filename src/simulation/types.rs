//! Core types for the racetrack environment
//!
//! Plain value types shared by the geometry, bot cars and the episode
//! state machine. None of them know about the simulator.

use serde::{Deserialize, Serialize};

/// A unique identifier for simulation entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimId(pub usize);

/// A wrapper type for bot car IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BotId(pub SimId);

/// A point on the track plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        self.lerp(other, 0.5)
    }

    /// Bearing from this point to another, radians counter-clockwise from +x
    pub fn bearing_to(&self, other: &Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A 3D position reported by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Drop the height component
    pub fn planar(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn offset(&self, delta: [f64; 3]) -> Position {
        Position::new(self.x + delta[0], self.y + delta[1], self.z + delta[2])
    }
}

/// Unit quaternion in (x, y, z, w) order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation about +z by `yaw` radians
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw * 0.5;
        Self::new(0.0, 0.0, half.sin(), half.cos())
    }

    /// Rotation about +z, the first angle of a `zyx` Euler decomposition
    pub fn yaw(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }

    /// Rotate a body-frame vector into the world frame
    pub fn rotate(&self, v: [f64; 3]) -> [f64; 3] {
        let q = [self.x, self.y, self.z];
        let t = cross(q, v).map(|c| 2.0 * c);
        let qt = cross(q, t);
        [
            v[0] + self.w * t[0] + qt[0],
            v[1] + self.w * t[1] + qt[1],
            v[2] + self.w * t[2] + qt[2],
        ]
    }
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Position plus orientation of a body
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Position,
    pub orientation: Quaternion,
}

impl Pose {
    pub fn new(position: Position, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Point at a body-frame offset, projected onto the track plane
    pub fn point_at(&self, body_offset: [f64; 3]) -> Point {
        self.position
            .offset(self.orientation.rotate(body_offset))
            .planar()
    }

    pub fn heading(&self) -> f64 {
        self.orientation.yaw()
    }
}

/// One camera frame handed back to the learner as the observation.
/// Decoding and resizing happen outside this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Width and height of training observations
pub const TRAINING_IMAGE_SIZE: (u32, u32) = (160, 120);

/// Offset of the front of the car from the chassis origin, body frame
pub const RELATIVE_POSITION_OF_FRONT_OF_CAR: [f64; 3] = [0.14, 0.0, 0.0];

/// Normalized track distance the start line moves after each episode
pub const ROUND_ROBIN_ADVANCE_DIST: f64 = 0.05;

/// Reward for a crashed, off-track or stuck car. Kept above zero for
/// consumers that divide by the reward.
pub const CRASHED: f64 = 1e-8;

/// Terminal reward for completing a lap
pub const LAP_COMPLETE_BONUS: f64 = 1e3;

/// Distance to a bot car below which the car is crashed
pub const CRASH_DISTANCE_THRESHOLD: f64 = 0.30;

/// Steps between stuck checks. Matches the camera frame rate that paces steps.
pub const NUM_STEPS_TO_CHECK_STUCK: u64 = 15;

/// Movement at or below this distance counts as standing still
pub const STUCK_EPSILON: f64 = 1e-4;

/// Radius of the car wheels in meters
pub const WHEEL_RADIUS: f64 = 0.1;

/// Reported bot distance when there are no bot cars
pub const NO_BOT_DISTANCE: f64 = 1e3;
