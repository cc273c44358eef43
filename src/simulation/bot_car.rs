//! Scripted bot cars driving along the track lanes
//!
//! A bot's pose is a pure function of simulated time since its last anchor,
//! so replaying the same clock ticks always yields the same poses. Each bot
//! is owned by whoever drives the clock; readers get a [`BotSnapshot`] that
//! always holds a whole pose.

use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::track::LanePath;
use super::types::{BotId, Pose, Position, Quaternion, SimId};

/// Startup parameters of one bot car
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BotCarConfig {
    /// Distance along the first lane at spawn
    pub start_dist: f64,
    /// Track units per simulated second
    pub speed: f64,
    /// Seconds between lane changes, 0 disables them
    #[serde(default)]
    pub change_lane_freq_sec: f64,
}

impl BotCarConfig {
    /// Three evenly spaced bots on the default track lane length
    pub fn defaults() -> Vec<BotCarConfig> {
        [0.0, 5.6, 11.2]
            .into_iter()
            .map(|start_dist| BotCarConfig {
                start_dist,
                speed: 0.2,
                change_lane_freq_sec: 0.0,
            })
            .collect()
    }
}

/// Published state of a bot car
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotPose {
    pub id: BotId,
    pub pose: Pose,
    /// Index into the lane rotation
    pub lane: usize,
    /// Distance along the current lane
    pub distance: f64,
}

/// Read side of a bot car
#[derive(Debug, Clone)]
pub struct BotSnapshot {
    pose: Arc<RwLock<BotPose>>,
}

impl BotSnapshot {
    pub fn read(&self) -> BotPose {
        *self.pose.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A bot car. Only its owner advances it.
#[derive(Debug)]
pub struct BotCar {
    id: BotId,
    lanes: Arc<[LanePath]>,
    lane: usize,
    speed: f64,
    change_lane_freq_sec: f64,
    initial_dist: f64,
    initial_time: f64,
    next_change_lane_time: f64,
    published: Arc<RwLock<BotPose>>,
}

impl BotCar {
    /// Place a bot on the first lane at `config.start_dist`, anchored at
    /// simulated time `now`. Returns `None` when there are no lanes.
    pub fn new(id: BotId, config: &BotCarConfig, lanes: Arc<[LanePath]>, now: f64) -> Option<Self> {
        let first = lanes.first()?;
        info!(
            "Spawned bot car {:?} on lane of length {:.2}",
            id.0,
            first.length()
        );
        let mut car = Self {
            id,
            lanes,
            lane: 0,
            speed: config.speed,
            change_lane_freq_sec: config.change_lane_freq_sec,
            initial_dist: config.start_dist,
            initial_time: now,
            next_change_lane_time: now,
            published: Arc::new(RwLock::new(BotPose {
                id,
                pose: Pose::default(),
                lane: 0,
                distance: 0.0,
            })),
        };
        car.reanchor(config.start_dist, now);
        Some(car)
    }

    pub fn id(&self) -> BotId {
        self.id
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn snapshot(&self) -> BotSnapshot {
        BotSnapshot {
            pose: Arc::clone(&self.published),
        }
    }

    fn current_lane(&self) -> &LanePath {
        &self.lanes[self.lane]
    }

    fn reanchor(&mut self, start_dist: f64, now: f64) -> BotPose {
        self.initial_dist = start_dist;
        self.initial_time = now;
        self.next_change_lane_time = now + self.change_lane_freq_sec;
        self.place(start_dist)
    }

    /// Advance to simulated time `now` and publish the new pose
    pub fn advance(&mut self, now: f64) -> BotPose {
        let lane_length = self.current_lane().length();
        let traveled = (now - self.initial_time) * self.speed;
        let distance = if lane_length > 0.0 {
            (self.initial_dist + traveled).rem_euclid(lane_length)
        } else {
            0.0
        };

        if self.change_lane_freq_sec > 0.0 && now > self.next_change_lane_time {
            // Re-project onto the next lane so the car does not jump along the track
            let point = self.current_lane().line.interpolate(distance);
            self.lane = (self.lane + 1) % self.lanes.len();
            let projected = self.current_lane().line.project(&point);
            debug!("Bot car {:?} changed to lane {}", self.id.0, self.lane);
            self.reanchor(projected, now)
        } else {
            self.place(distance)
        }
    }

    fn place(&mut self, distance: f64) -> BotPose {
        let lane = self.current_lane();
        // Bots always drive the lane in its stored direction
        let bracket = lane.bracket(distance, false);
        let position = lane.line.interpolate(distance);
        let yaw = lane
            .line
            .coords()
            .get(bracket.next)
            .map_or(0.0, |next| position.bearing_to(next));
        let pose = BotPose {
            id: self.id,
            pose: Pose::new(
                Position::new(position.x, position.y, 0.0),
                Quaternion::from_yaw(yaw),
            ),
            lane: self.lane,
            distance,
        };
        *self.published.write().unwrap_or_else(PoisonError::into_inner) = pose;
        pose
    }
}

/// All bot cars, advanced together by one clock
#[derive(Debug, Default)]
pub struct BotFleet {
    cars: Vec<BotCar>,
}

impl BotFleet {
    pub fn new(configs: &[BotCarConfig], lanes: Vec<LanePath>, now: f64) -> Self {
        let lanes: Arc<[LanePath]> = lanes.into();
        let cars = configs
            .iter()
            .enumerate()
            .filter_map(|(i, config)| {
                BotCar::new(BotId(SimId(i + 1)), config, Arc::clone(&lanes), now)
            })
            .collect();
        Self { cars }
    }

    pub fn cars(&self) -> &[BotCar] {
        &self.cars
    }

    pub fn len(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    pub fn snapshots(&self) -> Vec<BotSnapshot> {
        self.cars.iter().map(BotCar::snapshot).collect()
    }

    /// Clock tick handler
    pub fn advance_all(&mut self, now: f64) -> Vec<BotPose> {
        self.cars.iter_mut().map(|car| car.advance(now)).collect()
    }
}
