//! Off-track and bot car crash detection

use ordered_float::OrderedFloat;

use super::bot_car::BotPose;
use super::track::TrackModel;
use super::types::{Point, CRASH_DISTANCE_THRESHOLD, NO_BOT_DISTANCE};

/// Which wheels touch the road polygon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelStatus {
    pub all_on_track: bool,
    pub any_on_track: bool,
}

impl WheelStatus {
    /// The car is off track once no wheel touches the road
    pub fn is_off_track(&self) -> bool {
        !self.any_on_track
    }
}

/// The bot car nearest the vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestBot {
    pub index: usize,
    pub distance: f64,
    pub pose: BotPose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionModel {
    crash_distance: f64,
}

impl Default for CollisionModel {
    fn default() -> Self {
        Self::new(CRASH_DISTANCE_THRESHOLD)
    }
}

impl CollisionModel {
    pub fn new(crash_distance: f64) -> Self {
        Self { crash_distance }
    }

    pub fn crash_distance(&self) -> f64 {
        self.crash_distance
    }

    pub fn wheel_status(&self, track: &TrackModel, wheels: &[Point]) -> WheelStatus {
        let on_track: Vec<bool> = wheels.iter().map(|w| track.contains(w)).collect();
        WheelStatus {
            all_on_track: on_track.iter().all(|&on| on),
            any_on_track: on_track.iter().any(|&on| on),
        }
    }

    /// Nearest bot by planar distance between chassis positions
    pub fn nearest_bot(&self, chassis: &Point, bots: &[BotPose]) -> Option<NearestBot> {
        bots.iter()
            .enumerate()
            .map(|(index, pose)| NearestBot {
                index,
                distance: chassis.distance(&pose.pose.position.planar()),
                pose: *pose,
            })
            .min_by_key(|nearest| OrderedFloat(nearest.distance))
    }

    pub fn is_crashed(&self, nearest: Option<&NearestBot>) -> bool {
        nearest.is_some_and(|bot| bot.distance < self.crash_distance)
    }

    /// Distance reported to the reward function
    pub fn reported_distance(nearest: Option<&NearestBot>) -> f64 {
        nearest.map_or(NO_BOT_DISTANCE, |bot| bot.distance)
    }
}
