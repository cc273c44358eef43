//! Bot car and collision model tests

use approx::assert_relative_eq;
use racetrack_env::simulation::{
    circular_waypoints, BotCarConfig, BotFleet, BotId, BotPose, CollisionModel, Point, Pose,
    Position, Quaternion, SimId, TrackModel, CRASH_DISTANCE_THRESHOLD, NO_BOT_DISTANCE,
};

fn track() -> TrackModel {
    TrackModel::build(circular_waypoints(36, 2.66, 1.07)).unwrap()
}

fn bot(start_dist: f64, speed: f64, change_lane_freq_sec: f64) -> BotCarConfig {
    BotCarConfig {
        start_dist,
        speed,
        change_lane_freq_sec,
    }
}

fn bot_at(id: usize, x: f64, y: f64) -> BotPose {
    BotPose {
        id: BotId(SimId(id)),
        pose: Pose::new(Position::new(x, y, 0.0), Quaternion::IDENTITY),
        lane: 0,
        distance: 0.0,
    }
}

#[test]
fn test_default_bot_configs() {
    let configs = BotCarConfig::defaults();
    assert_eq!(configs.len(), 3);
    assert_relative_eq!(configs[1].start_dist, 5.6);
    assert!(configs.iter().all(|c| c.change_lane_freq_sec == 0.0));
}

#[test]
fn test_fleet_spawns_on_first_lane() {
    let track = track();
    let fleet = BotFleet::new(&BotCarConfig::defaults(), track.lanes(), 0.0);

    assert_eq!(fleet.len(), 3);
    assert_eq!(fleet.cars()[0].id(), BotId(SimId(1)));
    for snapshot in fleet.snapshots() {
        let pose = snapshot.read();
        assert_eq!(pose.lane, 0);
        let radius = pose.pose.position.planar().distance(&Point::default());
        assert_relative_eq!(radius, 2.3925, epsilon = 0.01);
    }
}

#[test]
fn test_no_lanes_no_bots() {
    let fleet = BotFleet::new(&BotCarConfig::defaults(), Vec::new(), 0.0);
    assert!(fleet.is_empty());
}

#[test]
fn test_bot_moves_at_constant_speed() {
    let track = track();
    let mut fleet = BotFleet::new(&[bot(1.0, 0.2, 0.0)], track.lanes(), 0.0);

    let poses = fleet.advance_all(10.0);
    assert_relative_eq!(poses[0].distance, 3.0, epsilon = 1e-9);
    assert_eq!(fleet.snapshots()[0].read(), poses[0]);
}

#[test]
fn test_bot_wraps_around_the_lane() {
    let track = track();
    let lane_length = track.lanes()[0].length();
    let mut fleet = BotFleet::new(&[bot(lane_length - 0.1, 1.0, 0.0)], track.lanes(), 0.0);

    let pose = fleet.advance_all(1.0)[0];
    assert_relative_eq!(pose.distance, 0.9, epsilon = 1e-9);
    assert!(pose.distance < lane_length);
}

#[test]
fn test_bot_replay_is_deterministic() {
    let track = track();
    let configs = [bot(0.0, 0.3, 1.5), bot(4.0, 0.5, 0.0)];
    let mut first = BotFleet::new(&configs, track.lanes(), 0.0);
    let mut second = BotFleet::new(&configs, track.lanes(), 0.0);

    for tick in 1..=120 {
        let now = tick as f64 / 15.0;
        assert_eq!(first.advance_all(now), second.advance_all(now));
    }
}

#[test]
fn test_bot_heads_towards_next_waypoint() {
    let track = track();
    let fleet = BotFleet::new(&[bot(0.0, 0.0, 0.0)], track.lanes(), 0.0);
    let pose = fleet.snapshots()[0].read();

    // First chord of a 36-gon runs at 95 degrees
    assert_relative_eq!(pose.pose.heading().to_degrees(), 95.0, epsilon = 1e-6);
}

#[test]
fn test_bot_changes_lane_on_schedule() {
    let track = track();
    let lanes = track.lanes();
    let ratio = lanes[1].length() / lanes[0].length();
    let mut fleet = BotFleet::new(&[bot(0.0, 0.2, 1.0)], lanes, 0.0);

    let pose = fleet.advance_all(0.5)[0];
    assert_eq!(pose.lane, 0);

    // Re-projected onto the outer lane at the same angle around the track
    let pose = fleet.advance_all(1.5)[0];
    assert_eq!(pose.lane, 1);
    assert_eq!(fleet.cars()[0].lane(), 1);
    assert_relative_eq!(pose.distance, 0.3 * ratio, epsilon = 0.01);

    // Re-anchored: speed applies from the lane change onwards
    let pose = fleet.advance_all(2.0)[0];
    assert_eq!(pose.lane, 1);
    assert_relative_eq!(pose.distance, 0.3 * ratio + 0.1, epsilon = 0.01);

    let pose = fleet.advance_all(3.0)[0];
    assert_eq!(pose.lane, 0);
}

#[test]
fn test_nearest_bot() {
    let model = CollisionModel::default();
    let bots = [bot_at(1, 3.0, 0.0), bot_at(2, 0.5, 0.0), bot_at(3, -2.0, 0.0)];

    let nearest = model.nearest_bot(&Point::new(0.0, 0.0), &bots).unwrap();
    assert_eq!(nearest.index, 1);
    assert_eq!(nearest.pose.id, BotId(SimId(2)));
    assert_relative_eq!(nearest.distance, 0.5);
    assert!(!model.is_crashed(Some(&nearest)));
    assert_relative_eq!(CollisionModel::reported_distance(Some(&nearest)), 0.5);
}

#[test]
fn test_crash_below_threshold() {
    let model = CollisionModel::default();
    assert_relative_eq!(model.crash_distance(), CRASH_DISTANCE_THRESHOLD);

    let close = model
        .nearest_bot(&Point::new(0.0, 0.0), &[bot_at(1, 0.29, 0.0)])
        .unwrap();
    assert!(model.is_crashed(Some(&close)));

    let at_threshold = model
        .nearest_bot(&Point::new(0.0, 0.0), &[bot_at(1, 0.0, 0.30)])
        .unwrap();
    assert!(!model.is_crashed(Some(&at_threshold)));
}

#[test]
fn test_no_bots() {
    let model = CollisionModel::new(0.5);
    let nearest = model.nearest_bot(&Point::new(1.0, 1.0), &[]);
    assert!(nearest.is_none());
    assert!(!model.is_crashed(nearest.as_ref()));
    assert_eq!(CollisionModel::reported_distance(nearest.as_ref()), NO_BOT_DISTANCE);
}

#[test]
fn test_wheel_status() {
    let track = track();
    let model = CollisionModel::default();

    let on = [
        Point::new(2.6, 0.1),
        Point::new(2.7, 0.1),
        Point::new(2.6, -0.1),
        Point::new(2.7, -0.1),
    ];
    let status = model.wheel_status(&track, &on);
    assert!(status.all_on_track && status.any_on_track);

    let partly = [
        Point::new(3.1, 0.1),
        Point::new(3.3, 0.1),
        Point::new(3.1, -0.1),
        Point::new(3.3, -0.1),
    ];
    let status = model.wheel_status(&track, &partly);
    assert!(!status.all_on_track);
    assert!(status.any_on_track);
    assert!(!status.is_off_track());

    let off = [Point::new(0.0, 0.0); 4];
    assert!(model.wheel_status(&track, &off).is_off_track());
}
