//! Lap progress accounting tests

use approx::assert_relative_eq;
use racetrack_env::simulation::{lap_progress, resolve_progress, ProgressTracker};

#[test]
fn test_lap_progress_forward() {
    assert_relative_eq!(lap_progress(0.0, 0.3, false), 30.0);
    assert_relative_eq!(lap_progress(0.5, 0.75, false), 25.0);
    // Past the end of the table the lap continues from 0
    assert_relative_eq!(lap_progress(0.9, 0.1, false), 20.0, epsilon = 1e-9);
}

#[test]
fn test_lap_progress_reverse() {
    assert_relative_eq!(lap_progress(0.5, 0.25, true), 25.0);
    assert_relative_eq!(lap_progress(0.1, 0.9, true), 20.0, epsilon = 1e-9);
}

#[test]
fn test_resolve_keeps_forward_motion() {
    assert_relative_eq!(resolve_progress(42.0, 40.0), 42.0);
    assert_relative_eq!(resolve_progress(40.0, 40.0), 40.0);
}

#[test]
fn test_resolve_small_drop_holds() {
    // Backing up a little keeps the previous progress
    assert_relative_eq!(resolve_progress(38.0, 40.0), 40.0);
}

#[test]
fn test_resolve_wrap_saturates_at_lap() {
    // Crossing the start line from 99 to 1 completes the lap
    assert_relative_eq!(resolve_progress(1.0, 99.0), 100.0);
}

#[test]
fn test_tracker_never_decreases() {
    let mut tracker = ProgressTracker::new();
    let samples = [0.05, 0.2, 0.18, 0.4, 0.39, 0.6];
    let mut last = 0.0;
    for ndist in samples {
        let progress = tracker.update(0.0, ndist, false);
        assert!(progress >= last, "{progress} < {last}");
        last = progress;
    }
    assert_relative_eq!(tracker.progress(), 60.0, epsilon = 1e-9);
}

#[test]
fn test_tracker_completes_lap_from_offset_start() {
    let mut tracker = ProgressTracker::new();
    let start = 0.75;
    for ndist in [0.8, 0.95, 0.2, 0.5, 0.7] {
        tracker.update(start, ndist, false);
    }
    assert_relative_eq!(tracker.progress(), 95.0, epsilon = 1e-9);
    assert_relative_eq!(tracker.update(start, 0.76, false), 100.0);
}

#[test]
fn test_tracker_reset() {
    let mut tracker = ProgressTracker::new();
    tracker.update(0.0, 0.5, false);
    tracker.reset();
    assert_eq!(tracker.progress(), 0.0);
    assert_relative_eq!(tracker.update(0.0, 0.1, false), 10.0);
}
