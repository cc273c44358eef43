//! Lap progress accounting
//!
//! Progress is the percentage of the lap covered since the episode's start
//! line. It is never allowed to move backwards inside an episode: a drop is
//! read either as a lap wrap (progress saturates at 100) or as the car
//! backing up (progress holds).
//!
//! A backward excursion longer than half the track looks like a wrap and is
//! reported as a completed lap. That is the accepted behavior of the
//! heuristic and is left unguarded.

/// Raw lap percentage between the start line and `current_ndist`,
/// measured in the driving direction
pub fn lap_progress(start_ndist: f64, current_ndist: f64, reverse: bool) -> f64 {
    let mut raw = if reverse {
        start_ndist - current_ndist
    } else {
        current_ndist - start_ndist
    };
    if raw < 0.0 {
        raw += 1.0;
    }
    100.0 * raw
}

/// Resolve a candidate progress against the previous one.
///
/// `delta1` assumes the lap wrapped, `delta2` that the car went backwards;
/// the smaller positional jump wins.
pub fn resolve_progress(candidate: f64, prev_progress: f64) -> f64 {
    if candidate >= prev_progress {
        return candidate;
    }
    let delta1 = candidate + 100.0 - prev_progress;
    let delta2 = prev_progress - candidate;
    if delta1 < delta2 {
        100.0
    } else {
        prev_progress
    }
}

/// Episode-scoped progress state
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    prev_progress: f64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> f64 {
        self.prev_progress
    }

    pub fn reset(&mut self) {
        self.prev_progress = 0.0;
    }

    /// Fold a new sample into the episode's progress and return it
    pub fn update(&mut self, start_ndist: f64, current_ndist: f64, reverse: bool) -> f64 {
        let progress = resolve_progress(
            lap_progress(start_ndist, current_ndist, reverse),
            self.prev_progress,
        );
        self.prev_progress = progress;
        progress
    }
}
