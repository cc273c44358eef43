//! Direction-aware nearest-segment search over cached distance tables

use ordered_float::OrderedFloat;
use sorted_vec::SortedVec;

use super::geometry::Polyline;

/// The two consecutive waypoints straddling a normalized distance.
/// `next` is the waypoint the car is driving towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bracket {
    pub prev: usize,
    pub next: usize,
}

impl Bracket {
    pub fn as_pair(&self) -> [usize; 2] {
        [self.prev, self.next]
    }
}

/// Ascending normalized distances of a polyline's vertices with a trailing
/// `1.0` sentinel
#[derive(Debug, Clone)]
pub struct DistanceTable {
    dists: SortedVec<OrderedFloat<f64>>,
}

impl DistanceTable {
    /// Project every vertex except the last onto the line, then append the
    /// sentinel. Projections are forced non-decreasing so a self-approaching
    /// track cannot break the search.
    pub fn from_polyline(line: &Polyline) -> Self {
        let coords = line.coords();
        let mut floor = 0.0_f64;
        let mut dists: Vec<f64> = coords[..coords.len() - 1]
            .iter()
            .map(|p| {
                floor = floor.max(line.project_normalized(p).min(1.0));
                floor
            })
            .collect();
        dists.push(1.0);
        Self::from_distances(dists)
    }

    pub fn from_distances(dists: Vec<f64>) -> Self {
        Self {
            dists: SortedVec::from_unsorted(dists.into_iter().map(OrderedFloat).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.dists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dists.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.dists.get(index).map(|d| d.into_inner())
    }

    pub fn as_slice(&self) -> &[OrderedFloat<f64>] {
        self.dists.as_slice()
    }

    pub fn bracket(&self, ndist: f64, reverse: bool) -> Bracket {
        find_bracket(self.as_slice(), ndist, reverse)
    }
}

/// Find the waypoints straddling `ndist`.
///
/// Forward: `next` is the first entry above `ndist` and `prev` the one
/// before, with `next` wrapping to 0 past the end. Reverse: `next` is the
/// entry before the first one at or above `ndist` and `prev` the one after,
/// with `next` wrapping to the last index below 0. `ndist` is clamped into
/// `[0, 1]`.
pub fn find_bracket(distances: &[OrderedFloat<f64>], ndist: f64, reverse: bool) -> Bracket {
    let len = distances.len();
    if len == 0 {
        return Bracket::default();
    }
    let ndist = if ndist.is_nan() { 0.0 } else { ndist.clamp(0.0, 1.0) };
    if reverse {
        let lower = distances.partition_point(|d| d.into_inner() < ndist);
        let prev = lower.min(len - 1);
        let next = match lower.checked_sub(1) {
            Some(next) => next,
            None => len - 1,
        };
        Bracket { prev, next }
    } else {
        let upper = distances.partition_point(|d| d.into_inner() <= ndist);
        let prev = upper.saturating_sub(1);
        let next = if upper >= len { 0 } else { upper };
        Bracket { prev, next }
    }
}
