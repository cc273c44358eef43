//! Planar polyline and polygon geometry
//!
//! Distances along a polyline are measured in track units from the first
//! coordinate. A closed polyline (ring) repeats its first coordinate at the
//! end, so `coords().len()` is one more than the number of distinct vertices.

use super::types::Point;

/// An open path or closed ring of line segments
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    coords: Vec<Point>,
    /// Distance from the first coordinate to each coordinate
    cumulative: Vec<f64>,
    closed: bool,
}

impl Polyline {
    /// Build an open path. Needs at least two coordinates.
    pub fn open(coords: Vec<Point>) -> Option<Self> {
        Self::build(coords, false)
    }

    /// Build a closed ring, appending the first coordinate if the input
    /// does not already end on it.
    pub fn ring(mut coords: Vec<Point>) -> Option<Self> {
        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
            if first != last {
                coords.push(first);
            }
        }
        Self::build(coords, true)
    }

    fn build(coords: Vec<Point>, closed: bool) -> Option<Self> {
        if coords.len() < 2 {
            return None;
        }
        let mut cumulative = Vec::with_capacity(coords.len());
        let mut total = 0.0;
        cumulative.push(0.0);
        for pair in coords.windows(2) {
            total += pair[0].distance(&pair[1]);
            cumulative.push(total);
        }
        Some(Self {
            coords,
            cumulative,
            closed,
        })
    }

    pub fn coords(&self) -> &[Point] {
        &self.coords
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Distance along the line to the point nearest `point`.
    /// Ties go to the earliest segment.
    pub fn project(&self, point: &Point) -> f64 {
        let mut best_dist_sq = f64::INFINITY;
        let mut best_along = 0.0;
        for (i, pair) in self.coords.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            let seg_len_sq = dx * dx + dy * dy;
            let t = if seg_len_sq > 0.0 {
                (((point.x - a.x) * dx + (point.y - a.y) * dy) / seg_len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let foot = a.lerp(&b, t);
            let dist_sq = (point.x - foot.x).powi(2) + (point.y - foot.y).powi(2);
            if dist_sq < best_dist_sq {
                best_dist_sq = dist_sq;
                best_along = self.cumulative[i] + t * seg_len_sq.sqrt();
            }
        }
        best_along
    }

    /// Like [`Polyline::project`] but as a fraction of the total length
    pub fn project_normalized(&self, point: &Point) -> f64 {
        let length = self.length();
        if length > 0.0 {
            self.project(point) / length
        } else {
            0.0
        }
    }

    /// Point at `distance` along the line, clamped to the ends
    pub fn interpolate(&self, distance: f64) -> Point {
        let distance = distance.clamp(0.0, self.length());
        let seg = self
            .cumulative
            .partition_point(|&d| d <= distance)
            .clamp(1, self.coords.len() - 1);
        let (start, end) = (self.cumulative[seg - 1], self.cumulative[seg]);
        let span = end - start;
        let t = if span > 0.0 {
            (distance - start) / span
        } else {
            0.0
        };
        self.coords[seg - 1].lerp(&self.coords[seg], t)
    }

    pub fn interpolate_normalized(&self, fraction: f64) -> Point {
        self.interpolate(fraction * self.length())
    }
}

/// A simple polygon with optional holes, tested with even-odd ray casting
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Vec<Point>,
    holes: Vec<Vec<Point>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Point>, holes: Vec<Vec<Point>>) -> Self {
        Self { exterior, holes }
    }

    pub fn exterior(&self) -> &[Point] {
        &self.exterior
    }

    pub fn holes(&self) -> &[Vec<Point>] {
        &self.holes
    }

    /// True if `point` lies inside the exterior and outside every hole
    pub fn contains(&self, point: &Point) -> bool {
        ring_contains(&self.exterior, point) && !self.holes.iter().any(|h| ring_contains(h, point))
    }
}

fn ring_contains(ring: &[Point], point: &Point) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let cross_x = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
