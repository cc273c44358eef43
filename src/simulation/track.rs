//! Track model built from the waypoint table
//!
//! The table is loaded once and never changes. Everything here is derived
//! from it at construction and is read-only afterwards.

use super::error::TrackError;
use super::geometry::{Polygon, Polyline};
use super::types::Point;
use super::waypoint_index::{Bracket, DistanceTable};

/// Number of columns in a waypoint row
pub const WAYPOINT_COLUMNS: usize = 6;

/// One sampled cross-section of the track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub center: Point,
    pub inner: Point,
    pub outer: Point,
}

impl Waypoint {
    pub fn new(center: Point, inner: Point, outer: Point) -> Self {
        Self {
            center,
            inner,
            outer,
        }
    }

    /// Build from a `(center_x, center_y, inner_x, inner_y, outer_x, outer_y)` row
    pub fn from_row(row: &[f64]) -> Result<Self, TrackError> {
        if row.len() != WAYPOINT_COLUMNS {
            return Err(TrackError::Columns(row.len()));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(TrackError::NonFinite);
        }
        Ok(Self::new(
            Point::new(row[0], row[1]),
            Point::new(row[2], row[3]),
            Point::new(row[4], row[5]),
        ))
    }
}

/// Reshape a flat row-major array into waypoints
pub fn waypoints_from_flat(
    values: &[f64],
    rows: usize,
    cols: usize,
) -> Result<Vec<Waypoint>, TrackError> {
    if cols != WAYPOINT_COLUMNS {
        return Err(TrackError::Columns(cols));
    }
    if values.len() != rows * cols {
        return Err(TrackError::Shape {
            rows,
            cols,
            len: values.len(),
        });
    }
    values.chunks(cols).map(Waypoint::from_row).collect()
}

/// Closed circular track centred on the origin, `count` distinct waypoints
/// plus the closing repeat of the first one
pub fn circular_waypoints(count: usize, radius: f64, width: f64) -> Vec<Waypoint> {
    let half = width / 2.0;
    let mut waypoints: Vec<Waypoint> = (0..count)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / count as f64;
            let (sin, cos) = angle.sin_cos();
            let at = |r: f64| Point::new(r * cos, r * sin);
            Waypoint::new(at(radius), at(radius - half), at(radius + half))
        })
        .collect();
    if let Some(first) = waypoints.first().copied() {
        waypoints.push(first);
    }
    waypoints
}

/// A lane polyline with its own distance table, driven by bot cars
#[derive(Debug, Clone)]
pub struct LanePath {
    pub line: Polyline,
    pub dists: DistanceTable,
}

impl LanePath {
    pub fn new(line: Polyline) -> Self {
        let dists = DistanceTable::from_polyline(&line);
        Self { line, dists }
    }

    pub fn length(&self) -> f64 {
        self.line.length()
    }

    /// Bracket for an absolute distance along this lane
    pub fn bracket(&self, distance: f64, reverse: bool) -> Bracket {
        let length = self.length();
        let ndist = if length > 0.0 { distance / length } else { 0.0 };
        self.dists.bracket(ndist, reverse)
    }
}

/// Distances from a point to the track reference lines at its position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderDistances {
    pub from_center: f64,
    pub from_inner: f64,
    pub from_outer: f64,
    pub track_width: f64,
}

impl BorderDistances {
    /// Left of center means nearer the inner border, or the outer border
    /// when driving the track in reverse
    pub fn is_left_of_center(&self, reverse: bool) -> bool {
        if reverse {
            self.from_outer < self.from_inner
        } else {
            self.from_inner < self.from_outer
        }
    }
}

/// Immutable track geometry
#[derive(Debug, Clone)]
pub struct TrackModel {
    waypoints: Vec<Waypoint>,
    is_loop: bool,
    center_line: Polyline,
    inner_border: Polyline,
    outer_border: Polyline,
    left_lane: LanePath,
    right_lane: LanePath,
    road: Polygon,
    center_dists: DistanceTable,
}

impl TrackModel {
    /// Build the track. A table whose first row equals its last is a loop.
    pub fn build(waypoints: Vec<Waypoint>) -> Result<Self, TrackError> {
        if waypoints.len() < 2 {
            return Err(TrackError::TooFewWaypoints(waypoints.len()));
        }
        let is_loop = waypoints.first() == waypoints.last();

        let column = |f: fn(&Waypoint) -> Point| waypoints.iter().map(f).collect::<Vec<_>>();
        let center = column(|w| w.center);
        let inner = column(|w| w.inner);
        let outer = column(|w| w.outer);
        let left = column(|w| w.inner.midpoint(&w.center));
        let right = column(|w| w.outer.midpoint(&w.center));

        let make = |coords: Vec<Point>| {
            if is_loop {
                Polyline::ring(coords)
            } else {
                Polyline::open(coords)
            }
        };
        let center_line = make(center).ok_or(TrackError::TooFewWaypoints(waypoints.len()))?;
        if center_line.length() <= 0.0 {
            return Err(TrackError::Degenerate);
        }
        let inner_border = make(inner.clone()).ok_or(TrackError::Degenerate)?;
        let outer_border = make(outer.clone()).ok_or(TrackError::Degenerate)?;
        let left_lane = LanePath::new(make(left).ok_or(TrackError::Degenerate)?);
        let right_lane = LanePath::new(make(right).ok_or(TrackError::Degenerate)?);

        let road = if is_loop {
            Polygon::new(outer, vec![inner])
        } else {
            let mut boundary = outer;
            boundary.extend(inner.into_iter().rev());
            Polygon::new(boundary, Vec::new())
        };

        let center_dists = DistanceTable::from_polyline(&center_line);

        Ok(Self {
            waypoints,
            is_loop,
            center_line,
            inner_border,
            outer_border,
            left_lane,
            right_lane,
            road,
            center_dists,
        })
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn is_loop(&self) -> bool {
        self.is_loop
    }

    pub fn center_line(&self) -> &Polyline {
        &self.center_line
    }

    pub fn inner_border(&self) -> &Polyline {
        &self.inner_border
    }

    pub fn outer_border(&self) -> &Polyline {
        &self.outer_border
    }

    pub fn road(&self) -> &Polygon {
        &self.road
    }

    pub fn track_length(&self) -> f64 {
        self.center_line.length()
    }

    pub fn center_dists(&self) -> &DistanceTable {
        &self.center_dists
    }

    /// Lanes in bot lane-change rotation order
    pub fn lanes(&self) -> Vec<LanePath> {
        vec![self.left_lane.clone(), self.right_lane.clone()]
    }

    /// Centerline coordinates as `(x, y)` pairs
    pub fn center_coords(&self) -> Vec<(f64, f64)> {
        self.center_line.coords().iter().map(|p| (p.x, p.y)).collect()
    }

    pub fn center_point(&self, index: usize) -> Option<Point> {
        self.center_line.coords().get(index).copied()
    }

    /// Normalized distance of the centerline point nearest `point`
    pub fn project(&self, point: &Point) -> f64 {
        self.center_line.project_normalized(point)
    }

    pub fn interpolate(&self, ndist: f64) -> Point {
        self.center_line.interpolate_normalized(ndist)
    }

    /// Distances to the center, inner and outer lines measured from the
    /// border points matched to `ndist` on the centerline
    pub fn nearest_border_distances(&self, point: &Point, ndist: f64) -> BorderDistances {
        let center = self.interpolate(ndist);
        let inner = self
            .inner_border
            .interpolate(self.inner_border.project(&center));
        let outer = self
            .outer_border
            .interpolate(self.outer_border.project(&center));
        BorderDistances {
            from_center: center.distance(point),
            from_inner: inner.distance(point),
            from_outer: outer.distance(point),
            track_width: inner.distance(&outer),
        }
    }

    /// Road polygon membership
    pub fn contains(&self, point: &Point) -> bool {
        self.road.contains(point)
    }

    pub fn bracket(&self, ndist: f64, reverse: bool) -> Bracket {
        self.center_dists.bracket(ndist, reverse)
    }

    /// Of the two bracketing waypoints, the one nearer `point`
    pub fn closest_waypoint(&self, point: &Point, bracket: Bracket) -> usize {
        let distance_to = |index: usize| {
            self.center_point(index)
                .map_or(f64::INFINITY, |p| p.distance(point))
        };
        if distance_to(bracket.next) < distance_to(bracket.prev) {
            bracket.next
        } else {
            bracket.prev
        }
    }
}
