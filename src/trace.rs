//! Bounded trace of recent positions.
//!
//! Newest coordinate first. Appending prepends and drops the tail once the
//! trace is over capacity; entries are never reordered. The travelled
//! distance is recomputed from scratch on every append, walking oldest to
//! newest, which is cheap at the small capacities a live map uses.

use crate::geo_utils::{polyline_length, round_to};
use crate::Coordinate;
use geo::{Coord, LineString};
use std::collections::VecDeque;

/// Default number of positions kept.
pub const DEFAULT_TRACE_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    points: VecDeque<Coordinate>,
    capacity: usize,
    total_distance_km: f64,
}

impl Trace {
    /// Empty trace holding at most `capacity` positions (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
            total_distance_km: 0.0,
        }
    }

    /// Record the newest position.
    pub fn append(&mut self, coordinate: Coordinate) {
        self.points.push_front(coordinate);
        self.points.truncate(self.capacity);
        self.total_distance_km = round_to(polyline_length(self.points.iter().rev()) / 1000.0, 1);
    }

    /// Distance travelled across the trace in km, rounded to one decimal.
    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_km
    }

    pub fn newest(&self) -> Option<&Coordinate> {
        self.points.front()
    }

    /// Positions newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Coordinate> {
        self.points.iter()
    }

    /// Positions newest first.
    pub fn to_vec(&self) -> Vec<Coordinate> {
        self.points.iter().copied().collect()
    }

    /// Polyline for rendering, oldest to newest.
    pub fn polyline(&self) -> LineString<f64> {
        self.points
            .iter()
            .rev()
            .map(|c| Coord { x: c.lng, y: c.lat })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.total_distance_km = 0.0;
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY)
    }
}
