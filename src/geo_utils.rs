//! # Geographic Utilities
//!
//! Great-circle math for the live tracking pipeline.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two coordinates |
//! | [`initial_bearing`] | Forward azimuth from one coordinate to another |
//! | [`polyline_length`] | Total length of an ordered run of coordinates |
//! | [`round_to`] | Round a value to a fixed number of decimals |
//!
//! ## Example
//!
//! ```rust
//! use live_tracker::{Coordinate, geo_utils};
//!
//! let driver = Coordinate::new(12.9716, 77.5946);
//! let office = Coordinate::new(12.9352, 77.6245);
//!
//! let meters = geo_utils::haversine_distance(&driver, &office);
//! assert!((meters - 5_185.0).abs() < 10.0);
//!
//! let heading = geo_utils::initial_bearing(&driver, &office);
//! assert!(heading > 90.0 && heading < 180.0); // south-east
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a sphere of radius
//! [`EARTH_RADIUS_M`]. Reference:
//! [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)

use crate::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two coordinates, in meters.
///
/// Symmetric in its arguments; identical coordinates give exactly `0.0`.
///
/// # Example
///
/// ```rust
/// use live_tracker::{Coordinate, geo_utils};
///
/// let a = Coordinate::new(51.5074, -0.1278);
/// let b = Coordinate::new(48.8566, 2.3522);
/// assert_eq!(geo_utils::haversine_distance(&a, &b), geo_utils::haversine_distance(&b, &a));
/// assert_eq!(geo_utils::haversine_distance(&a, &a), 0.0);
/// ```
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial great-circle bearing from `a` towards `b`, in degrees `[0, 360)`.
///
/// North is 0°, east is 90°. Identical coordinates give `0.0`.
pub fn initial_bearing(a: &Coordinate, b: &Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let y = d_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();

    normalize_bearing(y.atan2(x).to_degrees())
}

/// Total length in meters of coordinates visited in iteration order.
///
/// Fewer than two coordinates give `0.0`.
pub fn polyline_length<'a, I>(points: I) -> f64
where
    I: IntoIterator<Item = &'a Coordinate>,
{
    let mut iter = points.into_iter();
    let Some(mut prev) = iter.next() else {
        return 0.0;
    };

    let mut total = 0.0;
    for next in iter {
        total += haversine_distance(prev, next);
        prev = next;
    }
    total
}

/// Fold any angle into `[0, 360)`.
#[inline]
pub fn normalize_bearing(degrees: f64) -> f64 {
    let folded = degrees.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if folded >= 360.0 {
        0.0
    } else {
        folded
    }
}

/// Round half away from zero to `decimals` places.
#[inline]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

// =============================================================================
// Compass
// =============================================================================

/// One of the eight compass octants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompassOctant {
    #[default]
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CompassOctant {
    const TABLE: [CompassOctant; 8] = [
        CompassOctant::N,
        CompassOctant::NE,
        CompassOctant::E,
        CompassOctant::SE,
        CompassOctant::S,
        CompassOctant::SW,
        CompassOctant::W,
        CompassOctant::NW,
    ];

    /// Octant for a bearing: `round(bearing / 45) mod 8`.
    ///
    /// Non-finite bearings map to north.
    ///
    /// ```
    /// use live_tracker::CompassOctant;
    /// assert_eq!(CompassOctant::from_bearing(100.0), CompassOctant::E);
    /// assert_eq!(CompassOctant::from_bearing(350.0), CompassOctant::N);
    /// ```
    pub fn from_bearing(bearing_deg: f64) -> Self {
        if !bearing_deg.is_finite() {
            return CompassOctant::N;
        }
        let index = (normalize_bearing(bearing_deg) / 45.0).round() as usize % 8;
        Self::TABLE[index]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompassOctant::N => "N",
            CompassOctant::NE => "NE",
            CompassOctant::E => "E",
            CompassOctant::SE => "SE",
            CompassOctant::S => "S",
            CompassOctant::SW => "SW",
            CompassOctant::W => "W",
            CompassOctant::NW => "NW",
        }
    }
}

impl fmt::Display for CompassOctant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
