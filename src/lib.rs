//! # Live Tracker
//!
//! Location-to-presentation pipeline for live vehicle tracking.
//!
//! This library provides:
//! - Haversine distance and bearing between GPS fixes
//! - A session-scoped address cache keyed by quantized coordinates
//! - A rate-limited, single-worker reverse-geocode resolver
//! - A bounded trace of recent positions with travelled distance
//! - Presentation-ready trip metrics (distance, ETA, direction, accuracy)
//! - A tracking session that wires all of the above to a push feed
//!
//! ## Features
//!
//! - **`http`** - Enable the HTTP reverse-geocoding provider
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use live_tracker::{
//!     AddressCache, Coordinate, LocationSample, OfflineGeocoder, TrackerConfig, TrackingSession,
//! };
//!
//! # async fn demo() {
//! let cache = AddressCache::new();
//! let mut session = TrackingSession::start(
//!     "trip-42",
//!     TrackerConfig::default(),
//!     cache.clone(),
//!     Arc::new(OfflineGeocoder),
//! );
//!
//! let view = session.view();
//! session.on_sample(LocationSample::at(Coordinate::new(12.9716, 77.5946)).with_speed(30.0));
//!
//! let model = view.snapshot();
//! println!("{} away, ETA {}", model.position.stats.distance_label, model.position.stats.eta_label);
//! # }
//! ```

use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod cache;
pub use cache::{AddressCache, CacheStats, MemorySessionStore, SessionStore};

pub mod geo_utils;
pub use geo_utils::CompassOctant;

pub mod geocode;
pub use geocode::{
    AddressBook, AddressState, GeocodeError, GeocodeRequest, GeocodeResolver, GeocodeResponse,
    GeocodeStatus, OfflineGeocoder, ResolverState, ReverseGeocoder, SlotAddress,
};

#[cfg(feature = "http")]
pub use geocode::http::GoogleGeocoder;

pub mod trace;
pub use trace::Trace;

pub mod stats;
pub use stats::{StatsEngine, StatsSnapshot};

pub mod session;
pub use session::{
    LocationUpdate, PositionView, PushedLocation, SampleError, SessionEvent, StartError,
    TrackingSession, TrackingView, ViewModel,
};

// ============================================================================
// Core Types
// ============================================================================

/// A latitude/longitude pair in WGS84 degrees.
///
/// # Example
/// ```
/// use live_tracker::Coordinate;
/// let bengaluru = Coordinate::new(12.9716, 77.5946);
/// assert!(bengaluru.is_valid());
/// assert_eq!(bengaluru.display_label(), "12.9716, 77.5946");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the coordinate is finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Raw coordinate shown while a slot waits for its address.
    pub fn display_label(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lng)
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(c: Coordinate) -> Self {
        Point::new(c.lng, c.lat)
    }
}

/// One raw GPS fix from the location push channel.
///
/// Speed, bearing and accuracy are optional on the wire; the stats engine
/// applies defaults for whatever is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub coordinate: Coordinate,
    /// Ground speed in km/h
    pub speed_kmh: Option<f64>,
    /// Heading in degrees clockwise from north
    pub bearing_deg: Option<f64>,
    /// Horizontal accuracy radius in meters
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    /// A bare fix at `coordinate`, stamped with the current time.
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            speed_kmh: None,
            bearing_deg: None,
            accuracy_m: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = Some(speed_kmh);
        self
    }

    pub fn with_bearing(mut self, bearing_deg: f64) -> Self {
        self.bearing_deg = Some(bearing_deg);
        self
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }
}

/// Named role a resolved address fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Current,
    Pickup,
    Drop,
    Office,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Current, Slot::Pickup, Slot::Drop, Slot::Office];

    /// Static slots belong to the trip definition and rarely move.
    pub fn is_static(self) -> bool {
        !matches!(self, Slot::Current)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Current => "current",
            Slot::Pickup => "pickup",
            Slot::Drop => "drop",
            Slot::Office => "office",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trip direction. `Login` trips are office-bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripType {
    Login,
    #[default]
    Logout,
}

/// Trip definition as supplied by the trip data provider.
///
/// Read-only to the tracker: every change is treated as a fresh snapshot.
///
/// # Example
/// ```
/// use live_tracker::{Coordinate, TripDefinition, TripType};
///
/// let trip: TripDefinition = serde_json::from_str(r#"{
///     "tripId": "t-1",
///     "tripType": "login",
///     "pickup": { "lat": 12.9716, "lng": 77.5946 },
///     "office": { "lat": 12.9352, "lng": 77.6245 }
/// }"#).unwrap();
///
/// assert_eq!(trip.trip_type, TripType::Login);
/// assert_eq!(trip.next_stop(), Some(Coordinate::new(12.9716, 77.5946)));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDefinition {
    pub trip_id: String,
    #[serde(default)]
    pub trip_type: TripType,
    #[serde(default)]
    pub pickup: Option<Coordinate>,
    #[serde(default)]
    pub drop: Option<Coordinate>,
    #[serde(default)]
    pub office: Option<Coordinate>,
    /// Set once the rider is on board; the next stop moves past the pickup.
    #[serde(default)]
    pub picked_up: bool,
}

impl TripDefinition {
    /// Coordinate configured for a static slot, if any.
    ///
    /// The office only counts for `login` trips. Invalid coordinates are
    /// treated as absent.
    pub fn coordinate_for(&self, slot: Slot) -> Option<Coordinate> {
        let coordinate = match slot {
            Slot::Current => None,
            Slot::Pickup => self.pickup,
            Slot::Drop => self.drop,
            Slot::Office if self.trip_type == TripType::Login => self.office,
            Slot::Office => None,
        };
        coordinate.filter(Coordinate::is_valid)
    }

    /// Static slots present in this trip, in pickup/drop/office order.
    pub fn static_slots(&self) -> Vec<(Slot, Coordinate)> {
        [Slot::Pickup, Slot::Drop, Slot::Office]
            .into_iter()
            .filter_map(|slot| self.coordinate_for(slot).map(|c| (slot, c)))
            .collect()
    }

    /// The next geographic stop used for distance and ETA.
    pub fn next_stop(&self) -> Option<Coordinate> {
        if !self.picked_up {
            if let Some(pickup) = self.coordinate_for(Slot::Pickup) {
                return Some(pickup);
            }
        }
        match self.trip_type {
            TripType::Login => self.coordinate_for(Slot::Office),
            TripType::Logout => self.coordinate_for(Slot::Drop),
        }
    }

    /// Slot whose address labels the next stop in the presentation layer.
    pub fn next_stop_slot(&self) -> Option<Slot> {
        if self.trip_type == TripType::Login {
            return Some(Slot::Office);
        }
        [Slot::Pickup, Slot::Drop]
            .into_iter()
            .find(|slot| self.coordinate_for(*slot).is_some())
    }
}

/// Configuration for a tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Number of recent positions kept in the trace.
    /// Default: 20
    pub trace_capacity: usize,

    /// Pause between geocode lookups, in milliseconds.
    /// Default: 100
    pub inter_request_delay_ms: u64,

    /// Accuracy reported when a sample carries none, in meters.
    /// Default: 25.0
    pub default_accuracy_m: f64,

    /// Text shown in a slot before anything has been published for it.
    /// Default: "Loading address..."
    pub placeholder_address: String,

    /// Re-resolve the current slot whenever the vehicle moves to a new
    /// quantized coordinate, even if it already holds an address.
    /// Default: false (a resolved slot is never re-resolved)
    pub refresh_current_address: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            trace_capacity: 20,
            inter_request_delay_ms: 100,
            default_accuracy_m: 25.0,
            placeholder_address: "Loading address...".to_string(),
            refresh_current_address: false,
        }
    }
}

impl TrackerConfig {
    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
