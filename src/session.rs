//! Tracking session controller.
//!
//! A [`TrackingSession`] owns everything scoped to one live trip view: the
//! trace, the latest stats, the geocode worker and the trip definition. It
//! reacts to two event sources, location pushes and trip changes, and
//! publishes a [`PositionView`] plus an [`AddressBook`] through watch
//! channels for the presentation layer.
//!
//! Nothing fails past this boundary. A malformed push is logged and treated
//! as "no update this tick"; a missing next stop degrades to `"--"` labels;
//! geocoding failures leave the raw coordinate on screen.
//!
//! The [`AddressCache`] is injected and handed back by [`TrackingSession::end`],
//! so the host decides how long resolved addresses survive.

use crate::geocode::{AddressBook, GeocodeResolver, ReverseGeocoder};
use crate::stats::{StatsEngine, StatsSnapshot};
use crate::trace::Trace;
use crate::{AddressCache, Coordinate, LocationSample, Slot, TrackerConfig, TripDefinition};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::watch;

/// Next-stop label when the trip has no stop to name.
pub const DEFAULT_NEXT_STOP_LABEL: &str = "Destination";

// ============================================================================
// Push Payloads
// ============================================================================

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("location push carries no coordinate")]
    MissingCoordinate,
    #[error("coordinate out of range: ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },
    #[error("malformed location push: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("no tokio runtime to run the geocode worker on: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// Position block of a location push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushedLocation {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub accuracy: Option<f64>,
    pub bearing: Option<f64>,
}

/// Event delivered by the live-location push channel.
///
/// ```
/// use live_tracker::LocationUpdate;
///
/// let update = LocationUpdate::from_json(
///     r#"{"tripId":"t-1","location":{"lat":12.9716,"lng":77.5946,"bearing":100},"speed":30}"#,
/// ).unwrap();
/// let sample = update.to_sample().unwrap();
/// assert_eq!(sample.speed_kmh, Some(30.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub trip_id: String,
    #[serde(default)]
    pub location: Option<PushedLocation>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LocationUpdate {
    pub fn from_json(payload: &str) -> Result<Self, SampleError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Validate the push and turn it into a [`LocationSample`].
    ///
    /// A missing timestamp is stamped with the current time.
    pub fn to_sample(&self) -> Result<LocationSample, SampleError> {
        let location = self.location.as_ref().ok_or(SampleError::MissingCoordinate)?;
        let (Some(lat), Some(lng)) = (location.lat, location.lng) else {
            return Err(SampleError::MissingCoordinate);
        };

        let coordinate = Coordinate::new(lat, lng);
        if !coordinate.is_valid() {
            return Err(SampleError::InvalidCoordinate { lat, lng });
        }

        Ok(LocationSample {
            coordinate,
            speed_kmh: self.speed,
            bearing_deg: location.bearing,
            accuracy_m: location.accuracy,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

/// Input to [`TrackingSession::run`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Raw push from the location channel
    Location(LocationUpdate),
    /// Already-decoded fix
    Sample(LocationSample),
    /// New or updated trip definition
    TripChanged(TripDefinition),
}

// ============================================================================
// View Model
// ============================================================================

/// Position-derived part of the view model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionView {
    pub stats: StatsSnapshot,
    /// Recent positions, newest first
    pub trace: Vec<Coordinate>,
    /// Where the map should be centred
    pub center: Option<Coordinate>,
    /// Bumped on every accepted sample; the map recentres on change
    pub updates: u64,
    pub next_stop: Option<Coordinate>,
    pub next_stop_slot: Option<Slot>,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub position: PositionView,
    pub addresses: AddressBook,
    pub next_stop_address: String,
}

/// Read side of a session; cheap to clone, outlives nothing it observes.
#[derive(Debug, Clone)]
pub struct TrackingView {
    pub position: watch::Receiver<PositionView>,
    pub addresses: watch::Receiver<AddressBook>,
}

impl TrackingView {
    /// Current combined view.
    pub fn snapshot(&self) -> ViewModel {
        let position = self.position.borrow().clone();
        let addresses = self.addresses.borrow().clone();
        let next_stop_address = match position.next_stop_slot {
            Some(slot) => addresses.label(slot).to_string(),
            None => DEFAULT_NEXT_STOP_LABEL.to_string(),
        };
        ViewModel {
            position,
            addresses,
            next_stop_address,
        }
    }

    /// Wait for the next change on either channel.
    ///
    /// Returns `false` once the session is gone.
    pub async fn changed(&mut self) -> bool {
        tokio::select! {
            r = self.position.changed() => r.is_ok(),
            r = self.addresses.changed() => r.is_ok(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

pub struct TrackingSession {
    trip_id: String,
    cache: AddressCache,
    resolver: GeocodeResolver,
    stats: StatsEngine,
    trace: Trace,
    trip: Option<TripDefinition>,
    last_sample: Option<LocationSample>,
    position: watch::Sender<PositionView>,
}

impl TrackingSession {
    /// Start tracking `trip_id`, spawning the geocode worker.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime. See [`TrackingSession::try_start`].
    pub fn start(
        trip_id: impl Into<String>,
        config: TrackerConfig,
        cache: AddressCache,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Self {
        Self::start_on(&Handle::current(), trip_id.into(), config, cache, geocoder)
    }

    /// Like [`TrackingSession::start`], but reports a missing runtime instead
    /// of panicking.
    pub fn try_start(
        trip_id: impl Into<String>,
        config: TrackerConfig,
        cache: AddressCache,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Result<Self, StartError> {
        let handle = Handle::try_current()?;
        Ok(Self::start_on(&handle, trip_id.into(), config, cache, geocoder))
    }

    fn start_on(
        handle: &Handle,
        trip_id: String,
        config: TrackerConfig,
        cache: AddressCache,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Self {
        info!("[TrackingSession] starting session for trip {}", trip_id);

        let resolver = GeocodeResolver::spawn_on(handle, &config, cache.clone(), geocoder);
        let initial = PositionView {
            stats: StatsSnapshot {
                accuracy_m: config.default_accuracy_m.max(0.0).round() as u32,
                ..StatsSnapshot::default()
            },
            ..PositionView::default()
        };

        Self {
            trip_id,
            cache,
            stats: StatsEngine::new(&config),
            trace: Trace::new(config.trace_capacity),
            resolver,
            trip: None,
            last_sample: None,
            position: watch::Sender::new(initial),
        }
    }

    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    pub fn view(&self) -> TrackingView {
        TrackingView {
            position: self.position.subscribe(),
            addresses: self.resolver.addresses(),
        }
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn resolver(&self) -> &GeocodeResolver {
        &self.resolver
    }

    /// Handle a raw push. Returns `true` if it produced an update.
    pub fn on_location_update(&mut self, update: &LocationUpdate) -> bool {
        if update.trip_id != self.trip_id {
            debug!(
                "[TrackingSession] ignoring push for trip {} (tracking {})",
                update.trip_id, self.trip_id
            );
            return false;
        }

        match update.to_sample() {
            Ok(sample) => self.on_sample(sample),
            Err(e) => {
                warn!("[TrackingSession] skipping push for trip {}: {}", self.trip_id, e);
                false
            }
        }
    }

    /// Handle one fix: trace, geocode, stats, recentre.
    ///
    /// Returns `false` and changes nothing if the coordinate is invalid.
    pub fn on_sample(&mut self, sample: LocationSample) -> bool {
        let coordinate = sample.coordinate;
        if !coordinate.is_valid() {
            warn!(
                "[TrackingSession] skipping out-of-range fix ({}, {})",
                coordinate.lat, coordinate.lng
            );
            return false;
        }

        self.trace.append(coordinate);
        self.resolver.request_resolution(coordinate, Slot::Current);

        let stats = self.stats.compute_now(&sample, self.next_stop(), &self.trace);
        let trace = self.trace.to_vec();
        self.position.send_modify(|view| {
            view.stats = stats;
            view.trace = trace;
            view.center = Some(coordinate);
            view.updates += 1;
        });

        self.last_sample = Some(sample);
        true
    }

    /// Take a new trip snapshot and resolve its static addresses.
    ///
    /// Definitions for another trip are ignored; returns `true` if applied.
    pub fn on_trip_changed(&mut self, trip: TripDefinition) -> bool {
        if trip.trip_id != self.trip_id {
            warn!(
                "[TrackingSession] ignoring trip definition {} (tracking {})",
                trip.trip_id, self.trip_id
            );
            return false;
        }

        for (slot, coordinate) in trip.static_slots() {
            match self.cache.get(&coordinate) {
                Some(address) => self.resolver.publish(slot, coordinate, &address),
                None => {
                    self.resolver.request_resolution(coordinate, slot);
                }
            }
        }

        let next_stop = trip.next_stop();
        let next_stop_slot = trip.next_stop_slot();
        self.trip = Some(trip);

        let stats = self
            .last_sample
            .as_ref()
            .map(|sample| self.stats.compute_now(sample, next_stop, &self.trace));

        self.position.send_modify(|view| {
            view.next_stop = next_stop;
            view.next_stop_slot = next_stop_slot;
            if let Some(mut stats) = stats {
                // no new fix, so the fix time stays
                stats.last_update_label = std::mem::take(&mut view.stats.last_update_label);
                view.stats = stats;
            }
        });
        true
    }

    pub fn next_stop(&self) -> Option<Coordinate> {
        self.trip.as_ref().and_then(TripDefinition::next_stop)
    }

    /// Apply events in arrival order until the stream ends, then tear down.
    pub async fn run<S>(mut self, mut events: S) -> AddressCache
    where
        S: Stream<Item = SessionEvent> + Unpin,
    {
        while let Some(event) = events.next().await {
            match event {
                SessionEvent::Location(update) => {
                    self.on_location_update(&update);
                }
                SessionEvent::Sample(sample) => {
                    self.on_sample(sample);
                }
                SessionEvent::TripChanged(trip) => {
                    self.on_trip_changed(trip);
                }
            }
        }
        self.end()
    }

    /// End the session, discarding pending lookups. The cache survives.
    pub fn end(self) -> AddressCache {
        self.resolver.shutdown();
        info!(
            "[TrackingSession] trip {} ended after {} update(s), {:?}",
            self.trip_id,
            self.position.borrow().updates,
            self.cache.stats()
        );
        self.cache
    }
}

// ============================================================================
// Tests
// ============================================================================
