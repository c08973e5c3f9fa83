//! Rate-limited reverse geocoding.
//!
//! Coordinates are turned into human-readable addresses by a single
//! dedicated worker task:
//! - Requests are queued FIFO on an unbounded channel and never reordered
//! - Exactly one lookup is in flight at any time (the worker is the only caller)
//! - The coordinate itself is published first, so a slot is never blank
//! - The [`AddressCache`] is consulted before the provider
//! - A fixed pause follows every request to stay under provider rate limits
//!
//! Provider failures are never fatal: the slot keeps showing the raw
//! coordinate and a warning is logged.

#[cfg(feature = "http")]
pub mod http;

use crate::cache::{cache_key, AddressCache};
use crate::{Coordinate, Slot, TrackerConfig};
use futures::future::BoxFuture;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

// ============================================================================
// Provider Contract
// ============================================================================

/// Status reported by the reverse-geocoding provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeocodeStatus {
    Ok,
    ZeroResults,
    OverQueryLimit,
    RequestDenied,
    InvalidRequest,
    UnknownError,
    Other(String),
}

impl From<&str> for GeocodeStatus {
    fn from(status: &str) -> Self {
        match status {
            "OK" => GeocodeStatus::Ok,
            "ZERO_RESULTS" => GeocodeStatus::ZeroResults,
            "OVER_QUERY_LIMIT" => GeocodeStatus::OverQueryLimit,
            "REQUEST_DENIED" => GeocodeStatus::RequestDenied,
            "INVALID_REQUEST" => GeocodeStatus::InvalidRequest,
            "UNKNOWN_ERROR" => GeocodeStatus::UnknownError,
            other => GeocodeStatus::Other(other.to_string()),
        }
    }
}

/// Provider reply for one coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResponse {
    pub status: GeocodeStatus,
    pub formatted_address: Option<String>,
}

impl GeocodeResponse {
    pub fn ok(address: impl Into<String>) -> Self {
        Self {
            status: GeocodeStatus::Ok,
            formatted_address: Some(address.into()),
        }
    }

    pub fn no_match() -> Self {
        Self {
            status: GeocodeStatus::ZeroResults,
            formatted_address: None,
        }
    }

    /// The address, if the provider answered OK with a non-blank one.
    pub fn resolved_address(&self) -> Option<&str> {
        match (&self.status, self.formatted_address.as_deref()) {
            (GeocodeStatus::Ok, Some(address)) if !address.trim().is_empty() => Some(address),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    /// No provider is loaded; resolution is skipped silently.
    #[error("geocoding provider unavailable")]
    Unavailable,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned HTTP {0}")]
    Http(u16),
    #[error("malformed provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// External reverse-geocoding service.
pub trait ReverseGeocoder: Send + Sync + 'static {
    fn reverse_geocode(&self, coordinate: Coordinate) -> BoxFuture<'_, Result<GeocodeResponse, GeocodeError>>;
}

/// Provider stand-in for when no geocoding backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGeocoder;

impl ReverseGeocoder for OfflineGeocoder {
    fn reverse_geocode(&self, _coordinate: Coordinate) -> BoxFuture<'_, Result<GeocodeResponse, GeocodeError>> {
        Box::pin(async { Err(GeocodeError::Unavailable) })
    }
}

// ============================================================================
// Published Addresses
// ============================================================================

/// How far a slot's address has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressState {
    /// Nothing published yet
    Pending,
    /// Showing the raw coordinate
    Fallback,
    /// Showing a provider (or cached) address
    Resolved,
}

/// What one slot currently displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAddress {
    pub label: String,
    pub state: AddressState,
    /// Coordinate the label was produced for
    pub coordinate: Option<Coordinate>,
}

impl SlotAddress {
    pub fn pending(placeholder: &str) -> Self {
        Self {
            label: placeholder.to_string(),
            state: AddressState::Pending,
            coordinate: None,
        }
    }

    pub fn fallback(coordinate: Coordinate) -> Self {
        Self {
            label: coordinate.display_label(),
            state: AddressState::Fallback,
            coordinate: Some(coordinate),
        }
    }

    pub fn resolved(coordinate: Coordinate, address: impl Into<String>) -> Self {
        Self {
            label: address.into(),
            state: AddressState::Resolved,
            coordinate: Some(coordinate),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state == AddressState::Resolved
    }
}

/// Address shown for every slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressBook {
    pub current: SlotAddress,
    pub pickup: SlotAddress,
    pub drop: SlotAddress,
    pub office: SlotAddress,
}

impl AddressBook {
    pub fn new(placeholder: &str) -> Self {
        Self {
            current: SlotAddress::pending(placeholder),
            pickup: SlotAddress::pending(placeholder),
            drop: SlotAddress::pending(placeholder),
            office: SlotAddress::pending(placeholder),
        }
    }

    pub fn get(&self, slot: Slot) -> &SlotAddress {
        match slot {
            Slot::Current => &self.current,
            Slot::Pickup => &self.pickup,
            Slot::Drop => &self.drop,
            Slot::Office => &self.office,
        }
    }

    pub fn set(&mut self, slot: Slot, address: SlotAddress) {
        match slot {
            Slot::Current => self.current = address,
            Slot::Pickup => self.pickup = address,
            Slot::Drop => self.drop = address,
            Slot::Office => self.office = address,
        }
    }

    /// Display text for a slot.
    pub fn label(&self, slot: Slot) -> &str {
        &self.get(slot).label
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// One queued lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeocodeRequest {
    pub coordinate: Coordinate,
    pub slot: Slot,
}

/// Worker activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Idle,
    Draining,
}

/// Outcome of a single lookup, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Cached,
    Resolved,
    Miss,
    Unavailable,
    Failed,
}

/// Handle to the geocode worker of one tracking session.
///
/// Dropping the handle (or calling [`GeocodeResolver::shutdown`]) aborts the
/// worker: queued requests are discarded and an in-flight lookup is never
/// applied.
pub struct GeocodeResolver {
    queue: mpsc::UnboundedSender<GeocodeRequest>,
    addresses: Arc<watch::Sender<AddressBook>>,
    depth: Arc<watch::Sender<usize>>,
    worker: JoinHandle<()>,
    refresh_current: bool,
}

impl GeocodeResolver {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime. See [`GeocodeResolver::try_spawn`].
    pub fn spawn(config: &TrackerConfig, cache: AddressCache, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self::spawn_on(&Handle::current(), config, cache, geocoder)
    }

    /// Spawn the worker on the current runtime, if there is one.
    pub fn try_spawn(
        config: &TrackerConfig,
        cache: AddressCache,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Result<Self, TryCurrentError> {
        let handle = Handle::try_current()?;
        Ok(Self::spawn_on(&handle, config, cache, geocoder))
    }

    /// Spawn the worker on `handle`.
    pub fn spawn_on(
        handle: &Handle,
        config: &TrackerConfig,
        cache: AddressCache,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Self {
        let (queue, requests) = mpsc::unbounded_channel();
        let addresses = Arc::new(watch::Sender::new(AddressBook::new(&config.placeholder_address)));
        let depth = Arc::new(watch::Sender::new(0usize));

        let worker = handle.spawn(drain_queue(
            requests,
            Worker {
                geocoder,
                cache,
                addresses: Arc::clone(&addresses),
                depth: Arc::clone(&depth),
                delay: config.inter_request_delay(),
            },
        ));

        Self {
            queue,
            addresses,
            depth,
            worker,
            refresh_current: config.refresh_current_address,
        }
    }

    /// Queue a lookup for `slot`.
    ///
    /// Returns `false` without queueing when the slot already holds a
    /// resolved address. With `refresh_current_address` set, the current
    /// slot is only skipped while the vehicle stays in the same cache cell.
    pub fn request_resolution(&self, coordinate: Coordinate, slot: Slot) -> bool {
        if self.already_resolved(coordinate, slot) {
            debug!("[GeocodeResolver] {} already resolved, skipping", slot);
            return false;
        }

        self.depth.send_modify(|d| *d += 1);
        if self.queue.send(GeocodeRequest { coordinate, slot }).is_err() {
            self.depth.send_modify(|d| *d = d.saturating_sub(1));
            debug!("[GeocodeResolver] worker gone, dropping {} request", slot);
            return false;
        }
        true
    }

    /// Publish an address obtained elsewhere (a direct cache hit).
    pub fn publish(&self, slot: Slot, coordinate: Coordinate, address: &str) {
        self.addresses
            .send_modify(|book| book.set(slot, SlotAddress::resolved(coordinate, address)));
    }

    pub fn addresses(&self) -> watch::Receiver<AddressBook> {
        self.addresses.subscribe()
    }

    pub fn state(&self) -> ResolverState {
        if *self.depth.borrow() == 0 {
            ResolverState::Idle
        } else {
            ResolverState::Draining
        }
    }

    /// Requests queued or in flight.
    pub fn pending(&self) -> usize {
        *self.depth.borrow()
    }

    /// Wait until the queue has been drained.
    pub async fn wait_idle(&self) {
        let mut depth = self.depth.subscribe();
        // The sender lives in `self`, so this only ends once the depth hits zero
        let _ = depth.wait_for(|d| *d == 0).await;
    }

    /// Stop the worker and discard whatever is still queued.
    pub fn shutdown(&self) {
        if !self.worker.is_finished() {
            let dropped = *self.depth.borrow();
            info!("[GeocodeResolver] shutting down, discarding {} pending request(s)", dropped);
        }
        self.worker.abort();
        self.depth.send_replace(0);
    }

    fn already_resolved(&self, coordinate: Coordinate, slot: Slot) -> bool {
        let book = self.addresses.borrow();
        let current = book.get(slot);
        if !current.is_resolved() {
            return false;
        }
        if slot.is_static() || !self.refresh_current {
            return true;
        }
        current
            .coordinate
            .map_or(false, |c| cache_key(&c) == cache_key(&coordinate))
    }
}

impl Drop for GeocodeResolver {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

struct Worker {
    geocoder: Arc<dyn ReverseGeocoder>,
    cache: AddressCache,
    addresses: Arc<watch::Sender<AddressBook>>,
    depth: Arc<watch::Sender<usize>>,
    delay: Duration,
}

/// Worker loop: idle on `recv`, drain one request at a time.
async fn drain_queue(mut requests: mpsc::UnboundedReceiver<GeocodeRequest>, worker: Worker) {
    debug!("[GeocodeResolver] worker started (delay {:?})", worker.delay);
    let mut processed: u64 = 0;

    while let Some(request) = requests.recv().await {
        let start = Instant::now();
        let outcome = worker.resolve(request).await;
        processed += 1;

        debug!(
            "[GeocodeResolver] #{} {} ({:.4}, {:.4}) -> {:?} in {:?}",
            processed,
            request.slot,
            request.coordinate.lat,
            request.coordinate.lng,
            outcome,
            start.elapsed()
        );

        tokio::time::sleep(worker.delay).await;
        worker.depth.send_modify(|d| *d = d.saturating_sub(1));
    }

    debug!("[GeocodeResolver] queue closed after {} request(s)", processed);
}

impl Worker {
    async fn resolve(&self, request: GeocodeRequest) -> Resolution {
        let GeocodeRequest { coordinate, slot } = request;

        // Raw coordinate first so the slot is never blank while we wait
        self.addresses
            .send_modify(|book| book.set(slot, SlotAddress::fallback(coordinate)));

        if let Some(address) = self.cache.get(&coordinate) {
            self.addresses
                .send_modify(|book| book.set(slot, SlotAddress::resolved(coordinate, address)));
            return Resolution::Cached;
        }

        match self.geocoder.reverse_geocode(coordinate).await {
            Ok(response) => match response.resolved_address() {
                Some(address) => {
                    self.cache.put(&coordinate, address);
                    self.addresses
                        .send_modify(|book| book.set(slot, SlotAddress::resolved(coordinate, address)));
                    Resolution::Resolved
                }
                None => {
                    warn!(
                        "[GeocodeResolver] no address for {} at {} (status {:?})",
                        slot,
                        coordinate.display_label(),
                        response.status
                    );
                    Resolution::Miss
                }
            },
            Err(GeocodeError::Unavailable) => Resolution::Unavailable,
            Err(e) => {
                warn!("[GeocodeResolver] lookup failed for {}: {}", slot, e);
                Resolution::Failed
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Provider double that answers from a script and records every call.
    #[derive(Default)]
    pub(crate) struct ScriptedGeocoder {
        answers: Mutex<HashMap<String, GeocodeResponse>>,
        calls: Mutex<Vec<(Coordinate, Instant)>>,
        latency: Duration,
    }

    impl ScriptedGeocoder {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_latency(latency: Duration) -> Self {
            Self {
                latency,
                ..Self::default()
            }
        }

        pub(crate) fn answer(&self, coordinate: Coordinate, response: GeocodeResponse) {
            self.answers.lock().insert(cache_key(&coordinate), response);
        }

        pub(crate) fn calls(&self) -> Vec<(Coordinate, Instant)> {
            self.calls.lock().clone()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl ReverseGeocoder for ScriptedGeocoder {
        fn reverse_geocode(&self, coordinate: Coordinate) -> BoxFuture<'_, Result<GeocodeResponse, GeocodeError>> {
            Box::pin(async move {
                self.calls.lock().push((coordinate, Instant::now()));
                if !self.latency.is_zero() {
                    tokio::time::sleep(self.latency).await;
                }
                Ok(self
                    .answers
                    .lock()
                    .get(&cache_key(&coordinate))
                    .cloned()
                    .unwrap_or_else(GeocodeResponse::no_match))
            })
        }
    }

    fn fast_config() -> TrackerConfig {
        TrackerConfig {
            inter_request_delay_ms: 5,
            ..TrackerConfig::default()
        }
    }

    fn mg_road() -> Coordinate {
        Coordinate::new(12.9757, 77.6055)
    }

    #[test]
    fn test_resolved_address_requires_ok_and_text() {
        assert_eq!(GeocodeResponse::ok("MG Road").resolved_address(), Some("MG Road"));
        assert_eq!(GeocodeResponse::ok("  ").resolved_address(), None);
        assert_eq!(GeocodeResponse::no_match().resolved_address(), None);

        let denied = GeocodeResponse {
            status: GeocodeStatus::from("REQUEST_DENIED"),
            formatted_address: Some("ignored".to_string()),
        };
        assert_eq!(denied.resolved_address(), None);
        assert_eq!(GeocodeStatus::from("NEW_STATUS"), GeocodeStatus::Other("NEW_STATUS".to_string()));
    }

    #[tokio::test]
    async fn test_resolves_and_caches() {
        let geocoder = Arc::new(ScriptedGeocoder::new());
        geocoder.answer(mg_road(), GeocodeResponse::ok("MG Road, Bengaluru"));
        let cache = AddressCache::new();

        let resolver = GeocodeResolver::spawn(&fast_config(), cache.clone(), geocoder.clone());
        assert!(resolver.request_resolution(mg_road(), Slot::Pickup));
        resolver.wait_idle().await;

        let book = resolver.addresses().borrow().clone();
        assert_eq!(book.label(Slot::Pickup), "MG Road, Bengaluru");
        assert!(book.pickup.is_resolved());
        assert_eq!(cache.get(&mg_road()).as_deref(), Some("MG Road, Bengaluru"));
        assert_eq!(geocoder.call_count(), 1);
        assert_eq!(resolver.state(), ResolverState::Idle);
    }

    #[tokio::test]
    async fn test_same_cell_resolved_once() {
        let geocoder = Arc::new(ScriptedGeocoder::new());
        geocoder.answer(mg_road(), GeocodeResponse::ok("MG Road, Bengaluru"));
        let cache = AddressCache::new();

        let resolver = GeocodeResolver::spawn(&fast_config(), cache.clone(), geocoder.clone());
        resolver.request_resolution(mg_road(), Slot::Pickup);
        // different slot, same quantized coordinate: queued before the first finishes
        resolver.request_resolution(Coordinate::new(12.97570001, 77.60550001), Slot::Drop);
        resolver.wait_idle().await;

        let book = resolver.addresses().borrow().clone();
        assert_eq!(book.label(Slot::Pickup), "MG Road, Bengaluru");
        assert_eq!(book.label(Slot::Drop), "MG Road, Bengaluru");
        assert_eq!(geocoder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fifo_order_with_spacing() {
        let geocoder = Arc::new(ScriptedGeocoder::new());
        let resolver = GeocodeResolver::spawn(&TrackerConfig::default(), AddressCache::new(), geocoder.clone());

        let coords = [
            Coordinate::new(12.90, 77.50),
            Coordinate::new(12.91, 77.51),
            Coordinate::new(12.92, 77.52),
        ];
        resolver.request_resolution(coords[0], Slot::Pickup);
        resolver.request_resolution(coords[1], Slot::Drop);
        resolver.request_resolution(coords[2], Slot::Current);
        assert_eq!(resolver.state(), ResolverState::Draining);
        resolver.wait_idle().await;

        let calls = geocoder.calls();
        let order: Vec<Coordinate> = calls.iter().map(|(c, _)| *c).collect();
        assert_eq!(order, coords.to_vec());
        for pair in calls.windows(2) {
            let gap = pair[1].1.duration_since(pair[0].1);
            assert!(gap >= Duration::from_millis(100), "gap was {:?}", gap);
        }
    }

    #[tokio::test]
    async fn test_miss_leaves_coordinate_fallback() {
        let geocoder = Arc::new(ScriptedGeocoder::new());
        let cache = AddressCache::new();
        let resolver = GeocodeResolver::spawn(&fast_config(), cache.clone(), geocoder.clone());

        let c = Coordinate::new(12.97164, 77.59458);
        resolver.request_resolution(c, Slot::Current);
        resolver.wait_idle().await;

        let book = resolver.addresses().borrow().clone();
        assert_eq!(book.label(Slot::Current), "12.9716, 77.5946");
        assert_eq!(book.current.state, AddressState::Fallback);
        assert!(cache.is_empty());

        // a fallback is not a resolution, so it may be retried
        assert!(resolver.request_resolution(c, Slot::Current));
        resolver.wait_idle().await;
        assert_eq!(geocoder.call_count(), 2);
    }

    #[tokio::test]
    async fn test_offline_provider_degrades_to_coordinates() {
        let resolver = GeocodeResolver::spawn(&fast_config(), AddressCache::new(), Arc::new(OfflineGeocoder));
        resolver.request_resolution(mg_road(), Slot::Office);
        resolver.wait_idle().await;

        assert_eq!(resolver.addresses().borrow().label(Slot::Office), "12.9757, 77.6055");
    }

    #[tokio::test]
    async fn test_resolved_slot_is_not_requeued() {
        let geocoder = Arc::new(ScriptedGeocoder::new());
        geocoder.answer(mg_road(), GeocodeResponse::ok("MG Road, Bengaluru"));
        let resolver = GeocodeResolver::spawn(&fast_config(), AddressCache::new(), geocoder.clone());

        resolver.request_resolution(mg_road(), Slot::Current);
        resolver.wait_idle().await;

        assert!(!resolver.request_resolution(Coordinate::new(13.0, 77.7), Slot::Current));
        assert!(!resolver.request_resolution(mg_road(), Slot::Current));
        assert_eq!(resolver.pending(), 0);
        assert_eq!(geocoder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_current_follows_the_vehicle() {
        let geocoder = Arc::new(ScriptedGeocoder::new());
        geocoder.answer(mg_road(), GeocodeResponse::ok("MG Road, Bengaluru"));
        let config = TrackerConfig {
            refresh_current_address: true,
            ..fast_config()
        };
        let resolver = GeocodeResolver::spawn(&config, AddressCache::new(), geocoder.clone());

        resolver.request_resolution(mg_road(), Slot::Current);
        resolver.wait_idle().await;

        // same cell stays put, a new cell is looked up
        assert!(!resolver.request_resolution(mg_road(), Slot::Current));
        assert!(resolver.request_resolution(Coordinate::new(13.0, 77.7), Slot::Current));
        resolver.wait_idle().await;
        assert_eq!(geocoder.call_count(), 2);

        // static slots are never refreshed
        resolver.publish(Slot::Pickup, mg_road(), "Pinned");
        assert!(!resolver.request_resolution(Coordinate::new(13.0, 77.7), Slot::Pickup));
    }

    #[tokio::test]
    async fn test_coordinate_shown_while_lookup_in_flight() {
        let geocoder = Arc::new(ScriptedGeocoder::with_latency(Duration::from_millis(200)));
        geocoder.answer(mg_road(), GeocodeResponse::ok("MG Road, Bengaluru"));
        let resolver = GeocodeResolver::spawn(&fast_config(), AddressCache::new(), geocoder.clone());

        resolver.request_resolution(mg_road(), Slot::Current);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let waiting = resolver.addresses().borrow().current.clone();
        assert_eq!(geocoder.call_count(), 1);
        assert_eq!(waiting.state, AddressState::Fallback);
        assert_eq!(waiting.label, "12.9757, 77.6055");
        assert_eq!(waiting.coordinate, Some(mg_road()));

        resolver.wait_idle().await;
        assert_eq!(resolver.addresses().borrow().label(Slot::Current), "MG Road, Bengaluru");
    }

    #[tokio::test]
    async fn test_publications_follow_queue_order() {
        let geocoder = Arc::new(ScriptedGeocoder::with_latency(Duration::from_millis(20)));
        let requests = [
            (Coordinate::new(12.90, 77.50), Slot::Drop, "Drop Point"),
            (Coordinate::new(12.91, 77.51), Slot::Pickup, "Pickup Point"),
            (Coordinate::new(12.92, 77.52), Slot::Office, "Office Gate"),
            (Coordinate::new(12.93, 77.53), Slot::Current, "Current Spot"),
        ];
        for (coordinate, _, address) in requests {
            geocoder.answer(coordinate, GeocodeResponse::ok(address));
        }
        let resolver = GeocodeResolver::spawn(&fast_config(), AddressCache::new(), geocoder.clone());

        let mut rx = resolver.addresses();
        let recorder = tokio::spawn(async move {
            let mut fallbacks = Vec::new();
            let mut resolved = Vec::new();
            while resolved.len() < 4 && rx.changed().await.is_ok() {
                let book = rx.borrow_and_update().clone();
                for slot in Slot::ALL {
                    let entry = book.get(slot);
                    if entry.state == AddressState::Fallback && !fallbacks.contains(&slot) {
                        fallbacks.push(slot);
                    }
                    if entry.is_resolved() && !resolved.contains(&slot) {
                        resolved.push(slot);
                    }
                }
            }
            (fallbacks, resolved)
        });

        for (coordinate, slot, _) in requests {
            resolver.request_resolution(coordinate, slot);
        }
        resolver.wait_idle().await;

        let (fallbacks, resolved) = recorder.await.unwrap();
        let queued: Vec<Slot> = requests.iter().map(|(_, slot, _)| *slot).collect();
        assert_eq!(fallbacks, queued);
        assert_eq!(resolved, queued);
    }

    #[tokio::test]
    async fn test_try_spawn_inside_runtime() {
        let resolver = GeocodeResolver::try_spawn(&fast_config(), AddressCache::new(), Arc::new(OfflineGeocoder));
        assert!(resolver.is_ok());
    }

    #[test]
    fn test_try_spawn_without_runtime() {
        let resolver = GeocodeResolver::try_spawn(&fast_config(), AddressCache::new(), Arc::new(OfflineGeocoder));
        assert!(resolver.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_discards_queue() {
        let geocoder = Arc::new(ScriptedGeocoder::with_latency(Duration::from_millis(50)));
        geocoder.answer(mg_road(), GeocodeResponse::ok("MG Road, Bengaluru"));
        let resolver = GeocodeResolver::spawn(&TrackerConfig::default(), AddressCache::new(), geocoder.clone());
        let addresses = resolver.addresses();

        resolver.request_resolution(mg_road(), Slot::Pickup);
        resolver.request_resolution(Coordinate::new(13.0, 77.7), Slot::Drop);
        tokio::time::sleep(Duration::from_millis(10)).await;
        resolver.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(geocoder.call_count(), 1);
        assert_eq!(resolver.state(), ResolverState::Idle);
        // the in-flight answer was never applied
        assert!(!addresses.borrow().pickup.is_resolved());
        assert_eq!(addresses.borrow().drop.state, AddressState::Pending);
        assert!(!resolver.request_resolution(mg_road(), Slot::Pickup));
    }
}
