//! Session-scoped address cache.
//!
//! Maps a coordinate quantized to [`CACHE_KEY_PRECISION`] decimals (~11 cm)
//! to the address the provider returned for it. Two fixes that land in the
//! same quantization cell share one entry, which coalesces GPS jitter into a
//! single lookup.
//!
//! Entries are never evicted or rewritten with a different meaning: the cache
//! lives as long as the session store behind it. The store is injected so the
//! host decides its scope (typically wider than a single tracking session,
//! letting a later session over the same trip skip the network entirely).

use crate::Coordinate;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Decimal places kept when quantizing a coordinate into a cache key.
pub const CACHE_KEY_PRECISION: usize = 6;

/// Key under which a coordinate's address is stored.
///
/// ```
/// use live_tracker::{Coordinate, cache::cache_key};
/// assert_eq!(cache_key(&Coordinate::new(12.9716, 77.5946)), "addr_12.971600_77.594600");
/// ```
pub fn cache_key(coordinate: &Coordinate) -> String {
    format!(
        "addr_{:.prec$}_{:.prec$}",
        coordinate.lat,
        coordinate.lng,
        prec = CACHE_KEY_PRECISION
    )
}

/// String key/value store that outlives a single tracking session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Hit/miss counters for an [`AddressCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Address cache over an injected [`SessionStore`].
///
/// Cloning is cheap and every clone sees the same entries and counters.
#[derive(Clone)]
pub struct AddressCache {
    store: Arc<dyn SessionStore>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl AddressCache {
    /// Cache backed by a fresh [`MemorySessionStore`].
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemorySessionStore::new()))
    }

    pub fn with_store(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Look up the address for `coordinate`'s quantization cell.
    pub fn get(&self, coordinate: &Coordinate) -> Option<String> {
        match self.store.get(&cache_key(coordinate)) {
            Some(address) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(address)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Record `address` for `coordinate`'s quantization cell.
    ///
    /// Blank addresses are ignored.
    pub fn put(&self, coordinate: &Coordinate, address: &str) {
        if address.trim().is_empty() {
            return;
        }
        self.store.set(&cache_key(coordinate), address.to_string());
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.store.len(),
        }
    }
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AddressCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressCache").field("stats", &self.stats()).finish()
    }
}
