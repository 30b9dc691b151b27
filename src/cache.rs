/// Bounded in-memory caches shared by the chain client and the network
/// statistics collectors.
///
/// Entries are value-only: readers always receive clones, never references
/// into the cache. Eviction runs opportunistically on writes.
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() > ttl
    }
}

struct LruInner<K, V> {
    map: HashMap<K, CacheEntry<V>>,
    order: VecDeque<K>,
}

/// Size-capped LRU cache with an optional time-to-live.
pub struct LruCache<K, V> {
    inner: Mutex<LruInner<K, V>>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            ttl: None,
        }
    }

    pub fn with_ttl(capacity: usize, ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::new(capacity)
        }
    }

    /// Fetch a fresh entry, promoting it to most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().unwrap();
        let expired = match inner.map.get(key) {
            Some(entry) => self.ttl.map(|ttl| entry.is_expired(ttl)).unwrap_or(false),
            None => return None,
        };
        if expired {
            inner.map.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }
        inner.order.retain(|k| k != key);
        inner.order.push_back(key.clone());
        inner.map.get(key).map(|e| e.value.clone())
    }

    /// Insert, evicting the least recently used entries over capacity.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock().unwrap();
        if inner.map.insert(key.clone(), CacheEntry::new(value)).is_some() {
            inner.order.retain(|k| k != &key);
        }
        inner.order.push_back(key);
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.map.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-value cache with a fixed TTL, used per stats endpoint.
///
/// A stale value is kept around after expiry so callers can fall back to it
/// when a refresh fails; `store` is the only place the freshness stamp moves.
pub struct TtlSlot<V> {
    slot: Mutex<Option<CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlSlot<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
        }
    }

    /// The cached value, only while still fresh.
    pub fn fresh(&self) -> Option<V> {
        let slot = self.slot.lock().unwrap();
        slot.as_ref()
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| entry.value.clone())
    }

    /// The cached value regardless of age.
    pub fn stale(&self) -> Option<V> {
        let slot = self.slot.lock().unwrap();
        slot.as_ref().map(|entry| entry.value.clone())
    }

    pub fn store(&self, value: V) {
        let mut slot = self.slot.lock().unwrap();
        *slot = Some(CacheEntry::new(value));
    }
}
