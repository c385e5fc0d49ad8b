//! # Dedup Cache
//!
//! Bounded set of ceremony keys that are being handled or were handled.
//!
//! ## Design
//!
//! - `contains` is the cheap pre-dispatch check used by the producer
//! - `try_reserve` is the authoritative check at verification start: only one
//!   task can hold a key at a time
//! - Keys held by a running verification live apart from processed keys and
//!   are never evicted. Their number is bounded by the admission semaphore.
//! - Processed keys sit in an LRU. At capacity, marking one more key processed
//!   evicts exactly the least recently processed key.

use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default maximum number of cached keys.
pub const DEFAULT_MAX_CACHED_KEYS: usize = 500;

#[derive(Debug)]
struct Entries {
    /// Keys retained as permanently handled.
    processed: LruCache<String, ()>,
    /// Keys owned by a live reservation, tagged with its generation.
    in_flight: HashMap<String, u64>,
    next_generation: u64,
}

/// Thread-safe bounded key set.
#[derive(Debug)]
pub struct DedupCache {
    entries: Mutex<Entries>,
    capacity: NonZeroUsize,
}

impl DedupCache {
    /// Create a cache retaining at most `capacity` processed keys (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(Entries {
                processed: LruCache::new(capacity),
                in_flight: HashMap::new(),
                next_generation: 0,
            }),
            capacity,
        }
    }

    /// Create a cache wrapped in Arc for shared ownership.
    pub fn new_shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    /// Whether the key is cached. Does not mutate, not even LRU order.
    pub fn contains(&self, key: &str) -> bool {
        let entries = self.entries.lock();
        entries.in_flight.contains_key(key) || entries.processed.contains(key)
    }

    /// Take ownership of the key if nobody holds or handled it.
    ///
    /// Returns a [`Reservation`] on success, `None` if another task already
    /// holds (or already handled) the key.
    pub fn try_reserve(self: &Arc<Self>, key: &str) -> Option<Reservation> {
        let mut entries = self.entries.lock();
        if entries.in_flight.contains_key(key) || entries.processed.contains(key) {
            return None;
        }
        let generation = entries.next_generation;
        entries.next_generation = entries.next_generation.wrapping_add(1);
        entries.in_flight.insert(key.to_string(), generation);

        Some(Reservation {
            cache: Arc::clone(self),
            key: key.to_string(),
            generation,
            processed: false,
        })
    }

    /// Remove the key, whether processed or in flight.
    pub fn release(&self, key: &str) {
        let mut entries = self.entries.lock();
        entries.in_flight.remove(key);
        entries.processed.pop(key);
    }

    /// Number of cached keys, in flight included.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock();
        entries.in_flight.len() + entries.processed.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of processed keys.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Number of keys currently held by a reservation.
    pub fn in_flight_len(&self) -> usize {
        self.entries.lock().in_flight.len()
    }

    fn retain(&self, key: &str, generation: u64) {
        let mut entries = self.entries.lock();
        if entries.in_flight.get(key) != Some(&generation) {
            return;
        }
        entries.in_flight.remove(key);
        if entries.processed.len() >= self.capacity.get() {
            entries.processed.pop_lru();
        }
        entries.processed.put(key.to_string(), ());
    }

    fn release_owned(&self, key: &str, generation: u64) {
        let mut entries = self.entries.lock();
        if entries.in_flight.get(key) == Some(&generation) {
            entries.in_flight.remove(key);
        }
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHED_KEYS)
    }
}

/// Ownership of one cached key for the duration of a verification.
///
/// Dropped without [`Reservation::mark_processed`] the key is released so a
/// later poll can retry it. After `mark_processed` the key stays cached.
/// A reservation only ever touches the entry it created: if the key was
/// released and reserved again meanwhile, the newer holder keeps it.
#[derive(Debug)]
pub struct Reservation {
    cache: Arc<DedupCache>,
    key: String,
    generation: u64,
    processed: bool,
}

impl Reservation {
    /// Reserved key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Keep the key cached as handled.
    pub fn mark_processed(&mut self) {
        if !self.processed {
            self.processed = true;
            self.cache.retain(&self.key, self.generation);
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.processed {
            self.cache.release_owned(&self.key, self.generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_once() {
        let cache = DedupCache::new_shared(10);
        let first = cache.try_reserve("k1");
        assert!(first.is_some());
        assert!(cache.try_reserve("k1").is_none());
        assert!(cache.contains("k1"));
    }

    #[test]
    fn test_unprocessed_reservation_released_on_drop() {
        let cache = DedupCache::new_shared(10);
        {
            let _reservation = cache.try_reserve("k1").unwrap();
        }
        assert!(!cache.contains("k1"));
        assert!(cache.try_reserve("k1").is_some());
    }

    #[test]
    fn test_processed_reservation_retained() {
        let cache = DedupCache::new_shared(10);
        {
            let mut reservation = cache.try_reserve("k1").unwrap();
            reservation.mark_processed();
        }
        assert!(cache.contains("k1"));
        assert_eq!(cache.in_flight_len(), 0);
        assert!(cache.try_reserve("k1").is_none());
    }

    #[test]
    fn test_eviction_at_capacity_drops_oldest() {
        let cache = DedupCache::new_shared(3);
        for key in ["a", "b", "c"] {
            cache.try_reserve(key).unwrap().mark_processed();
        }
        assert_eq!(cache.len(), 3);

        cache.try_reserve("d").unwrap().mark_processed();
        assert_eq!(cache.len(), 3);
        assert!(cache.contains("d"));
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let cache = DedupCache::new_shared(50);
        for i in 0..500 {
            cache.try_reserve(&format!("key-{}", i)).unwrap().mark_processed();
            assert!(cache.len() <= 50);
        }
        assert_eq!(cache.len(), 50);
    }

    #[test]
    fn test_held_key_survives_eviction() {
        let cache = DedupCache::new_shared(1);
        let first = cache.try_reserve("k").unwrap();

        cache.try_reserve("x").unwrap().mark_processed();
        cache.try_reserve("y").unwrap().mark_processed();

        assert!(cache.contains("k"));
        assert!(cache.try_reserve("k").is_none());
        assert!(!cache.contains("x"));
        drop(first);
        assert!(!cache.contains("k"));
    }

    #[test]
    fn test_stale_reservation_leaves_new_holder_alone() {
        let cache = DedupCache::new_shared(10);
        let stale = cache.try_reserve("k").unwrap();
        cache.release("k");

        let mut current = cache.try_reserve("k").unwrap();
        drop(stale);
        assert!(cache.contains("k"));
        assert!(cache.try_reserve("k").is_none());

        current.mark_processed();
        drop(current);
        assert!(cache.contains("k"));
    }

    #[test]
    fn test_stale_mark_processed_is_ignored() {
        let cache = DedupCache::new_shared(10);
        let mut stale = cache.try_reserve("k").unwrap();
        cache.release("k");
        let current = cache.try_reserve("k").unwrap();

        stale.mark_processed();
        drop(current);
        assert!(!cache.contains("k"));
    }

    #[test]
    fn test_release() {
        let cache = DedupCache::new_shared(10);
        cache.try_reserve("k1").unwrap().mark_processed();
        cache.release("k1");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache = DedupCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_concurrent_reserve_single_winner() {
        let cache = DedupCache::new_shared(100);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.try_reserve("dup").map(|mut r| {
                        r.mark_processed();
                    })
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .count();
        assert_eq!(winners, 1);
    }
}
