//! Per-channel symbol counters.
//!
//! ## Persistence
//!
//! Each channel's counts are one durable record keyed `counters_<channel>`.
//! Every mutation is written through immediately; there is no batching.
//!
//! ## Caching
//!
//! Reads go through a bounded LRU cache. Every cached value is written
//! through before `increment` or `reset` returns, so evicting an entry is
//! always safe and a cold start always reads durable state. The cache lock
//! is never held across storage I/O, so a slow write for one channel does
//! not stall the others.
//!
//! ## Failure semantics
//!
//! A missing, unreadable, or corrupt record reads as all-zero counts. Write
//! failures are logged; the cached value keeps the mutation for the
//! lifetime of the process.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::store::DurableStorage;
use crate::types::{ChannelId, Suit, SymbolCounts};

/// Key prefix for counter records.
pub const COUNTER_KEY_PREFIX: &str = "counters_";

/// Default number of channels kept in the read cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Storage key for a channel's counters.
pub fn counter_key(channel: ChannelId) -> String {
    format!("{}{}", COUNTER_KEY_PREFIX, channel)
}

/// Durable per-channel counters with a write-through cache.
pub struct CounterStore {
    storage: Arc<dyn DurableStorage>,
    cache: Mutex<LruCache<ChannelId, SymbolCounts>>,
}

impl CounterStore {
    /// Create a store with the default cache capacity.
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self::with_capacity(storage, DEFAULT_CACHE_CAPACITY)
    }

    /// Create a store caching at most `capacity` channels (minimum 1).
    pub fn with_capacity(storage: Arc<dyn DurableStorage>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            storage,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Current counts for a channel. Unknown channels read as all-zero.
    pub fn get(&self, channel: ChannelId) -> SymbolCounts {
        if let Some(counts) = self.cache.lock().get(&channel) {
            return *counts;
        }
        let loaded = self.load(channel);
        *self.cache.lock().get_or_insert(channel, || loaded)
    }

    /// Add `amount` to `suit` for `channel`, persist, and return the updated
    /// counts.
    ///
    /// Callers only invoke this after finding at least one occurrence, so
    /// `amount` is expected to be at least 1. Writes for one channel must be
    /// serialized by the caller; the store-wide cache lock is not held
    /// during storage I/O.
    pub fn increment(&self, channel: ChannelId, suit: Suit, amount: u64) -> SymbolCounts {
        debug_assert!(amount >= 1, "increment called with zero amount");

        let current = self.get(channel);
        let counts = {
            let mut cache = self.cache.lock();
            let mut counts = cache.get(&channel).copied().unwrap_or(current);
            counts.add(suit, amount);
            cache.put(channel, counts);
            counts
        };
        self.persist(channel, &counts);

        debug!(channel = %channel, suit = %suit, amount, total = counts.get(suit), "Counter incremented");
        counts
    }

    /// Zero every suit for `channel` and persist.
    pub fn reset(&self, channel: ChannelId) {
        let counts = SymbolCounts::zero();
        self.cache.lock().put(channel, counts);
        self.persist(channel, &counts);
        debug!(channel = %channel, "Counters reset");
    }

    /// Every channel that has a durable counter record.
    pub fn channels(&self) -> Vec<ChannelId> {
        let keys = match self.storage.keys(COUNTER_KEY_PREFIX) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list counter records");
                return Vec::new();
            }
        };

        let mut channels: Vec<ChannelId> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(COUNTER_KEY_PREFIX))
            .filter_map(|raw| ChannelId::from_str(raw).ok())
            .collect();
        channels.sort();
        channels
    }

    /// Counts for every stored channel, ordered by channel id.
    pub fn snapshot(&self) -> Vec<(ChannelId, SymbolCounts)> {
        self.channels()
            .into_iter()
            .map(|channel| (channel, self.get(channel)))
            .collect()
    }

    fn load(&self, channel: ChannelId) -> SymbolCounts {
        let key = counter_key(channel);
        match self.storage.load(&key) {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(channel = %channel, error = %e, "Malformed counter record, using defaults");
                SymbolCounts::zero()
            }),
            Ok(None) => SymbolCounts::zero(),
            Err(e) => {
                warn!(channel = %channel, error = %e, "Unreadable counter record, using defaults");
                SymbolCounts::zero()
            }
        }
    }

    fn persist(&self, channel: ChannelId, counts: &SymbolCounts) {
        let key = counter_key(channel);
        let result = serde_json::to_value(counts)
            .map_err(|e| e.to_string())
            .and_then(|value| self.storage.save(&key, &value).map_err(|e| e.to_string()));
        if let Err(e) = result {
            error!(channel = %channel, error = %e, "Failed to persist counters");
        }
    }
}

impl std::fmt::Debug for CounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterStore")
            .field("cached_channels", &self.cache.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStorage, StorageError};
    use proptest::prelude::*;
    use std::thread;
    use std::time::{Duration, Instant};

    fn store() -> (Arc<InMemoryStorage>, CounterStore) {
        let storage = Arc::new(InMemoryStorage::new());
        let counters = CounterStore::new(storage.clone());
        (storage, counters)
    }

    #[test]
    fn test_unknown_channel_is_all_zero() {
        let (_, counters) = store();
        assert_eq!(counters.get(ChannelId::new(-100)), SymbolCounts::zero());
    }

    #[test]
    fn test_increment_persists_immediately() {
        let (storage, counters) = store();
        let channel = ChannelId::new(-100);

        let updated = counters.increment(channel, Suit::Hearts, 2);
        assert_eq!(updated.get(Suit::Hearts), 2);

        let raw = storage.raw("counters_-100").unwrap();
        let stored: SymbolCounts = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.get(Suit::Hearts), 2);
    }

    #[test]
    fn test_cold_start_reads_durable_state() {
        let storage = Arc::new(InMemoryStorage::new());
        let channel = ChannelId::new(7);
        {
            let counters = CounterStore::new(storage.clone());
            counters.increment(channel, Suit::Clubs, 4);
        }
        let counters = CounterStore::new(storage);
        assert_eq!(counters.get(channel).get(Suit::Clubs), 4);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let (_, counters) = store();
        let channel = ChannelId::new(1);
        counters.increment(channel, Suit::Spades, 3);
        counters.increment(channel, Suit::Diamonds, 1);

        counters.reset(channel);
        assert!(counters.get(channel).is_empty());
    }

    #[test]
    fn test_corrupt_record_reads_as_default_and_is_replaced() {
        let (storage, counters) = store();
        let channel = ChannelId::new(5);
        storage.insert_raw("counters_5", "{oops");

        assert!(counters.get(channel).is_empty());

        counters.increment(channel, Suit::Hearts, 1);
        let stored: SymbolCounts =
            serde_json::from_str(&storage.raw("counters_5").unwrap()).unwrap();
        assert_eq!(stored.get(Suit::Hearts), 1);
    }

    #[test]
    fn test_wrong_shape_record_reads_as_default() {
        let (storage, counters) = store();
        storage.insert_raw("counters_5", "[1, 2, 3]");
        assert!(counters.get(ChannelId::new(5)).is_empty());
    }

    #[test]
    fn test_eviction_falls_back_to_storage() {
        let storage = Arc::new(InMemoryStorage::new());
        let counters = CounterStore::with_capacity(storage, 1);
        let a = ChannelId::new(1);
        let b = ChannelId::new(2);

        counters.increment(a, Suit::Hearts, 1);
        counters.increment(b, Suit::Hearts, 5);
        counters.increment(a, Suit::Hearts, 1);

        assert_eq!(counters.get(a).get(Suit::Hearts), 2);
        assert_eq!(counters.get(b).get(Suit::Hearts), 5);
    }

    /// Storage whose writes to one key take a long time.
    struct SlowWrites {
        inner: InMemoryStorage,
        slow_key: &'static str,
        delay: Duration,
    }

    impl DurableStorage for SlowWrites {
        fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
            self.inner.load(key)
        }

        fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError> {
            if key == self.slow_key {
                thread::sleep(self.delay);
            }
            self.inner.save(key, value)
        }

        fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.keys(prefix)
        }
    }

    #[test]
    fn test_slow_write_does_not_block_other_channels() {
        let storage = Arc::new(SlowWrites {
            inner: InMemoryStorage::new(),
            slow_key: "counters_1",
            delay: Duration::from_millis(800),
        });
        let counters = Arc::new(CounterStore::new(storage));
        let slow = ChannelId::new(1);
        let other = ChannelId::new(2);

        let writer = {
            let counters = Arc::clone(&counters);
            thread::spawn(move || counters.increment(slow, Suit::Hearts, 1))
        };
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        counters.increment(other, Suit::Spades, 2);
        let read = counters.get(other);
        let waited = start.elapsed();

        assert_eq!(read.get(Suit::Spades), 2);
        assert!(
            waited < Duration::from_millis(200),
            "channel 2 waited {:?} behind channel 1's write",
            waited
        );

        let written = writer.join().unwrap();
        assert_eq!(written.get(Suit::Hearts), 1);
        assert_eq!(counters.get(slow).get(Suit::Hearts), 1);
    }

    #[test]
    fn test_channels_lists_stored_records() {
        let (storage, counters) = store();
        counters.increment(ChannelId::new(-1002), Suit::Hearts, 1);
        counters.reset(ChannelId::new(33));
        storage.insert_raw("counters_not-a-number", "{}");

        assert_eq!(
            counters.channels(),
            vec![ChannelId::new(-1002), ChannelId::new(33)]
        );
        assert_eq!(counters.snapshot().len(), 2);
    }

    proptest! {
        #[test]
        fn prop_increment_only_touches_one_suit(
            prior in proptest::collection::vec(1u64..50, 4),
            suit_idx in 0usize..4,
            amount in 1u64..1000,
        ) {
            let (_, counters) = store();
            let channel = ChannelId::new(42);
            for (suit, n) in Suit::ALL.into_iter().zip(prior.iter()) {
                counters.increment(channel, suit, *n);
            }
            let before = counters.get(channel);
            let target = Suit::ALL[suit_idx];

            let after = counters.increment(channel, target, amount);

            for suit in Suit::ALL {
                let expected = if suit == target {
                    before.get(suit) + amount
                } else {
                    before.get(suit)
                };
                prop_assert_eq!(after.get(suit), expected);
            }
            prop_assert_eq!(counters.get(channel), after);
        }

        #[test]
        fn prop_reset_always_yields_zero(
            amounts in proptest::collection::vec((0usize..4, 1u64..100), 0..20),
        ) {
            let (_, counters) = store();
            let channel = ChannelId::new(-9);
            for (idx, n) in amounts {
                counters.increment(channel, Suit::ALL[idx], n);
            }
            counters.reset(channel);
            prop_assert!(counters.get(channel).is_empty());
        }
    }
}
