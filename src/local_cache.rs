//! Client-side cache kept consistent with batch results.
//!
//! The batch engine only writes through [`LocalCache::invalidate_or_update`];
//! implementations must handle their own locking because one cache is shared
//! by every batch and single-key call of a client.
//!
//! [`MemoryLocalCache`] is a size-bounded map with oldest-first eviction.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::directory::Destination;

/// Default maximum local cache size (64 MiB).
pub const DEFAULT_LOCAL_CACHE_MAX_SIZE: usize = 64 * 1024 * 1024;

/// Default usage ratio above which a warning is logged.
pub const DEFAULT_WARNING_RATE: f64 = 0.9;

/// Bookkeeping bytes charged per entry on top of key and value.
pub const ENTRY_OVERHEAD: usize = 64;

/// An encoded value with its version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    /// Version token reported by the server.
    pub cache_id: u64,
    /// Encoded value bytes.
    pub data: Bytes,
}

impl CachedValue {
    /// Create a cached value.
    pub fn new(cache_id: u64, data: Bytes) -> Self {
        Self { cache_id, data }
    }
}

/// Write-side interface used by the batch engine.
pub trait LocalCache: Send + Sync {
    /// Store `value` for the key, or drop the entry when `value` is `None`.
    fn invalidate_or_update(
        &self,
        destination: &Destination,
        group_id: u32,
        key: &str,
        value: Option<CachedValue>,
    );
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    destination: Destination,
    group_id: u32,
    key: String,
}

impl CacheKey {
    fn new(destination: &Destination, group_id: u32, key: &str) -> Self {
        Self {
            destination: destination.clone(),
            group_id,
            key: key.to_string(),
        }
    }

    fn charge(&self, value: &CachedValue) -> usize {
        self.key.len() + value.data.len() + ENTRY_OVERHEAD
    }
}

#[derive(Debug)]
struct Slot {
    value: CachedValue,
    seq: u64,
    size: usize,
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<CacheKey, Slot>,
    /// Insertion sequence -> key, oldest first.
    order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
    size: usize,
    max_size: usize,
    warning_rate: f64,
    warned: bool,
}

impl Inner {
    fn remove(&mut self, key: &CacheKey) -> Option<Slot> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        self.size -= slot.size;
        Some(slot)
    }

    fn evict_to(&mut self, target: usize) {
        while self.size > target {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            if let Some(slot) = self.entries.remove(&oldest) {
                self.size -= slot.size;
            }
        }
    }

    fn insert(&mut self, key: CacheKey, value: CachedValue) {
        self.remove(&key);
        let size = key.charge(&value);
        if size > self.max_size {
            tracing::debug!(
                "Local cache entry of {} bytes exceeds max size {}, not cached",
                size,
                self.max_size
            );
            return;
        }
        self.evict_to(self.max_size - size);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(key, Slot { value, seq, size });
        self.size += size;
        self.check_pressure();
    }

    fn check_pressure(&mut self) {
        let threshold = (self.max_size as f64 * self.warning_rate) as usize;
        if self.size > threshold {
            if !self.warned {
                tracing::warn!(
                    "Local cache usage {} bytes crossed {}% of max size {}",
                    self.size,
                    (self.warning_rate * 100.0) as u32,
                    self.max_size
                );
                self.warned = true;
            }
        } else {
            self.warned = false;
        }
    }
}

/// Size-bounded in-memory local cache.
#[derive(Debug)]
pub struct MemoryLocalCache {
    inner: Mutex<Inner>,
}

impl MemoryLocalCache {
    /// Create a cache holding at most `max_size` accounted bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
                size: 0,
                max_size,
                warning_rate: DEFAULT_WARNING_RATE,
                warned: false,
            }),
        }
    }

    /// Look up a cached value.
    pub fn get(&self, destination: &Destination, group_id: u32, key: &str) -> Option<CachedValue> {
        let inner = self.inner.lock();
        inner
            .entries
            .get(&CacheKey::new(destination, group_id, key))
            .map(|slot| slot.value.clone())
    }

    /// Store a value.
    pub fn put(&self, destination: &Destination, group_id: u32, key: &str, value: CachedValue) {
        self.inner
            .lock()
            .insert(CacheKey::new(destination, group_id, key), value);
    }

    /// Drop an entry. Returns whether one existed.
    pub fn remove(&self, destination: &Destination, group_id: u32, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.remove(&CacheKey::new(destination, group_id, key)).is_some();
        inner.check_pressure();
        removed
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Accounted size in bytes.
    pub fn size(&self) -> usize {
        self.inner.lock().size
    }

    /// Maximum accounted size in bytes.
    pub fn max_size(&self) -> usize {
        self.inner.lock().max_size
    }

    /// Change the maximum size, evicting oldest entries if needed.
    pub fn set_max_size(&self, max_size: usize) {
        let mut inner = self.inner.lock();
        inner.max_size = max_size;
        inner.evict_to(max_size);
        inner.check_pressure();
    }

    /// Usage ratio above which a warning is logged.
    pub fn warning_rate(&self) -> f64 {
        self.inner.lock().warning_rate
    }

    /// Set the warning ratio; values are clamped to `0.0..=1.0`.
    pub fn set_warning_rate(&self, rate: f64) {
        let mut inner = self.inner.lock();
        inner.warning_rate = rate.clamp(0.0, 1.0);
        inner.check_pressure();
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.size = 0;
        inner.warned = false;
    }
}

impl Default for MemoryLocalCache {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_CACHE_MAX_SIZE)
    }
}

impl LocalCache for MemoryLocalCache {
    fn invalidate_or_update(
        &self,
        destination: &Destination,
        group_id: u32,
        key: &str,
        value: Option<CachedValue>,
    ) {
        match value {
            Some(value) => self.put(destination, group_id, key, value),
            None => {
                self.remove(destination, group_id, key);
            }
        }
    }
}
