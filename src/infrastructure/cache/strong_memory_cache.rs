//! First cache tier: a byte-budgeted LRU of strongly held bitmaps.

use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::weak_memory_cache::WeakMemoryCache;
use crate::domain::entities::{Bitmap, CacheKey, CacheValue, TrimLevel};

/// Strongly holds recently used bitmaps within a byte budget.
///
/// Anything that leaves this tier is handed to the weak tier.
pub trait StrongMemoryCache: Send + Sync {
    fn size(&self) -> usize;

    fn max_size(&self) -> usize;

    fn get(&self, key: &CacheKey) -> Option<CacheValue>;

    fn set(&self, key: CacheKey, bitmap: Bitmap, is_sampled: bool);

    fn remove(&self, key: &CacheKey) -> bool;

    fn clear_memory(&self);

    fn trim_memory(&self, level: TrimLevel);
}

/// Strong tier with a zero budget; every value goes straight to the weak tier.
pub struct EmptyStrongMemoryCache {
    weak: Arc<dyn WeakMemoryCache>,
}

impl EmptyStrongMemoryCache {
    #[must_use]
    pub fn new(weak: Arc<dyn WeakMemoryCache>) -> Self {
        Self { weak }
    }
}

impl StrongMemoryCache for EmptyStrongMemoryCache {
    fn size(&self) -> usize {
        0
    }

    fn max_size(&self) -> usize {
        0
    }

    fn get(&self, _key: &CacheKey) -> Option<CacheValue> {
        None
    }

    fn set(&self, key: CacheKey, bitmap: Bitmap, is_sampled: bool) {
        let size = bitmap.allocation_byte_count();
        self.weak.set(key, bitmap, is_sampled, size);
    }

    fn remove(&self, _key: &CacheKey) -> bool {
        false
    }

    fn clear_memory(&self) {}

    fn trim_memory(&self, _level: TrimLevel) {}
}

struct InternalValue {
    bitmap: Bitmap,
    is_sampled: bool,
    size: usize,
}

struct StrongState {
    entries: LruCache<CacheKey, InternalValue>,
    size: usize,
}

impl StrongState {
    fn pop(&mut self, key: &CacheKey) -> Option<InternalValue> {
        let value = self.entries.pop(key)?;
        self.size -= value.size;
        Some(value)
    }

    fn trim_to_size(&mut self, max_size: usize, departed: &mut Vec<(CacheKey, InternalValue)>) {
        while self.size > max_size {
            let Some((key, value)) = self.entries.pop_lru() else {
                break;
            };
            self.size -= value.size;
            departed.push((key, value));
        }
    }
}

/// LRU strong tier. All reads and writes go through one lock.
pub struct RealStrongMemoryCache {
    max_size: usize,
    weak: Arc<dyn WeakMemoryCache>,
    state: Mutex<StrongState>,
}

impl RealStrongMemoryCache {
    #[must_use]
    pub fn new(max_size: usize, weak: Arc<dyn WeakMemoryCache>) -> Self {
        Self {
            max_size,
            weak,
            state: Mutex::new(StrongState {
                entries: LruCache::unbounded(),
                size: 0,
            }),
        }
    }

    /// Keys from most to least recently used.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Evicts least recently used entries until the size is at most `max_size`.
    pub fn trim_to_size(&self, max_size: usize) {
        let mut departed = Vec::new();
        self.state.lock().trim_to_size(max_size, &mut departed);
        self.forward(departed);
    }

    fn forward(&self, departed: Vec<(CacheKey, InternalValue)>) {
        for (key, value) in departed {
            trace!(key = %key, size = value.size, "Strong cache entry moved to weak cache");
            self.weak.set(key, value.bitmap, value.is_sampled, value.size);
        }
    }
}

impl StrongMemoryCache for RealStrongMemoryCache {
    fn size(&self) -> usize {
        self.state.lock().size
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let mut state = self.state.lock();
        state
            .entries
            .get(key)
            .map(|value| CacheValue::new(value.bitmap.clone(), value.is_sampled))
    }

    fn set(&self, key: CacheKey, bitmap: Bitmap, is_sampled: bool) {
        let size = bitmap.allocation_byte_count();
        let mut departed = Vec::new();
        {
            let mut state = self.state.lock();
            if let Some(old) = state.pop(&key) {
                departed.push((key.clone(), old));
            }
            if size <= self.max_size {
                state.entries.put(
                    key,
                    InternalValue {
                        bitmap,
                        is_sampled,
                        size,
                    },
                );
                state.size += size;
                state.trim_to_size(self.max_size, &mut departed);
            } else {
                debug!(key = %key, size, max_size = self.max_size, "Value too large for strong cache");
                departed.push((
                    key,
                    InternalValue {
                        bitmap,
                        is_sampled,
                        size,
                    },
                ));
            }
        }
        self.forward(departed);
    }

    fn remove(&self, key: &CacheKey) -> bool {
        let removed = self.state.lock().pop(key);
        match removed {
            Some(value) => {
                self.forward(vec![(key.clone(), value)]);
                true
            }
            None => false,
        }
    }

    fn clear_memory(&self) {
        let mut departed = Vec::new();
        {
            let mut state = self.state.lock();
            while let Some(entry) = state.entries.pop_lru() {
                departed.push(entry);
            }
            state.size = 0;
        }
        self.forward(departed);
    }

    fn trim_memory(&self, level: TrimLevel) {
        if level >= TrimLevel::Background {
            debug!(%level, "Clearing strong memory cache");
            self.clear_memory();
        } else if (TrimLevel::RunningLow..TrimLevel::UiHidden).contains(&level) {
            let target = self.size() / 2;
            debug!(%level, target, "Trimming strong memory cache");
            self.trim_to_size(target);
        }
    }
}
