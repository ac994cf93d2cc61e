//! Second cache tier holding bitmaps without keeping them alive.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::trace;

use crate::domain::entities::{Bitmap, CacheKey, CacheValue, TrimLevel, WeakBitmap};

/// Number of operations between sweeps of reclaimed entries.
const CLEAN_UP_INTERVAL: usize = 10;

/// Tracks bitmaps that left the strong tier while something else still holds
/// them, so they can be served again without decoding.
pub trait WeakMemoryCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<CacheValue>;

    fn set(&self, key: CacheKey, bitmap: Bitmap, is_sampled: bool, size: usize);

    fn remove(&self, key: &CacheKey) -> bool;

    fn clear_memory(&self);

    fn trim_memory(&self, level: TrimLevel);
}

/// Weak tier used when weak references are disabled.
#[derive(Debug, Default)]
pub struct EmptyWeakMemoryCache;

impl WeakMemoryCache for EmptyWeakMemoryCache {
    fn get(&self, _key: &CacheKey) -> Option<CacheValue> {
        None
    }

    fn set(&self, _key: CacheKey, _bitmap: Bitmap, _is_sampled: bool, _size: usize) {}

    fn remove(&self, _key: &CacheKey) -> bool {
        false
    }

    fn clear_memory(&self) {}

    fn trim_memory(&self, _level: TrimLevel) {}
}

#[derive(Debug)]
struct WeakValue {
    bitmap: WeakBitmap,
    is_sampled: bool,
    size: usize,
}

#[derive(Debug, Default)]
struct WeakState {
    // Each bucket is sorted by decreasing size.
    entries: HashMap<CacheKey, Vec<WeakValue>>,
    operations_since_clean_up: usize,
}

impl WeakState {
    fn clean_up_if_necessary(&mut self) {
        self.operations_since_clean_up += 1;
        if self.operations_since_clean_up >= CLEAN_UP_INTERVAL {
            self.clean_up();
        }
    }

    fn clean_up(&mut self) {
        self.operations_since_clean_up = 0;
        self.entries.retain(|_, values| {
            values.retain(|value| value.bitmap.is_alive());
            !values.is_empty()
        });
    }
}

/// Weak tier backed by real weak references.
#[derive(Debug, Default)]
pub struct RealWeakMemoryCache {
    state: Mutex<WeakState>,
}

impl RealWeakMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys that currently have at least one entry, live or not.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        self.state.lock().entries.keys().cloned().collect()
    }

    /// Drops every entry whose bitmap has been reclaimed.
    pub fn clean_up(&self) {
        self.state.lock().clean_up();
    }
}

impl WeakMemoryCache for RealWeakMemoryCache {
    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let mut state = self.state.lock();
        let mut found = None;
        let mut emptied = false;
        if let Some(values) = state.entries.get_mut(key) {
            values.retain(|value| {
                if found.is_some() {
                    return true;
                }
                match value.bitmap.upgrade() {
                    Some(bitmap) => {
                        found = Some(CacheValue::new(bitmap, value.is_sampled));
                        true
                    }
                    None => false,
                }
            });
            emptied = values.is_empty();
        }
        if emptied {
            state.entries.remove(key);
        }
        state.clean_up_if_necessary();
        trace!(key = %key, hit = found.is_some(), "Weak cache lookup");
        found
    }

    fn set(&self, key: CacheKey, bitmap: Bitmap, is_sampled: bool, size: usize) {
        let mut state = self.state.lock();
        let values = state.entries.entry(key).or_default();
        let value = WeakValue {
            bitmap: bitmap.downgrade(),
            is_sampled,
            size,
        };

        if let Some(existing) = values.iter_mut().find(|v| v.bitmap.points_to(&bitmap)) {
            *existing = value;
        } else {
            let index = values
                .iter()
                .position(|v| size >= v.size)
                .unwrap_or(values.len());
            values.insert(index, value);
        }
        state.clean_up_if_necessary();
    }

    fn remove(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.remove(key).is_some()
    }

    fn clear_memory(&self) {
        let mut state = self.state.lock();
        state.operations_since_clean_up = 0;
        state.entries.clear();
    }

    fn trim_memory(&self, level: TrimLevel) {
        if level >= TrimLevel::Complete {
            self.clear_memory();
        } else if level >= TrimLevel::RunningLow && level != TrimLevel::UiHidden {
            self.clean_up();
        }
    }
}
