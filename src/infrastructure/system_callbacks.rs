//! Platform signals routed into the loader: connectivity and memory pressure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::{info, trace};

use crate::domain::entities::TrimLevel;
use crate::domain::ports::MemoryCache;

/// Receives connectivity and memory pressure events for one loader.
///
/// Holds the memory cache weakly; once the loader is gone, further events
/// shut the callbacks down.
pub struct SystemCallbacks {
    memory_cache: Weak<dyn MemoryCache>,
    is_online: AtomicBool,
    is_shutdown: AtomicBool,
}

impl SystemCallbacks {
    #[must_use]
    pub fn new(memory_cache: &Arc<dyn MemoryCache>) -> Self {
        Self {
            memory_cache: Arc::downgrade(memory_cache),
            is_online: AtomicBool::new(true),
            is_shutdown: AtomicBool::new(false),
        }
    }

    /// Whether network reads are currently possible.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.is_online.load(Ordering::Acquire)
    }

    pub fn on_connectivity_change(&self, is_online: bool) {
        if self.is_shutdown() {
            return;
        }
        let previous = self.is_online.swap(is_online, Ordering::AcqRel);
        if previous != is_online {
            info!(online = is_online, "Connectivity changed");
        }
    }

    pub fn on_trim_memory(&self, level: TrimLevel) {
        if self.is_shutdown() {
            return;
        }
        match self.memory_cache.upgrade() {
            Some(cache) => {
                trace!(%level, "Trimming memory");
                cache.trim_memory(level);
            }
            None => self.shutdown(),
        }
    }

    pub fn on_low_memory(&self) {
        self.on_trim_memory(TrimLevel::Complete);
    }

    /// Stops reacting to further events. Idempotent.
    pub fn shutdown(&self) {
        self.is_shutdown.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Bitmap, CacheKey, CacheValue};
    use crate::infrastructure::cache::MemoryCacheBuilder;
    use image::DynamicImage;

    fn cache() -> Arc<dyn MemoryCache> {
        Arc::new(MemoryCacheBuilder::default().max_size_bytes(4096).build())
    }

    #[test]
    fn test_low_memory_clears_cache() {
        let cache = cache();
        let callbacks = SystemCallbacks::new(&cache);
        cache.set(
            CacheKey::new("a"),
            CacheValue::new(Bitmap::new(DynamicImage::new_rgba8(4, 4)), false),
        );

        callbacks.on_low_memory();

        assert_eq!(cache.size(), 0);
        assert!(cache.get(&CacheKey::new("a")).is_none());
    }

    #[test]
    fn test_dropped_cache_shuts_down() {
        let cache = cache();
        let callbacks = SystemCallbacks::new(&cache);
        drop(cache);

        callbacks.on_trim_memory(TrimLevel::Moderate);
        assert!(callbacks.is_shutdown());

        callbacks.on_connectivity_change(false);
        assert!(callbacks.is_online());
    }

    #[test]
    fn test_connectivity_state() {
        let cache = cache();
        let callbacks = SystemCallbacks::new(&cache);
        callbacks.on_connectivity_change(false);
        assert!(!callbacks.is_online());
        callbacks.on_connectivity_change(true);
        assert!(callbacks.is_online());
    }
}
