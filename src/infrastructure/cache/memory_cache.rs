//! Two-tier memory cache facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use super::strong_memory_cache::{EmptyStrongMemoryCache, RealStrongMemoryCache, StrongMemoryCache};
use super::weak_memory_cache::{EmptyWeakMemoryCache, RealWeakMemoryCache, WeakMemoryCache};
use crate::domain::entities::{CacheKey, CacheValue, TrimLevel};
use crate::domain::ports::MemoryCache;

/// Default share of available memory given to the strong tier.
pub const DEFAULT_MAX_SIZE_PERCENT: f64 = 0.25;

/// Default amount of memory assumed to be available to the process.
pub const DEFAULT_AVAILABLE_MEMORY: usize = 512 * 1024 * 1024;

/// Memory cache that reads the strong tier first, then the weak tier.
pub struct RealMemoryCache {
    strong: Arc<dyn StrongMemoryCache>,
    weak: Arc<dyn WeakMemoryCache>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RealMemoryCache {
    #[must_use]
    pub fn new(strong: Arc<dyn StrongMemoryCache>, weak: Arc<dyn WeakMemoryCache>) -> Self {
        Self {
            strong,
            weak,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn builder() -> MemoryCacheBuilder {
        MemoryCacheBuilder::default()
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.strong.size(),
            max_size: self.strong.max_size(),
        }
    }
}

impl MemoryCache for RealMemoryCache {
    fn size(&self) -> usize {
        self.strong.size()
    }

    fn max_size(&self) -> usize {
        self.strong.max_size()
    }

    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let value = self.strong.get(key).or_else(|| self.weak.get(key));
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
        }
        value
    }

    fn set(&self, key: CacheKey, value: CacheValue) {
        trace!(key = %key, "Storing bitmap in memory cache");
        self.strong.set(key, value.bitmap, value.is_sampled);
    }

    fn remove(&self, key: &CacheKey) -> bool {
        // Both tiers must be visited even if the first one had the key.
        let removed_strong = self.strong.remove(key);
        let removed_weak = self.weak.remove(key);
        removed_strong || removed_weak
    }

    fn clear(&self) {
        self.strong.clear_memory();
        self.weak.clear_memory();
        debug!("Cleared memory cache");
    }

    fn trim_memory(&self, level: TrimLevel) {
        self.strong.trim_memory(level);
        self.weak.trim_memory(level);
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Bytes held by the strong tier.
    pub size: usize,
    /// Byte budget of the strong tier.
    pub max_size: usize,
}

impl std::fmt::Display for CacheStats {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {:.1}/{:.1} MiB, {:.1}% hit rate ({} hits, {} misses)",
            self.size as f64 / 1_048_576.0,
            self.max_size as f64 / 1_048_576.0,
            self.hit_rate,
            self.hits,
            self.misses
        )
    }
}

/// Builds a [`RealMemoryCache`] with the tiers selected by its settings.
#[derive(Debug, Clone)]
pub struct MemoryCacheBuilder {
    max_size_percent: f64,
    max_size_bytes: Option<usize>,
    available_memory: usize,
    strong_references_enabled: bool,
    weak_references_enabled: bool,
}

impl Default for MemoryCacheBuilder {
    fn default() -> Self {
        Self {
            max_size_percent: DEFAULT_MAX_SIZE_PERCENT,
            max_size_bytes: None,
            available_memory: DEFAULT_AVAILABLE_MEMORY,
            strong_references_enabled: true,
            weak_references_enabled: true,
        }
    }
}

impl MemoryCacheBuilder {
    /// Sizes the strong tier as a share of available memory, in `0.0..=1.0`.
    #[must_use]
    pub fn max_size_percent(mut self, percent: f64) -> Self {
        self.max_size_percent = percent.clamp(0.0, 1.0);
        self.max_size_bytes = None;
        self
    }

    /// Sizes the strong tier in bytes. Overrides the percentage.
    #[must_use]
    pub fn max_size_bytes(mut self, bytes: usize) -> Self {
        self.max_size_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn available_memory(mut self, bytes: usize) -> Self {
        self.available_memory = bytes;
        self
    }

    #[must_use]
    pub fn strong_references_enabled(mut self, enabled: bool) -> Self {
        self.strong_references_enabled = enabled;
        self
    }

    #[must_use]
    pub fn weak_references_enabled(mut self, enabled: bool) -> Self {
        self.weak_references_enabled = enabled;
        self
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn resolved_max_size(&self) -> usize {
        if !self.strong_references_enabled {
            return 0;
        }
        self.max_size_bytes
            .unwrap_or_else(|| (self.max_size_percent * self.available_memory as f64) as usize)
    }

    #[must_use]
    pub fn build(self) -> RealMemoryCache {
        let weak: Arc<dyn WeakMemoryCache> = if self.weak_references_enabled {
            Arc::new(RealWeakMemoryCache::new())
        } else {
            Arc::new(EmptyWeakMemoryCache)
        };
        let max_size = self.resolved_max_size();
        let strong: Arc<dyn StrongMemoryCache> = if max_size > 0 {
            Arc::new(RealStrongMemoryCache::new(max_size, Arc::clone(&weak)))
        } else {
            Arc::new(EmptyStrongMemoryCache::new(Arc::clone(&weak)))
        };
        debug!(
            max_size,
            weak = self.weak_references_enabled,
            "Built memory cache"
        );
        RealMemoryCache::new(strong, weak)
    }
}
