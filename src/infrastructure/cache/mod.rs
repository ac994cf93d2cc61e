//! Memory and disk caches.

mod disk_cache;
mod memory_cache;
mod strong_memory_cache;
mod weak_memory_cache;

pub use disk_cache::{DEFAULT_MAX_DISK_CACHE_SIZE, DiskCache, default_directory, hash_key};
pub use memory_cache::{
    CacheStats, DEFAULT_AVAILABLE_MEMORY, DEFAULT_MAX_SIZE_PERCENT, MemoryCacheBuilder,
    RealMemoryCache,
};
pub use strong_memory_cache::{EmptyStrongMemoryCache, RealStrongMemoryCache, StrongMemoryCache};
pub use weak_memory_cache::{EmptyWeakMemoryCache, RealWeakMemoryCache, WeakMemoryCache};
