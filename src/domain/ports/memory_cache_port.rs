//! Port definition for the in-memory bitmap cache.

use crate::domain::entities::{CacheKey, CacheValue, TrimLevel};

/// An in-memory cache of decoded bitmaps.
/// Implementations must be thread-safe.
pub trait MemoryCache: Send + Sync {
    /// Current size in bytes of strongly held entries.
    fn size(&self) -> usize;

    /// Byte budget for strongly held entries.
    fn max_size(&self) -> usize;

    fn get(&self, key: &CacheKey) -> Option<CacheValue>;

    fn set(&self, key: CacheKey, value: CacheValue);

    /// Removes the key from every tier. Returns true if any tier held it.
    fn remove(&self, key: &CacheKey) -> bool;

    fn clear(&self);

    /// Releases memory in response to system pressure.
    fn trim_memory(&self, level: TrimLevel);
}
