//! Disk cache of encoded image bytes, consulted by network fetchers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::domain::errors::ImageError;

/// Maximum disk cache size in bytes (250 MB default).
pub const DEFAULT_MAX_DISK_CACHE_SIZE: u64 = 250 * 1024 * 1024;

const ENTRY_EXTENSION: &str = "img";

/// Hashes a cache key into a file-system safe name.
#[must_use]
pub fn hash_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..16])
}

/// Content-addressed byte cache stored as one file per key.
pub struct DiskCache {
    directory: PathBuf,
    max_size: u64,
    current_size: AtomicU64,
    entry_count: AtomicUsize,
}

impl DiskCache {
    /// Opens (creating if needed) a disk cache in `directory`.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or listed.
    pub async fn open(directory: PathBuf, max_size: u64) -> Result<Self, ImageError> {
        fs::create_dir_all(&directory)
            .await
            .map_err(|e| ImageError::io(format!("failed to create disk cache dir: {e}")))?;

        let mut total_size = 0u64;
        let mut count = 0usize;
        let mut entries = fs::read_dir(&directory)
            .await
            .map_err(|e| ImageError::io(format!("failed to read disk cache dir: {e}")))?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if is_entry(&entry.path())
                && let Ok(meta) = entry.metadata().await
            {
                total_size += meta.len();
                count += 1;
            }
        }

        debug!(
            directory = %directory.display(),
            size = total_size,
            entries = count,
            "Opened disk cache"
        );
        let cache = Self {
            directory,
            max_size,
            current_size: AtomicU64::new(total_size),
            entry_count: AtomicUsize::new(count),
        };
        cache.trim_if_needed().await;
        Ok(cache)
    }

    /// Opens a cache in the platform cache directory.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub async fn default_location(max_size: u64) -> Result<Self, ImageError> {
        Self::open(default_directory(), max_size).await
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File that holds (or would hold) the bytes for `key`.
    #[must_use]
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{ENTRY_EXTENSION}", hash_key(key)))
    }

    /// Reads the bytes stored for `key`.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let path = self.entry_path(key);
        match fs::read(&path).await {
            Ok(bytes) => {
                trace!(key, path = %path.display(), "Disk cache hit");
                Some(Bytes::from(bytes))
            }
            Err(_) => {
                trace!(key, "Disk cache miss");
                None
            }
        }
    }

    /// Stores `bytes` under `key` and returns the entry's path.
    ///
    /// The bytes are written to a temporary file first, so readers never see
    /// a partial entry.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<PathBuf, ImageError> {
        let path = self.entry_path(key);
        let staging = path.with_extension("tmp");
        let old_size = fs::metadata(&path).await.map(|m| m.len()).ok();

        let mut file = fs::File::create(&staging)
            .await
            .map_err(|e| ImageError::io(format!("failed to create cache file: {e}")))?;
        file.write_all(bytes)
            .await
            .map_err(|e| ImageError::io(format!("failed to write cache file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| ImageError::io(format!("failed to flush cache file: {e}")))?;
        drop(file);
        fs::rename(&staging, &path)
            .await
            .map_err(|e| ImageError::io(format!("failed to commit cache file: {e}")))?;

        let new_size = bytes.len() as u64;
        match old_size {
            Some(old) if new_size >= old => {
                self.current_size.fetch_add(new_size - old, Ordering::Relaxed);
            }
            Some(old) => {
                self.current_size.fetch_sub(old - new_size, Ordering::Relaxed);
            }
            None => {
                self.current_size.fetch_add(new_size, Ordering::Relaxed);
                self.entry_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        debug!(key, path = %path.display(), size = bytes.len(), "Stored bytes in disk cache");

        self.trim_if_needed().await;
        Ok(path)
    }

    /// Removes the entry for `key`, if present.
    pub async fn remove(&self, key: &str) -> bool {
        let path = self.entry_path(key);
        let size = fs::metadata(&path).await.map(|m| m.len()).ok();
        match fs::remove_file(&path).await {
            Ok(()) => {
                if let Some(size) = size {
                    self.current_size.fetch_sub(size, Ordering::Relaxed);
                    self.entry_count.fetch_sub(1, Ordering::Relaxed);
                }
                debug!(key, "Removed disk cache entry");
                true
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(key, error = %e, "Failed to remove disk cache entry");
                }
                false
            }
        }
    }

    /// Deletes every entry.
    ///
    /// # Errors
    /// Returns error if the directory cannot be listed.
    pub async fn clear(&self) -> Result<(), ImageError> {
        let mut entries = fs::read_dir(&self.directory)
            .await
            .map_err(|e| ImageError::io(format!("failed to read disk cache dir: {e}")))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ImageError::io(format!("failed to read entry: {e}")))?
        {
            let path = entry.path();
            if is_entry(&path) && fs::remove_file(&path).await.is_err() {
                warn!(path = %path.display(), "Failed to remove cache file");
            }
        }
        self.current_size.store(0, Ordering::Relaxed);
        self.entry_count.store(0, Ordering::Relaxed);
        debug!("Cleared disk cache");
        Ok(())
    }

    /// Bytes currently stored.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn contains(&self, key: &str) -> bool {
        fs::try_exists(self.entry_path(key)).await.unwrap_or(false)
    }

    // Frees the least recently modified entries down to 90% of the budget.
    async fn trim_if_needed(&self) {
        let current_size = self.size();
        if current_size <= self.max_size {
            return;
        }
        debug!(current_size, max_size = self.max_size, "Disk cache over budget, trimming");

        let Ok(mut entries) = fs::read_dir(&self.directory).await else {
            return;
        };
        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !is_entry(&path) {
                continue;
            }
            if let Ok(meta) = entry.metadata().await {
                let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                files.push((path, modified, meta.len()));
            }
        }
        files.sort_by_key(|(_, modified, _)| *modified);

        let target = current_size - self.max_size + self.max_size / 10;
        let mut freed_size = 0u64;
        let mut freed_count = 0usize;
        for (path, _, size) in files {
            if freed_size >= target {
                break;
            }
            match fs::remove_file(&path).await {
                Ok(()) => {
                    freed_size += size;
                    freed_count += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove old cache file"),
            }
        }
        self.current_size.fetch_sub(freed_size, Ordering::Relaxed);
        self.entry_count.fetch_sub(freed_count, Ordering::Relaxed);
        debug!(freed_size, freed_count, "Disk cache trim complete");
    }
}

fn is_entry(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_directory() -> PathBuf {
    directories::ProjectDirs::from("dev", "imago", "imago").map_or_else(
        || std::env::temp_dir().join("imago").join("image_cache"),
        |dirs| dirs.cache_dir().join("image_cache"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_cache(max_size: u64) -> (DiskCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::open(temp_dir.path().to_path_buf(), max_size)
            .await
            .unwrap();
        (cache, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (cache, _temp) = create_test_cache(1024).await;
        let key = "https://example.com/a.png";

        let path = cache.put(key, b"png bytes").await.unwrap();

        assert_eq!(path, cache.entry_path(key));
        assert_eq!(cache.get(key).await, Some(Bytes::from_static(b"png bytes")));
        assert!(cache.get("https://example.com/b.png").await.is_none());
    }

    #[tokio::test]
    async fn test_counters_follow_writes() {
        let (cache, _temp) = create_test_cache(1024).await;

        cache.put("a", b"hello").await.unwrap();
        cache.put("b", b"world!").await.unwrap();
        assert_eq!((cache.len(), cache.size()), (2, 11));

        cache.put("a", b"hey").await.unwrap();
        assert_eq!((cache.len(), cache.size()), (2, 9));

        assert!(cache.remove("b").await);
        assert!(!cache.remove("b").await);
        assert_eq!((cache.len(), cache.size()), (1, 3));

        cache.clear().await.unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test]
    async fn test_reopen_counts_existing_entries() {
        let temp_dir = TempDir::new().unwrap();
        {
            let cache = DiskCache::open(temp_dir.path().to_path_buf(), 1024).await.unwrap();
            cache.put("a", b"12345").await.unwrap();
        }
        let cache = DiskCache::open(temp_dir.path().to_path_buf(), 1024).await.unwrap();
        assert_eq!((cache.len(), cache.size()), (1, 5));
        assert!(cache.contains("a").await);
    }

    #[tokio::test]
    async fn test_trim_keeps_within_budget() {
        let (cache, _temp) = create_test_cache(10).await;

        cache.put("old", b"123456").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        cache.put("new", b"123456").await.unwrap();

        assert_eq!((cache.len(), cache.size()), (1, 6));
        assert!(cache.contains("new").await);
    }

    #[test]
    fn test_hash_key_is_stable() {
        assert_eq!(hash_key("a"), hash_key("a"));
        assert_ne!(hash_key("a"), hash_key("b"));
        assert_eq!(hash_key("a").len(), 32);
    }
}
