//! Port definitions for turning data into bytes or drawables.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use crate::domain::entities::{Data, DataSource, Drawable, Options};
use crate::domain::errors::ImageError;

enum SourceKind {
    Bytes(Bytes),
    File(PathBuf),
}

struct SourceInner {
    kind: SourceKind,
    closed: AtomicBool,
}

/// Encoded image bytes awaiting a decoder.
///
/// Clones share one handle. The handle is closed exactly once: the first
/// [`ImageSource::close`] wins and later reads fail.
#[derive(Clone)]
pub struct ImageSource {
    inner: Arc<SourceInner>,
}

impl ImageSource {
    #[must_use]
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self::new(SourceKind::Bytes(bytes))
    }

    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(SourceKind::File(path.into()))
    }

    fn new(kind: SourceKind) -> Self {
        Self {
            inner: Arc::new(SourceInner {
                kind,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Backing file, if the bytes live on disk.
    #[must_use]
    pub fn file(&self) -> Option<&Path> {
        match &self.inner.kind {
            SourceKind::File(path) => Some(path),
            SourceKind::Bytes(_) => None,
        }
    }

    /// In-memory bytes, if the source is not file-backed.
    #[must_use]
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.inner.kind {
            SourceKind::Bytes(bytes) => Some(bytes),
            SourceKind::File(_) => None,
        }
    }

    /// Reads the whole source.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Io`] if the source is closed or the file cannot
    /// be read.
    pub async fn read(&self) -> Result<Bytes, ImageError> {
        if self.is_closed() {
            return Err(ImageError::io("source already closed"));
        }
        match &self.inner.kind {
            SourceKind::Bytes(bytes) => Ok(bytes.clone()),
            SourceKind::File(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        }
    }

    /// Releases the source. Returns true only for the call that closed it.
    pub fn close(&self) -> bool {
        let closed = !self.inner.closed.swap(true, Ordering::AcqRel);
        if closed {
            trace!(file = ?self.file(), "Closed image source");
        }
        closed
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner.kind {
            SourceKind::Bytes(bytes) => write!(f, "ImageSource(<{} bytes>)", bytes.len()),
            SourceKind::File(path) => write!(f, "ImageSource({})", path.display()),
        }
    }
}

/// Encoded bytes that still need decoding.
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source: ImageSource,
    pub mime_type: Option<String>,
    pub data_source: DataSource,
    /// Disk cache file that holds the bytes, if any.
    pub disk_cache_file: Option<PathBuf>,
}

/// A drawable that needs no decoding.
#[derive(Debug, Clone)]
pub struct DrawableResult {
    pub drawable: Drawable,
    pub is_sampled: bool,
    pub data_source: DataSource,
}

/// Output of a [`Fetcher`].
#[derive(Debug, Clone)]
pub enum FetchResult {
    Source(SourceResult),
    Drawable(DrawableResult),
}

/// Loads the bytes or drawable for one piece of data.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns `None` to decline and let the next factory try.
    async fn fetch(&self) -> Result<Option<FetchResult>, ImageError>;

    /// Stable identity of the fetched content, if known.
    fn cache_key(&self) -> Option<String> {
        None
    }
}

/// Creates a [`Fetcher`] for data it supports.
pub trait FetcherFactory: Send + Sync {
    fn create(&self, data: &Data, options: &Options) -> Option<Box<dyn Fetcher>>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Fetcher factory that counts invocations and returns fixed bytes.
    pub struct MockFetcherFactory {
        bytes: Option<Bytes>,
        created: Arc<AtomicUsize>,
        fetched: Arc<AtomicUsize>,
    }

    impl MockFetcherFactory {
        /// Creates a factory whose fetchers return `bytes`, or decline if `None`.
        pub fn new(bytes: Option<Bytes>) -> Self {
            Self {
                bytes,
                created: Arc::new(AtomicUsize::new(0)),
                fetched: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Number of fetchers created.
        pub fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }

        /// Number of completed fetches.
        pub fn fetched(&self) -> usize {
            self.fetched.load(Ordering::SeqCst)
        }
    }

    struct MockFetcher {
        bytes: Option<Bytes>,
        fetched: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self) -> Result<Option<FetchResult>, ImageError> {
            self.fetched.fetch_add(1, Ordering::SeqCst);
            Ok(self.bytes.clone().map(|bytes| {
                FetchResult::Source(SourceResult {
                    source: ImageSource::from_bytes(bytes),
                    mime_type: None,
                    data_source: DataSource::Network,
                    disk_cache_file: None,
                })
            }))
        }
    }

    impl FetcherFactory for MockFetcherFactory {
        fn create(&self, _data: &Data, _options: &Options) -> Option<Box<dyn Fetcher>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Some(Box::new(MockFetcher {
                bytes: self.bytes.clone(),
                fetched: Arc::clone(&self.fetched),
            }))
        }
    }
}
