use std::path::PathBuf;

use super::bitmap::Drawable;
use super::cache::CacheKey;
use super::request::ImageRequest;
use crate::domain::errors::ImageError;

/// Where a loaded image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    /// Already in memory before the request started (e.g. a bitmap).
    Memory,
    /// Served from the memory cache.
    MemoryCache,
    /// Read from the local disk.
    Disk,
    /// Fetched over the network.
    Network,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::MemoryCache => write!(f, "memory cache"),
            Self::Disk => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A completed load.
#[derive(Debug, Clone)]
pub struct SuccessResult {
    pub drawable: Drawable,
    pub request: ImageRequest,
    pub data_source: DataSource,
    /// The key the output is stored under, if it was cached in memory.
    pub memory_cache_key: Option<CacheKey>,
    /// The disk cache file the bytes were read from or written to.
    pub disk_cache_file: Option<PathBuf>,
    pub is_sampled: bool,
    /// Whether the placeholder was served from the memory cache.
    pub is_placeholder_cached: bool,
}

/// A failed load.
#[derive(Debug, Clone)]
pub struct ErrorResult {
    pub drawable: Option<Drawable>,
    pub request: ImageRequest,
    pub error: ImageError,
}

/// Outcome of executing a request.
#[derive(Debug, Clone)]
pub enum ImageResult {
    Success(SuccessResult),
    Error(ErrorResult),
}

impl ImageResult {
    #[must_use]
    pub fn drawable(&self) -> Option<&Drawable> {
        match self {
            Self::Success(result) => Some(&result.drawable),
            Self::Error(result) => result.drawable.as_ref(),
        }
    }

    #[must_use]
    pub fn request(&self) -> &ImageRequest {
        match self {
            Self::Success(result) => &result.request,
            Self::Error(result) => &result.request,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub const fn as_success(&self) -> Option<&SuccessResult> {
        match self {
            Self::Success(result) => Some(result),
            Self::Error(_) => None,
        }
    }

    #[must_use]
    pub const fn as_error(&self) -> Option<&ErrorResult> {
        match self {
            Self::Success(_) => None,
            Self::Error(result) => Some(result),
        }
    }
}
