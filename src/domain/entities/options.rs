use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::header::HeaderMap;

use super::bitmap::BitmapConfig;
use super::cache::CachePolicy;
use super::size::{Scale, Size};

/// Color space the decoder should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    #[default]
    Srgb,
    DisplayP3,
}

/// One request parameter.
#[derive(Clone)]
pub struct Parameter {
    value: Arc<dyn std::any::Any + Send + Sync>,
    cache_key: Option<String>,
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

/// Custom values passed through to components.
///
/// Entries with a cache key contribute it to the memory cache key extras, so
/// two requests that differ only in such a parameter never share an entry.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: BTreeMap<String, Parameter>,
}

impl Parameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with<T: std::any::Any + Send + Sync>(
        mut self,
        key: impl Into<String>,
        value: T,
        cache_key: Option<String>,
    ) -> Self {
        self.entries.insert(
            key.into(),
            Parameter {
                value: Arc::new(value),
                cache_key,
            },
        );
        self
    }

    #[must_use]
    pub fn get<T: std::any::Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.value.downcast_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cache keys of all parameters that declare one.
    #[must_use]
    pub fn cache_keys(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(key, parameter)| {
                parameter
                    .cache_key
                    .as_ref()
                    .map(|cache_key| (key.clone(), cache_key.clone()))
            })
            .collect()
    }
}

/// The per-execution settings handed to mappers, keyers, fetchers and decoders.
#[derive(Debug, Clone)]
pub struct Options {
    pub config: BitmapConfig,
    pub color_space: ColorSpace,
    pub size: Size,
    pub scale: Scale,
    pub allow_inexact_size: bool,
    pub allow_rgb565: bool,
    pub premultiplied_alpha: bool,
    pub headers: HeaderMap,
    pub parameters: Parameters,
    pub memory_cache_policy: CachePolicy,
    pub disk_cache_policy: CachePolicy,
    pub network_cache_policy: CachePolicy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: BitmapConfig::Argb8888,
            color_space: ColorSpace::Srgb,
            size: Size::Original,
            scale: Scale::Fit,
            allow_inexact_size: false,
            allow_rgb565: false,
            premultiplied_alpha: true,
            headers: HeaderMap::new(),
            parameters: Parameters::new(),
            memory_cache_policy: CachePolicy::Enabled,
            disk_cache_policy: CachePolicy::Enabled,
            network_cache_policy: CachePolicy::Enabled,
        }
    }
}
