//! HTTP(S) fetcher backed by the disk cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use tracing::{debug, warn};

use crate::domain::entities::{CachePolicy, Data, DataSource, Options, Uri};
use crate::domain::errors::ImageError;
use crate::domain::ports::{FetchResult, Fetcher, FetcherFactory, ImageSource, SourceResult};
use crate::infrastructure::cache::DiskCache;

/// Default request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates fetchers for `http` and `https` URIs.
#[derive(Clone)]
pub struct HttpFetcherFactory {
    client: reqwest::Client,
    disk_cache: Option<Arc<DiskCache>>,
}

impl HttpFetcherFactory {
    #[must_use]
    pub fn new(client: reqwest::Client, disk_cache: Option<Arc<DiskCache>>) -> Self {
        Self { client, disk_cache }
    }

    /// Builds a client with the given timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_timeout(
        timeout: Duration,
        disk_cache: Option<Arc<DiskCache>>,
    ) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("imago/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ImageError::network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::new(client, disk_cache))
    }
}

impl FetcherFactory for HttpFetcherFactory {
    fn create(&self, data: &Data, options: &Options) -> Option<Box<dyn Fetcher>> {
        let Data::Uri(uri) = data else {
            return None;
        };
        let is_http = uri
            .scheme()
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https"));
        is_http.then(|| {
            Box::new(HttpUriFetcher {
                uri: uri.clone(),
                client: self.client.clone(),
                disk_cache: self.disk_cache.clone(),
                headers: options.headers.clone(),
                disk_cache_policy: options.disk_cache_policy,
                network_cache_policy: options.network_cache_policy,
            }) as Box<dyn Fetcher>
        })
    }
}

struct HttpUriFetcher {
    uri: Uri,
    client: reqwest::Client,
    disk_cache: Option<Arc<DiskCache>>,
    headers: HeaderMap,
    disk_cache_policy: CachePolicy,
    network_cache_policy: CachePolicy,
}

impl HttpUriFetcher {
    async fn download(&self) -> Result<(Bytes, Option<String>), ImageError> {
        let response = self
            .client
            .get(self.uri.as_str())
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| ImageError::network(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ImageError::Http {
                status: response.status().as_u16(),
                url: self.uri.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_owned());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageError::network(format!("failed to read body: {e}")))?;

        Ok((bytes, content_type))
    }
}

#[async_trait]
impl Fetcher for HttpUriFetcher {
    async fn fetch(&self) -> Result<Option<FetchResult>, ImageError> {
        let key = self.uri.as_str();

        if self.disk_cache_policy.read_enabled()
            && let Some(cache) = &self.disk_cache
            && let Some(bytes) = cache.get(key).await
        {
            debug!(url = key, "Serving from disk cache");
            return Ok(Some(FetchResult::Source(SourceResult {
                source: ImageSource::from_bytes(bytes),
                mime_type: None,
                data_source: DataSource::Disk,
                disk_cache_file: Some(cache.entry_path(key)),
            })));
        }

        if !self.network_cache_policy.read_enabled() {
            return Err(ImageError::NetworkDisabled {
                url: key.to_owned(),
            });
        }

        let (bytes, mime_type) = self.download().await?;
        debug!(url = key, size = bytes.len(), "Downloaded image");

        let mut disk_cache_file = None;
        if self.disk_cache_policy.write_enabled()
            && let Some(cache) = &self.disk_cache
        {
            match cache.put(key, &bytes).await {
                Ok(path) => disk_cache_file = Some(path),
                Err(e) => warn!(url = key, error = %e, "Failed to write disk cache"),
            }
        }

        Ok(Some(FetchResult::Source(SourceResult {
            source: ImageSource::from_bytes(bytes),
            mime_type,
            data_source: DataSource::Network,
            disk_cache_file,
        })))
    }

    fn cache_key(&self) -> Option<String> {
        Some(self.uri.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory(disk_cache: Option<Arc<DiskCache>>) -> HttpFetcherFactory {
        HttpFetcherFactory::with_timeout(Duration::from_secs(1), disk_cache).unwrap()
    }

    #[test]
    fn test_accepts_only_http_uris() {
        let factory = factory(None);
        let options = Options::default();

        assert!(factory.create(&Data::Uri(Uri::parse("https://a.b/c.png")), &options).is_some());
        assert!(factory.create(&Data::Uri(Uri::parse("HTTP://a.b/c.png")), &options).is_some());
        assert!(factory.create(&Data::Uri(Uri::parse("file:///c.png")), &options).is_none());
        assert!(factory.create(&Data::from("https://a.b/c.png"), &options).is_none());
    }

    #[tokio::test]
    async fn test_disk_hit_avoids_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(DiskCache::open(dir.path().to_path_buf(), 1024).await.unwrap());
        let url = "https://unreachable.invalid/a.png";
        cache.put(url, b"cached").await.unwrap();

        let fetcher = factory(Some(cache.clone()))
            .create(&Data::Uri(Uri::parse(url)), &Options::default())
            .unwrap();
        let Some(FetchResult::Source(result)) = fetcher.fetch().await.unwrap() else {
            panic!("expected a source result");
        };

        assert_eq!(result.data_source, DataSource::Disk);
        assert_eq!(result.disk_cache_file, Some(cache.entry_path(url)));
        assert_eq!(result.source.read().await.unwrap(), Bytes::from_static(b"cached"));
    }

    #[tokio::test]
    async fn test_disabled_network_fails_without_disk_entry() {
        let options = Options {
            network_cache_policy: CachePolicy::Disabled,
            ..Options::default()
        };
        let fetcher = factory(None)
            .create(&Data::Uri(Uri::parse("https://unreachable.invalid/a.png")), &options)
            .unwrap();

        assert!(matches!(
            fetcher.fetch().await,
            Err(ImageError::NetworkDisabled { .. })
        ));
    }
}
