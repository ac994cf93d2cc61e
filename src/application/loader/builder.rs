use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::image_loader::{ImageLoader, LoaderInner};
use crate::application::pipeline::{EngineInterceptor, Interceptor};
use crate::application::services::{
    ComponentRegistry, HardwareBitmapService, RequestService, ViewRegistry,
};
use crate::domain::entities::DataKind;
use crate::domain::errors::ImageError;
use crate::domain::ports::{EventListener, MemoryCache, NoopEventListener};
use crate::infrastructure::SystemCallbacks;
use crate::infrastructure::cache::{DiskCache, MemoryCacheBuilder};
use crate::infrastructure::components::{
    BitmapFetcherFactory, BytesFetcherFactory, CompositeKeyer, DEFAULT_DECODER_PARALLELISM,
    DEFAULT_HTTP_TIMEOUT, DrawableFetcherFactory, FileFetcherFactory, FileUriMapper,
    HttpFetcherFactory, ImageDecoderFactory, StringMapper,
};
use crate::infrastructure::config::LoaderConfig;

/// Configures and builds an [`ImageLoader`].
///
/// Components added here are searched before the default ones.
#[derive(Clone)]
pub struct ImageLoaderBuilder {
    memory_cache: Option<Arc<dyn MemoryCache>>,
    memory_cache_builder: MemoryCacheBuilder,
    disk_cache: Option<Arc<DiskCache>>,
    http_client: Option<reqwest::Client>,
    http_timeout: Duration,
    decoder_parallelism: usize,
    add_last_modified_to_file_cache_key: bool,
    hardware_bitmaps: HardwareBitmapService,
    components: ComponentRegistry,
    event_listener: Arc<dyn EventListener>,
}

impl Default for ImageLoaderBuilder {
    fn default() -> Self {
        Self {
            memory_cache: None,
            memory_cache_builder: MemoryCacheBuilder::default(),
            disk_cache: None,
            http_client: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            decoder_parallelism: DEFAULT_DECODER_PARALLELISM,
            add_last_modified_to_file_cache_key: true,
            hardware_bitmaps: HardwareBitmapService::default(),
            components: ComponentRegistry::default(),
            event_listener: Arc::new(NoopEventListener),
        }
    }
}

impl ImageLoaderBuilder {
    /// Applies the memory, network and decoder settings of `config`.
    #[must_use]
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self::default()
            .memory_cache_builder(config.memory.to_builder())
            .http_timeout(Duration::from_secs(config.network.timeout_secs))
            .decoder_parallelism(config.decoder_parallelism)
            .add_last_modified_to_file_cache_key(config.add_last_modified_to_file_cache_key)
    }

    /// Uses an existing memory cache, possibly shared with other loaders.
    #[must_use]
    pub fn memory_cache(mut self, cache: Arc<dyn MemoryCache>) -> Self {
        self.memory_cache = Some(cache);
        self
    }

    /// Settings for the memory cache created by [`build`](Self::build).
    #[must_use]
    pub fn memory_cache_builder(mut self, builder: MemoryCacheBuilder) -> Self {
        self.memory_cache_builder = builder;
        self.memory_cache = None;
        self
    }

    /// Disk cache consulted by the HTTP fetcher.
    #[must_use]
    pub fn disk_cache(mut self, cache: Arc<DiskCache>) -> Self {
        self.disk_cache = Some(cache);
        self
    }

    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Request timeout of the default HTTP client.
    #[must_use]
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    #[must_use]
    pub fn decoder_parallelism(mut self, parallelism: usize) -> Self {
        self.decoder_parallelism = parallelism;
        self
    }

    /// Adds the file's modification time to file cache keys so edited
    /// files miss the memory cache.
    #[must_use]
    pub fn add_last_modified_to_file_cache_key(mut self, enabled: bool) -> Self {
        self.add_last_modified_to_file_cache_key = enabled;
        self
    }

    #[must_use]
    pub fn hardware_bitmaps(mut self, service: HardwareBitmapService) -> Self {
        self.hardware_bitmaps = service;
        self
    }

    /// Replaces the user components.
    #[must_use]
    pub fn components(mut self, components: ComponentRegistry) -> Self {
        self.components = components;
        self
    }

    #[must_use]
    pub fn add_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.components = self.components.new_builder().add_interceptor(interceptor).build();
        self
    }

    #[must_use]
    pub fn event_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.event_listener = listener;
        self
    }

    /// Builds the loader on the current tokio runtime.
    ///
    /// # Errors
    /// Returns error if called outside a tokio runtime or if the HTTP client
    /// cannot be created.
    pub fn build(mut self) -> Result<ImageLoader, ImageError> {
        let runtime = Handle::try_current()
            .map_err(|_| ImageError::component("an image loader must be built inside a tokio runtime"))?;

        let memory_cache = match &self.memory_cache {
            Some(cache) => Arc::clone(cache),
            None => Arc::new(self.memory_cache_builder.clone().build()) as Arc<dyn MemoryCache>,
        };
        // Loaders created through `new_builder` share this cache.
        self.memory_cache = Some(Arc::clone(&memory_cache));

        let http = match &self.http_client {
            Some(client) => HttpFetcherFactory::new(client.clone(), self.disk_cache.clone()),
            None => HttpFetcherFactory::with_timeout(self.http_timeout, self.disk_cache.clone())?,
        };

        let components = Arc::new(
            self.components
                .new_builder()
                .add_mapper(Arc::new(StringMapper), DataKind::String)
                .add_mapper(Arc::new(FileUriMapper), DataKind::Uri)
                .add_keyer(
                    Arc::new(CompositeKeyer::new(self.add_last_modified_to_file_cache_key)),
                    DataKind::Any,
                )
                .add_fetcher(Arc::new(http), DataKind::Uri)
                .add_fetcher(Arc::new(FileFetcherFactory), DataKind::Path)
                .add_fetcher(Arc::new(BytesFetcherFactory), DataKind::Bytes)
                .add_fetcher(Arc::new(BitmapFetcherFactory), DataKind::Bitmap)
                .add_fetcher(Arc::new(DrawableFetcherFactory), DataKind::Drawable)
                .add_decoder(Arc::new(ImageDecoderFactory::new(self.decoder_parallelism)))
                .build(),
        );

        let system_callbacks = Arc::new(SystemCallbacks::new(&memory_cache));
        let request_service = Arc::new(RequestService::new(
            self.hardware_bitmaps,
            Arc::clone(&system_callbacks),
        ));
        let engine = EngineInterceptor::new(
            Arc::clone(&components),
            Arc::clone(&memory_cache),
            Arc::clone(&request_service),
        );
        let interceptors: Arc<[Arc<dyn Interceptor>]> = components
            .interceptors()
            .iter()
            .cloned()
            .chain(std::iter::once(Arc::new(engine) as Arc<dyn Interceptor>))
            .collect();

        debug!(?components, "Built image loader");
        Ok(ImageLoader::from_inner(LoaderInner {
            components,
            memory_cache,
            request_service,
            system_callbacks,
            interceptors,
            event_listener: Arc::clone(&self.event_listener),
            views: ViewRegistry::default(),
            runtime,
            root: CancellationToken::new(),
            is_shutdown: AtomicBool::new(false),
            builder: self,
        }))
    }
}
