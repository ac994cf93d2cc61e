//! The interceptor that actually loads images.
//!
//! Runs map → key → memory cache check → fetch → decode → transform → memory
//! cache write for one request. Every failure except cancellation becomes an
//! [`ImageResult::Error`].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use super::chain::{Chain, Interceptor};
use crate::application::services::{ComponentRegistry, RequestService};
use crate::domain::entities::{
    Bitmap, BitmapConfig, CacheKey, CacheValue, Data, DataSource, Drawable, ImageRequest,
    ImageResult, Options, Size, SuccessResult, compute_size_multiplier,
};
use crate::domain::errors::ImageError;
use crate::domain::ports::{
    DecodeResult, EventListener, FetchResult, ImageSource, MemoryCache, SourceResult,
};

/// Cache key extra holding the transformation keys.
pub const EXTRA_TRANSFORMATIONS: &str = "imago#transformations";
/// Cache key extra holding the requested width when transformations apply.
pub const EXTRA_WIDTH: &str = "imago#width";
/// Cache key extra holding the requested height when transformations apply.
pub const EXTRA_HEIGHT: &str = "imago#height";

/// The terminal interceptor of every chain.
#[derive(Clone)]
pub struct EngineInterceptor {
    components: Arc<ComponentRegistry>,
    memory_cache: Arc<dyn MemoryCache>,
    request_service: Arc<RequestService>,
}

struct Loaded {
    drawable: Drawable,
    is_sampled: bool,
    data_source: DataSource,
    disk_cache_file: Option<PathBuf>,
}

// Closes a fetched source however the stages that read it end.
struct CloseOnDrop(ImageSource);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl EngineInterceptor {
    #[must_use]
    pub const fn new(
        components: Arc<ComponentRegistry>,
        memory_cache: Arc<dyn MemoryCache>,
        request_service: Arc<RequestService>,
    ) -> Self {
        Self {
            components,
            memory_cache,
            request_service,
        }
    }

    /// Derives the memory cache key for `mapped` data.
    ///
    /// An explicit key on the request wins. Otherwise the keyer output is the
    /// base and the extras hold parameter cache keys, plus transformation
    /// keys and the pixel size when transformations apply. Returns `None`
    /// when no keyer accepts the data.
    #[must_use]
    pub fn memory_cache_key(
        &self,
        request: &ImageRequest,
        mapped: &Data,
        options: &Options,
        listener: &dyn EventListener,
    ) -> Option<CacheKey> {
        if let Some(key) = request.memory_cache_key() {
            return Some(key.clone());
        }

        listener.key_start(request, mapped);
        let base = self.components.key(mapped, options);
        listener.key_end(request, base.as_deref());
        let base = base?;

        let mut extras = request.parameters().cache_keys();
        let transformations = request.transformations();
        if !transformations.is_empty() {
            let keys: Vec<String> = transformations.iter().map(|t| t.cache_key()).collect();
            extras.insert(EXTRA_TRANSFORMATIONS.to_owned(), keys.join("~"));
            if let Size::Pixels { width, height } = options.size {
                extras.insert(EXTRA_WIDTH.to_owned(), width.to_string());
                extras.insert(EXTRA_HEIGHT.to_owned(), height.to_string());
            }
        }
        Some(CacheKey::with_extras(base, extras))
    }

    /// Whether a cached value can serve `request` at `size`.
    ///
    /// Checked in order: sampling against original size requests, size
    /// within one pixel or an acceptable multiplier, then hardware support.
    #[must_use]
    pub fn is_cached_value_valid(
        &self,
        key: &CacheKey,
        value: &CacheValue,
        request: &ImageRequest,
        size: Size,
    ) -> bool {
        Self::is_size_valid(key, value, request, size)
            && self
                .request_service
                .is_config_valid_for_hardware(request, value.bitmap.config())
    }

    #[allow(clippy::float_cmp)]
    fn is_size_valid(key: &CacheKey, value: &CacheValue, request: &ImageRequest, size: Size) -> bool {
        let Size::Pixels {
            width: dst_width,
            height: dst_height,
        } = size
        else {
            return !value.is_sampled;
        };
        let src_width = key
            .extra_dimension(EXTRA_WIDTH)
            .unwrap_or_else(|| value.bitmap.width());
        let src_height = key
            .extra_dimension(EXTRA_HEIGHT)
            .unwrap_or_else(|| value.bitmap.height());

        if dst_width.abs_diff(src_width) <= 1 && dst_height.abs_diff(src_height) <= 1 {
            return true;
        }

        let multiplier =
            compute_size_multiplier(src_width, src_height, dst_width, dst_height, request.scale());
        if request.allow_inexact_size() {
            if multiplier > 1.0 && value.is_sampled {
                return false;
            }
            let downsample = multiplier.min(1.0);
            if (f64::from(dst_width) - downsample * f64::from(src_width)).abs() <= 1.0
                || (f64::from(dst_height) - downsample * f64::from(src_height)).abs() <= 1.0
            {
                return true;
            }
        } else if multiplier != 1.0 {
            return false;
        }
        // Never serve an image sampled below what is needed.
        !(multiplier > 1.0 && value.is_sampled)
    }

    async fn load(
        &self,
        chain: &Chain,
        mapped: &Data,
        mut options: Options,
    ) -> Result<Loaded, ImageError> {
        let request = chain.request();
        let listener = chain.event_listener().as_ref();

        if options.config == BitmapConfig::Hardware
            && !self.request_service.allow_hardware_worker_thread(&options)
        {
            options.config = BitmapConfig::Argb8888;
        }

        let mut loaded = match self.fetch(request, mapped, &options, listener).await? {
            FetchResult::Source(source) => {
                let _close = CloseOnDrop(source.source.clone());
                let decoded = self.decode(request, &source, &options, listener).await?;
                Loaded {
                    drawable: decoded.drawable,
                    is_sampled: decoded.is_sampled,
                    data_source: source.data_source,
                    disk_cache_file: source.disk_cache_file,
                }
            }
            FetchResult::Drawable(result) => Loaded {
                drawable: result.drawable,
                is_sampled: result.is_sampled,
                data_source: result.data_source,
                disk_cache_file: None,
            },
        };

        if chain.cancellation().is_cancelled() {
            return Err(ImageError::Cancelled);
        }
        loaded.drawable = self.transform(chain, loaded.drawable, &options).await?;
        Ok(loaded)
    }

    async fn fetch(
        &self,
        request: &ImageRequest,
        mapped: &Data,
        options: &Options,
        listener: &dyn EventListener,
    ) -> Result<FetchResult, ImageError> {
        let mut start = 0;
        loop {
            let Some((fetcher, index)) = self.components.new_fetcher(mapped, options, start) else {
                return Err(ImageError::NoFetcher {
                    data: mapped.to_string(),
                });
            };
            listener.fetch_start(request, options);
            let result = request
                .fetcher_dispatcher()
                .run(async move { fetcher.fetch().await })
                .await?;
            listener.fetch_end(request, options, result.as_ref());
            if let Some(result) = result {
                return Ok(result);
            }
            trace!(index, "Fetcher declined, trying the next one");
            start = index + 1;
        }
    }

    async fn decode(
        &self,
        request: &ImageRequest,
        source: &SourceResult,
        options: &Options,
        listener: &dyn EventListener,
    ) -> Result<DecodeResult, ImageError> {
        let mut start = 0;
        loop {
            let Some((decoder, index)) = self.components.new_decoder(source, options, start) else {
                return Err(ImageError::NoDecoder {
                    data: source
                        .mime_type
                        .clone()
                        .unwrap_or_else(|| format!("{:?}", source.data_source)),
                });
            };
            listener.decode_start(request, options);
            let result = request
                .decoder_dispatcher()
                .run(async move { decoder.decode().await })
                .await?;
            listener.decode_end(request, options, result.as_ref());
            if let Some(result) = result {
                return Ok(result);
            }
            trace!(index, "Decoder declined, trying the next one");
            start = index + 1;
        }
    }

    async fn transform(
        &self,
        chain: &Chain,
        drawable: Drawable,
        options: &Options,
    ) -> Result<Drawable, ImageError> {
        let request = chain.request();
        let transformations = request.transformations().to_vec();
        if transformations.is_empty() {
            return Ok(drawable);
        }

        let input = match drawable {
            Drawable::Bitmap(bitmap) if bitmap.config().is_valid_for_transformations() => bitmap,
            Drawable::Bitmap(bitmap) => {
                trace!(config = %bitmap.config(), "Converting bitmap for transformations");
                bitmap.to_software()
            }
            other => other.to_bitmap(options.size),
        };

        let listener = chain.event_listener();
        listener.transform_start(request, &input);
        let size = options.size;
        let token = chain.cancellation().clone();
        let output: Bitmap = request
            .transformation_dispatcher()
            .run(async move {
                let mut bitmap = input;
                for transformation in transformations {
                    if token.is_cancelled() {
                        return Err(ImageError::Cancelled);
                    }
                    bitmap = transformation.transform(bitmap, size).await?;
                }
                Ok(bitmap)
            })
            .await?;
        listener.transform_end(request, &output);
        Ok(Drawable::Bitmap(output))
    }
}

#[async_trait]
impl Interceptor for EngineInterceptor {
    async fn intercept(&self, chain: Chain) -> Result<ImageResult, ImageError> {
        let request = chain.request().clone();
        let size = chain.size();
        let listener = Arc::clone(chain.event_listener());
        let options = self.request_service.options(&request, size);

        listener.map_start(&request, request.data());
        let mapped = self.components.map(request.data().clone(), &options);
        listener.map_end(&request, &mapped);

        let cache_key = self.memory_cache_key(&request, &mapped, &options, listener.as_ref());

        if request.memory_cache_policy().read_enabled()
            && let Some(key) = &cache_key
        {
            match self.memory_cache.get(key) {
                Some(value) if self.is_cached_value_valid(key, &value, &request, size) => {
                    debug!(%key, "Memory cache hit");
                    return Ok(ImageResult::Success(SuccessResult {
                        drawable: Drawable::Bitmap(value.bitmap),
                        request,
                        data_source: DataSource::MemoryCache,
                        memory_cache_key: Some(key.clone()),
                        disk_cache_file: None,
                        is_sampled: value.is_sampled,
                        is_placeholder_cached: chain.is_placeholder_cached(),
                    }));
                }
                Some(_) => trace!(%key, "Cached value does not fit the request"),
                None => trace!(%key, "Memory cache miss"),
            }
        }

        let loaded = match self.load(&chain, &mapped, options).await {
            Ok(loaded) => loaded,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                debug!(error = %e, "Pipeline failed");
                return Ok(ImageResult::Error(self.request_service.error_result(&request, e)));
            }
        };

        let mut memory_cache_key = None;
        if request.memory_cache_policy().write_enabled()
            && let Some(key) = cache_key
            && let Drawable::Bitmap(bitmap) = &loaded.drawable
        {
            self.memory_cache
                .set(key.clone(), CacheValue::new(bitmap.clone(), loaded.is_sampled));
            memory_cache_key = Some(key);
        }

        Ok(ImageResult::Success(SuccessResult {
            drawable: loaded.drawable,
            request,
            data_source: loaded.data_source,
            memory_cache_key,
            disk_cache_file: loaded.disk_cache_file,
            is_sampled: loaded.is_sampled,
            is_placeholder_cached: chain.is_placeholder_cached(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::HardwareBitmapService;
    use crate::domain::entities::{CachePolicy, DataKind, Scale};
    use crate::domain::ports::NoopEventListener;
    use crate::domain::ports::mocks::{
        InvertTransformation, MockDecoderFactory, MockFetcherFactory, RecordingEventListener,
    };
    use crate::infrastructure::SystemCallbacks;
    use crate::infrastructure::cache::MemoryCacheBuilder;
    use crate::infrastructure::components::{CompositeKeyer, StringMapper};
    use bytes::Bytes;
    use test_case::test_case;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        engine: EngineInterceptor,
        cache: Arc<dyn MemoryCache>,
        fetcher: Arc<MockFetcherFactory>,
        decoder: Arc<MockDecoderFactory>,
    }

    fn fixture() -> Fixture {
        let cache: Arc<dyn MemoryCache> = Arc::new(MemoryCacheBuilder::default().build());
        let callbacks = Arc::new(SystemCallbacks::new(&cache));
        let service = Arc::new(RequestService::new(HardwareBitmapService::default(), callbacks));
        let fetcher = Arc::new(MockFetcherFactory::new(Some(Bytes::from_static(b"image"))));
        let decoder = Arc::new(MockDecoderFactory::new(100, 100));
        let components = ComponentRegistry::builder()
            .add_mapper(Arc::new(StringMapper), DataKind::String)
            .add_keyer(Arc::new(CompositeKeyer::default()), DataKind::Any)
            .add_fetcher(fetcher.clone(), DataKind::Any)
            .add_decoder(decoder.clone())
            .build();
        Fixture {
            engine: EngineInterceptor::new(Arc::new(components), Arc::clone(&cache), service),
            cache,
            fetcher,
            decoder,
        }
    }

    fn chain(engine: &EngineInterceptor, request: ImageRequest, size: Size) -> Chain {
        Chain::new(
            request,
            vec![Arc::new(engine.clone()) as Arc<dyn Interceptor>].into(),
            size,
            false,
            Arc::new(NoopEventListener),
            CancellationToken::new(),
        )
    }

    async fn run(fixture: &Fixture, request: ImageRequest, size: Size) -> ImageResult {
        let chain = chain(&fixture.engine, request.clone(), size);
        chain.proceed(request).await.unwrap()
    }

    fn key(fixture: &Fixture, request: &ImageRequest, size: Size) -> Option<CacheKey> {
        let options = fixture.engine.request_service.options(request, size);
        let mapped = fixture.engine.components.map(request.data().clone(), &options);
        fixture
            .engine
            .memory_cache_key(request, &mapped, &options, &NoopEventListener)
    }

    fn value(width: u32, height: u32, is_sampled: bool) -> CacheValue {
        CacheValue::new(Bitmap::filled(width, height, [0, 0, 0, 255]), is_sampled)
    }

    #[test]
    fn test_same_data_same_key_and_transformations_change_it() {
        let fixture = fixture();
        let plain = ImageRequest::builder("https://a.b/c.png").build();
        let same = ImageRequest::builder("https://a.b/c.png").build();
        let transformed = plain
            .new_builder()
            .transformation(Arc::new(InvertTransformation))
            .build();
        let size = Size::pixels(50, 40);

        let plain_key = key(&fixture, &plain, size).unwrap();
        let transformed_key = key(&fixture, &transformed, size).unwrap();

        assert_eq!(Some(plain_key.clone()), key(&fixture, &same, size));
        assert!(plain_key.extras().is_empty());
        assert_ne!(plain_key, transformed_key);
        assert_eq!(transformed_key.extras().get(EXTRA_TRANSFORMATIONS).map(String::as_str), Some("invert"));
        assert_eq!(transformed_key.extra_dimension(EXTRA_WIDTH), Some(50));
        assert_eq!(transformed_key.extra_dimension(EXTRA_HEIGHT), Some(40));
    }

    #[test]
    fn test_explicit_key_wins() {
        let fixture = fixture();
        let request = ImageRequest::builder("https://a.b/c.png")
            .memory_cache_key(CacheKey::new("custom"))
            .build();
        assert_eq!(key(&fixture, &request, Size::Original), Some(CacheKey::new("custom")));
    }

    #[test]
    fn test_unkeyed_data_has_no_key() {
        let fixture = fixture();
        let request = ImageRequest::builder(Data::custom("thing", 1_u8)).build();
        assert_eq!(key(&fixture, &request, Size::Original), None);
    }

    #[test_case(Size::Original, Scale::Fit, 100, 100, true, false, false ; "sampled rejected for original size")]
    #[test_case(Size::Original, Scale::Fit, 100, 100, false, false, true ; "unsampled accepted for original size")]
    #[test_case(Size::pixels(101, 99), Scale::Fit, 100, 100, true, false, true ; "within one pixel accepted even if sampled")]
    #[test_case(Size::pixels(200, 200), Scale::Fit, 100, 100, true, false, false ; "sampled smaller rejected")]
    #[test_case(Size::pixels(200, 200), Scale::Fit, 100, 100, true, true, false ; "sampled smaller rejected even if inexact")]
    #[test_case(Size::pixels(200, 200), Scale::Fit, 100, 100, false, true, true ; "unsampled smaller accepted if inexact")]
    #[test_case(Size::pixels(50, 50), Scale::Fit, 100, 100, false, false, false ; "larger rejected if exact")]
    #[test_case(Size::pixels(50, 50), Scale::Fit, 100, 100, false, true, true ; "larger accepted if inexact")]
    #[test_case(Size::pixels(101, 400), Scale::Fill, 100, 100, true, true, false ; "sampled needing upscale rejected if one side matches")]
    #[test_case(Size::pixels(101, 400), Scale::Fill, 100, 100, false, true, true ; "unsampled needing upscale accepted if one side matches")]
    fn test_cached_value_validity(
        size: Size,
        scale: Scale,
        width: u32,
        height: u32,
        is_sampled: bool,
        allow_inexact_size: bool,
        expected: bool,
    ) {
        let fixture = fixture();
        let request = ImageRequest::builder("x")
            .allow_inexact_size(allow_inexact_size)
            .scale(scale)
            .build();
        let valid = fixture.engine.is_cached_value_valid(
            &CacheKey::new("x"),
            &value(width, height, is_sampled),
            &request,
            size,
        );
        assert_eq!(valid, expected);
    }

    #[test]
    fn test_key_dimensions_override_bitmap_size() {
        let fixture = fixture();
        let request = ImageRequest::builder("x").scale(Scale::Fill).build();
        let mut extras = std::collections::BTreeMap::new();
        extras.insert(EXTRA_WIDTH.to_owned(), "300".to_owned());
        extras.insert(EXTRA_HEIGHT.to_owned(), "200".to_owned());
        let key = CacheKey::with_extras("x", extras);

        assert!(fixture.engine.is_cached_value_valid(&key, &value(10, 10, true), &request, Size::pixels(300, 200)));
    }

    #[test]
    fn test_hardware_value_rejected_when_disallowed() {
        let fixture = fixture();
        let request = ImageRequest::builder("x").allow_hardware(false).build();
        let bitmap = Bitmap::with_config(image::DynamicImage::new_rgba8(10, 10), BitmapConfig::Hardware);

        let valid = fixture.engine.is_cached_value_valid(
            &CacheKey::new("x"),
            &CacheValue::new(bitmap, false),
            &request,
            Size::Original,
        );
        assert!(!valid);
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let fixture = fixture();
        let request = ImageRequest::builder("https://a.b/c.png").build();

        let first = run(&fixture, request.clone(), Size::Original).await;
        let second = run(&fixture, request, Size::Original).await;

        let first = first.as_success().unwrap();
        let second = second.as_success().unwrap();
        assert_eq!(first.data_source, DataSource::Network);
        assert_eq!(second.data_source, DataSource::MemoryCache);
        assert_eq!(first.drawable, second.drawable);
        assert_eq!(second.memory_cache_key, Some(CacheKey::new("https://a.b/c.png")));
        assert_eq!((fixture.fetcher.fetched(), fixture.decoder.decoded()), (1, 1));
    }

    #[tokio::test]
    async fn test_write_disabled_skips_cache() {
        let fixture = fixture();
        let request = ImageRequest::builder("https://a.b/c.png")
            .memory_cache_policy(CachePolicy::ReadOnly)
            .build();

        let result = run(&fixture, request, Size::Original).await;

        assert!(result.as_success().unwrap().memory_cache_key.is_none());
        assert_eq!(fixture.cache.size(), 0);
    }

    #[tokio::test]
    async fn test_transformations_run_in_order() {
        let fixture = fixture();
        let listener = Arc::new(RecordingEventListener::default());
        let request = ImageRequest::builder("https://a.b/c.png")
            .transformation(Arc::new(InvertTransformation))
            .transformation(Arc::new(InvertTransformation))
            .build();
        let chain = Chain::new(
            request.clone(),
            vec![Arc::new(fixture.engine.clone()) as Arc<dyn Interceptor>].into(),
            Size::Original,
            false,
            listener.clone(),
            CancellationToken::new(),
        );

        let result = chain.proceed(request).await.unwrap();

        let bitmap = result.drawable().and_then(Drawable::as_bitmap).unwrap();
        assert_eq!(bitmap.config(), BitmapConfig::Argb8888);
        assert_eq!(
            listener.events(),
            vec!["map_start", "key_start", "fetch_start", "decode_start", "transform_start"]
        );
    }

    #[tokio::test]
    async fn test_missing_fetcher_is_an_error_result() {
        let fixture = fixture();
        let request = ImageRequest::builder(Data::custom("thing", 1_u8))
            .error(Drawable::color([255, 0, 0, 255]))
            .build();
        let engine = EngineInterceptor::new(
            Arc::new(ComponentRegistry::default()),
            Arc::clone(&fixture.cache),
            Arc::clone(&fixture.engine.request_service),
        );
        let chain = chain(&engine, request.clone(), Size::Original);

        let result = chain.proceed(request).await.unwrap();

        let error = result.as_error().unwrap();
        assert!(matches!(error.error, ImageError::NoFetcher { .. }));
        assert_eq!(error.drawable, Some(Drawable::color([255, 0, 0, 255])));
    }

    #[tokio::test]
    async fn test_cancelled_before_transform_propagates() {
        let fixture = fixture();
        let token = CancellationToken::new();
        token.cancel();
        let request = ImageRequest::builder("https://a.b/c.png")
            .transformation(Arc::new(InvertTransformation))
            .build();
        let chain = Chain::new(
            request.clone(),
            vec![Arc::new(fixture.engine.clone()) as Arc<dyn Interceptor>].into(),
            Size::Original,
            false,
            Arc::new(NoopEventListener),
            token,
        );

        assert_eq!(chain.proceed(request).await.err(), Some(ImageError::Cancelled));
        assert_eq!(fixture.cache.size(), 0);
    }
}
