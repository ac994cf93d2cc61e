//! The immutable description of one image load.

use std::fmt;
use std::sync::Arc;

use reqwest::header::HeaderMap;

use super::bitmap::{BitmapConfig, Drawable};
use super::cache::{CacheKey, CachePolicy};
use super::data::Data;
use super::dispatcher::Dispatcher;
use super::options::{ColorSpace, Parameters};
use super::size::{Scale, Size};
use crate::domain::ports::{GlobalLifecycle, Lifecycle, Listener, SizeResolver, Target, Transformation};

#[derive(Clone)]
struct RequestInner {
    data: Data,
    target: Option<Arc<dyn Target>>,
    listener: Option<Arc<dyn Listener>>,
    size_resolver: Arc<dyn SizeResolver>,
    scale: Scale,
    allow_inexact_size: bool,
    config: BitmapConfig,
    color_space: ColorSpace,
    allow_hardware: bool,
    allow_rgb565: bool,
    premultiplied_alpha: bool,
    headers: HeaderMap,
    parameters: Parameters,
    memory_cache_policy: CachePolicy,
    disk_cache_policy: CachePolicy,
    network_cache_policy: CachePolicy,
    transformations: Vec<Arc<dyn Transformation>>,
    lifecycle: Arc<dyn Lifecycle>,
    placeholder: Option<Drawable>,
    error: Option<Drawable>,
    fallback: Option<Drawable>,
    memory_cache_key: Option<CacheKey>,
    placeholder_memory_cache_key: Option<CacheKey>,
    interceptor_dispatcher: Dispatcher,
    fetcher_dispatcher: Dispatcher,
    decoder_dispatcher: Dispatcher,
    transformation_dispatcher: Dispatcher,
}

/// An immutable image request.
///
/// Cloning is cheap. A restarted view request re-issues the same value.
#[derive(Clone)]
pub struct ImageRequest {
    inner: Arc<RequestInner>,
}

impl ImageRequest {
    /// Starts building a request for `data`.
    pub fn builder(data: impl Into<Data>) -> ImageRequestBuilder {
        ImageRequestBuilder::new(data.into())
    }

    /// Returns a builder seeded with this request's values.
    #[must_use]
    pub fn new_builder(&self) -> ImageRequestBuilder {
        ImageRequestBuilder {
            inner: (*self.inner).clone(),
        }
    }

    #[must_use]
    pub fn data(&self) -> &Data {
        &self.inner.data
    }

    #[must_use]
    pub fn target(&self) -> Option<&Arc<dyn Target>> {
        self.inner.target.as_ref()
    }

    #[must_use]
    pub fn listener(&self) -> Option<&Arc<dyn Listener>> {
        self.inner.listener.as_ref()
    }

    #[must_use]
    pub fn size_resolver(&self) -> &Arc<dyn SizeResolver> {
        &self.inner.size_resolver
    }

    #[must_use]
    pub fn scale(&self) -> Scale {
        self.inner.scale
    }

    /// Whether the output may differ from the requested size.
    #[must_use]
    pub fn allow_inexact_size(&self) -> bool {
        self.inner.allow_inexact_size
    }

    #[must_use]
    pub fn config(&self) -> BitmapConfig {
        self.inner.config
    }

    #[must_use]
    pub fn color_space(&self) -> ColorSpace {
        self.inner.color_space
    }

    #[must_use]
    pub fn allow_hardware(&self) -> bool {
        self.inner.allow_hardware
    }

    #[must_use]
    pub fn allow_rgb565(&self) -> bool {
        self.inner.allow_rgb565
    }

    #[must_use]
    pub fn premultiplied_alpha(&self) -> bool {
        self.inner.premultiplied_alpha
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.inner.parameters
    }

    #[must_use]
    pub fn memory_cache_policy(&self) -> CachePolicy {
        self.inner.memory_cache_policy
    }

    #[must_use]
    pub fn disk_cache_policy(&self) -> CachePolicy {
        self.inner.disk_cache_policy
    }

    #[must_use]
    pub fn network_cache_policy(&self) -> CachePolicy {
        self.inner.network_cache_policy
    }

    #[must_use]
    pub fn transformations(&self) -> &[Arc<dyn Transformation>] {
        &self.inner.transformations
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Arc<dyn Lifecycle> {
        &self.inner.lifecycle
    }

    #[must_use]
    pub fn placeholder(&self) -> Option<&Drawable> {
        self.inner.placeholder.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&Drawable> {
        self.inner.error.as_ref()
    }

    /// Drawable shown when the data is [`Data::Null`]. Falls back to the
    /// error drawable when unset.
    #[must_use]
    pub fn fallback(&self) -> Option<&Drawable> {
        self.inner.fallback.as_ref().or(self.inner.error.as_ref())
    }

    /// Explicit memory cache key that overrides the derived one.
    #[must_use]
    pub fn memory_cache_key(&self) -> Option<&CacheKey> {
        self.inner.memory_cache_key.as_ref()
    }

    #[must_use]
    pub fn placeholder_memory_cache_key(&self) -> Option<&CacheKey> {
        self.inner.placeholder_memory_cache_key.as_ref()
    }

    #[must_use]
    pub fn interceptor_dispatcher(&self) -> &Dispatcher {
        &self.inner.interceptor_dispatcher
    }

    #[must_use]
    pub fn fetcher_dispatcher(&self) -> &Dispatcher {
        &self.inner.fetcher_dispatcher
    }

    #[must_use]
    pub fn decoder_dispatcher(&self) -> &Dispatcher {
        &self.inner.decoder_dispatcher
    }

    #[must_use]
    pub fn transformation_dispatcher(&self) -> &Dispatcher {
        &self.inner.transformation_dispatcher
    }
}

impl fmt::Debug for ImageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transformations: Vec<String> = self
            .inner
            .transformations
            .iter()
            .map(|t| t.cache_key())
            .collect();
        f.debug_struct("ImageRequest")
            .field("data", &self.inner.data)
            .field("has_target", &self.inner.target.is_some())
            .field("scale", &self.inner.scale)
            .field("config", &self.inner.config)
            .field("transformations", &transformations)
            .field("memory_cache_key", &self.inner.memory_cache_key)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ImageRequest`].
pub struct ImageRequestBuilder {
    inner: RequestInner,
}

impl ImageRequestBuilder {
    fn new(data: Data) -> Self {
        Self {
            inner: RequestInner {
                data,
                target: None,
                listener: None,
                size_resolver: Arc::new(Size::Original),
                scale: Scale::Fit,
                allow_inexact_size: false,
                config: BitmapConfig::Argb8888,
                color_space: ColorSpace::Srgb,
                allow_hardware: true,
                allow_rgb565: false,
                premultiplied_alpha: true,
                headers: HeaderMap::new(),
                parameters: Parameters::new(),
                memory_cache_policy: CachePolicy::Enabled,
                disk_cache_policy: CachePolicy::Enabled,
                network_cache_policy: CachePolicy::Enabled,
                transformations: Vec::new(),
                lifecycle: Arc::new(GlobalLifecycle),
                placeholder: None,
                error: None,
                fallback: None,
                memory_cache_key: None,
                placeholder_memory_cache_key: None,
                interceptor_dispatcher: Dispatcher::Immediate,
                fetcher_dispatcher: Dispatcher::Immediate,
                decoder_dispatcher: Dispatcher::Immediate,
                transformation_dispatcher: Dispatcher::Immediate,
            },
        }
    }

    #[must_use]
    pub fn data(mut self, data: impl Into<Data>) -> Self {
        self.inner.data = data.into();
        self
    }

    #[must_use]
    pub fn target(mut self, target: Arc<dyn Target>) -> Self {
        self.inner.target = Some(target);
        self
    }

    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.inner.listener = Some(listener);
        self
    }

    /// Uses a fixed size.
    #[must_use]
    pub fn size(mut self, size: Size) -> Self {
        self.inner.size_resolver = Arc::new(size);
        self
    }

    #[must_use]
    pub fn size_resolver(mut self, resolver: Arc<dyn SizeResolver>) -> Self {
        self.inner.size_resolver = resolver;
        self
    }

    #[must_use]
    pub fn scale(mut self, scale: Scale) -> Self {
        self.inner.scale = scale;
        self
    }

    #[must_use]
    pub fn allow_inexact_size(mut self, allow: bool) -> Self {
        self.inner.allow_inexact_size = allow;
        self
    }

    #[must_use]
    pub fn config(mut self, config: BitmapConfig) -> Self {
        self.inner.config = config;
        self
    }

    #[must_use]
    pub fn color_space(mut self, color_space: ColorSpace) -> Self {
        self.inner.color_space = color_space;
        self
    }

    #[must_use]
    pub fn allow_hardware(mut self, allow: bool) -> Self {
        self.inner.allow_hardware = allow;
        self
    }

    #[must_use]
    pub fn allow_rgb565(mut self, allow: bool) -> Self {
        self.inner.allow_rgb565 = allow;
        self
    }

    #[must_use]
    pub fn premultiplied_alpha(mut self, premultiplied: bool) -> Self {
        self.inner.premultiplied_alpha = premultiplied;
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.inner.headers = headers;
        self
    }

    #[must_use]
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.inner.parameters = parameters;
        self
    }

    #[must_use]
    pub fn memory_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.inner.memory_cache_policy = policy;
        self
    }

    #[must_use]
    pub fn disk_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.inner.disk_cache_policy = policy;
        self
    }

    #[must_use]
    pub fn network_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.inner.network_cache_policy = policy;
        self
    }

    /// Appends a transformation to the ordered list.
    #[must_use]
    pub fn transformation(mut self, transformation: Arc<dyn Transformation>) -> Self {
        self.inner.transformations.push(transformation);
        self
    }

    #[must_use]
    pub fn transformations(mut self, transformations: Vec<Arc<dyn Transformation>>) -> Self {
        self.inner.transformations = transformations;
        self
    }

    #[must_use]
    pub fn lifecycle(mut self, lifecycle: Arc<dyn Lifecycle>) -> Self {
        self.inner.lifecycle = lifecycle;
        self
    }

    #[must_use]
    pub fn placeholder(mut self, drawable: Drawable) -> Self {
        self.inner.placeholder = Some(drawable);
        self
    }

    #[must_use]
    pub fn error(mut self, drawable: Drawable) -> Self {
        self.inner.error = Some(drawable);
        self
    }

    #[must_use]
    pub fn fallback(mut self, drawable: Drawable) -> Self {
        self.inner.fallback = Some(drawable);
        self
    }

    #[must_use]
    pub fn memory_cache_key(mut self, key: CacheKey) -> Self {
        self.inner.memory_cache_key = Some(key);
        self
    }

    #[must_use]
    pub fn placeholder_memory_cache_key(mut self, key: CacheKey) -> Self {
        self.inner.placeholder_memory_cache_key = Some(key);
        self
    }

    /// Runs every pipeline stage on `dispatcher`.
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.inner.interceptor_dispatcher = dispatcher.clone();
        self.inner.fetcher_dispatcher = dispatcher.clone();
        self.inner.decoder_dispatcher = dispatcher.clone();
        self.inner.transformation_dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn interceptor_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.inner.interceptor_dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn fetcher_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.inner.fetcher_dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn decoder_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.inner.decoder_dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn transformation_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.inner.transformation_dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn build(self) -> ImageRequest {
        ImageRequest {
            inner: Arc::new(self.inner),
        }
    }
}
