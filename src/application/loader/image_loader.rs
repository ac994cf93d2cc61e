//! Request orchestration: enqueue, execute and shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::builder::ImageLoaderBuilder;
use super::disposable::{Disposable, OneShotDisposable, ViewTargetDisposable};
use super::job::{Job, JobOutcome};
use crate::application::pipeline::{Chain, Interceptor};
use crate::application::services::{
    ComponentRegistry, RequestDelegate, RequestService, ViewRegistry, ViewTargetRequestManager,
};
use crate::domain::entities::{
    Drawable, ErrorResult, ImageRequest, ImageResult, SuccessResult, View,
};
use crate::domain::errors::ImageError;
use crate::domain::ports::{EventListener, MemoryCache};
use crate::infrastructure::SystemCallbacks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestType {
    Enqueue,
    Execute,
}

pub(crate) struct LoaderInner {
    pub(crate) components: Arc<ComponentRegistry>,
    pub(crate) memory_cache: Arc<dyn MemoryCache>,
    pub(crate) request_service: Arc<RequestService>,
    pub(crate) system_callbacks: Arc<SystemCallbacks>,
    /// User interceptors followed by the engine.
    pub(crate) interceptors: Arc<[Arc<dyn Interceptor>]>,
    pub(crate) event_listener: Arc<dyn EventListener>,
    pub(crate) views: ViewRegistry,
    pub(crate) runtime: Handle,
    pub(crate) root: CancellationToken,
    pub(crate) is_shutdown: AtomicBool,
    /// Settings the loader was built with, reused by `new_builder`.
    pub(crate) builder: ImageLoaderBuilder,
}

/// Loads images. Cheap to clone; clones share caches and components.
#[derive(Clone)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
}

/// A loader handle that does not keep the loader alive.
#[derive(Clone)]
pub struct WeakImageLoader {
    inner: Weak<LoaderInner>,
}

impl WeakImageLoader {
    #[must_use]
    pub fn upgrade(&self) -> Option<ImageLoader> {
        self.inner.upgrade().map(|inner| ImageLoader { inner })
    }
}

impl ImageLoader {
    pub(crate) fn from_inner(inner: LoaderInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Starts building a loader with the default components.
    #[must_use]
    pub fn builder() -> ImageLoaderBuilder {
        ImageLoaderBuilder::default()
    }

    /// Returns a builder seeded with this loader's settings.
    #[must_use]
    pub fn new_builder(&self) -> ImageLoaderBuilder {
        self.inner.builder.clone()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakImageLoader {
        WeakImageLoader {
            inner: Arc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn memory_cache(&self) -> &Arc<dyn MemoryCache> {
        &self.inner.memory_cache
    }

    #[must_use]
    pub fn components(&self) -> &Arc<ComponentRegistry> {
        &self.inner.components
    }

    #[must_use]
    pub fn system_callbacks(&self) -> &Arc<SystemCallbacks> {
        &self.inner.system_callbacks
    }

    /// Runs `request` in the background.
    ///
    /// Requests for a view replace the view's current request, are cancelled
    /// when the view detaches, and restart when it re-attaches.
    pub fn enqueue(&self, request: ImageRequest) -> Disposable {
        let (job, completer) = self.new_job();
        let (disposable, delegate) = self.bind(&request, &job);

        let loader = self.clone();
        let token = job.token().clone();
        self.inner.runtime.spawn(async move {
            let outcome = loader.run_job(&request, &delegate, &token, RequestType::Enqueue).await;
            completer.complete(outcome);
        });
        disposable
    }

    /// Runs `request` on the calling task and returns its result.
    ///
    /// Does not wait for the request's lifecycle to start. Dropping the
    /// returned future cancels the request.
    ///
    /// # Errors
    /// Returns [`ImageError::Cancelled`] if the request was cancelled. Every
    /// other failure is reported as [`ImageResult::Error`].
    pub async fn execute(&self, request: ImageRequest) -> Result<ImageResult, ImageError> {
        let (job, completer) = self.new_job();
        let (_disposable, delegate) = self.bind(&request, &job);
        let token = job.token().clone();
        let guard = token.clone().drop_guard();

        let outcome = self.run_job(&request, &delegate, &token, RequestType::Execute).await;
        drop(guard.disarm());
        completer.complete(outcome.clone());
        match outcome {
            JobOutcome::Completed(result) => Ok(result),
            JobOutcome::Cancelled => Err(ImageError::Cancelled),
        }
    }

    /// Latest completed result shown in `view`, if any.
    #[must_use]
    pub fn result(&self, view: &View) -> Option<ImageResult> {
        self.inner.views.get(view)?.result()
    }

    /// Cancels and clears the current request of `view`.
    pub fn dispose(&self, view: &View) {
        if let Some(manager) = self.inner.views.get(view) {
            manager.dispose_now();
        }
    }

    /// Cancels every in-flight request and clears the memory cache.
    ///
    /// Requests made afterwards fail with [`ImageError::Shutdown`]. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.is_shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Shutting down image loader");
        self.inner.root.cancel();
        self.inner.system_callbacks.shutdown();
        self.inner.memory_cache.clear();
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown.load(Ordering::Acquire)
    }

    fn new_job(&self) -> (Job, super::job::JobCompleter) {
        if self.is_shutdown() {
            // Still runs, so the request reports the shutdown as its error.
            Job::with_token(CancellationToken::new())
        } else {
            Job::new(&self.inner.root)
        }
    }

    fn view_manager(&self, request: &ImageRequest) -> Option<Arc<ViewTargetRequestManager>> {
        let view = request.target()?.view()?;
        Some(self.inner.views.manager_for(&view))
    }

    // Registers the job with the view before its delegate is installed so a
    // pending clear cannot remove the new delegate.
    fn bind(&self, request: &ImageRequest, job: &Job) -> (Disposable, RequestDelegate) {
        let manager = self.view_manager(request);
        let disposable = match &manager {
            Some(manager) => {
                let generation = manager.attach_new_request(job.clone());
                Disposable::ViewTarget(ViewTargetDisposable::new(
                    Arc::clone(manager),
                    generation,
                    job.clone(),
                ))
            }
            None => Disposable::OneShot(OneShotDisposable::new(job.clone())),
        };
        let delegate = self
            .inner
            .request_service
            .create_request_delegate(self, request, job, manager);
        (disposable, delegate)
    }

    async fn run_job(
        &self,
        request: &ImageRequest,
        delegate: &RequestDelegate,
        token: &CancellationToken,
        request_type: RequestType,
    ) -> JobOutcome {
        let result = tokio::select! {
            biased;
            () = token.cancelled() => Err(ImageError::Cancelled),
            result = self.execute_main(request, request_type, token) => result,
        };
        delegate.complete();
        match result {
            Ok(result) => JobOutcome::Completed(result),
            Err(_) => {
                debug!(data = %request.data(), "Request cancelled");
                if let Some(listener) = request.listener() {
                    listener.on_cancel(request);
                }
                self.inner.event_listener.on_cancel(request);
                JobOutcome::Cancelled
            }
        }
    }

    async fn execute_main(
        &self,
        request: &ImageRequest,
        request_type: RequestType,
        token: &CancellationToken,
    ) -> Result<ImageResult, ImageError> {
        if self.is_shutdown() {
            return Ok(self.fail(request, ImageError::Shutdown));
        }
        if request.data().is_null() {
            return Ok(self.fail(request, ImageError::NullRequestData));
        }

        if request_type == RequestType::Enqueue {
            request.lifecycle().await_started().await;
        }

        let cached_placeholder = request
            .placeholder_memory_cache_key()
            .and_then(|key| self.inner.memory_cache.get(key))
            .map(|value| Drawable::Bitmap(value.bitmap));
        let is_placeholder_cached = cached_placeholder.is_some();
        let placeholder = cached_placeholder.or_else(|| request.placeholder().cloned());
        if let Some(target) = request.target() {
            target.on_start(placeholder.as_ref());
        }
        self.inner.event_listener.on_start(request);
        if let Some(listener) = request.listener() {
            listener.on_start(request);
        }

        let listener = &self.inner.event_listener;
        listener.resolve_size_start(request);
        let size = request.size_resolver().size().await;
        listener.resolve_size_end(request, size);

        let chain = Chain::new(
            request.clone(),
            Arc::clone(&self.inner.interceptors),
            size,
            is_placeholder_cached,
            Arc::clone(&self.inner.event_listener),
            token.clone(),
        );
        let initial = request.clone();
        let result = request
            .interceptor_dispatcher()
            .run(async move { chain.proceed(initial).await })
            .await;

        match result {
            Ok(ImageResult::Success(success)) => {
                self.on_success(&success);
                Ok(ImageResult::Success(success))
            }
            Ok(ImageResult::Error(error)) => {
                self.on_error(&error);
                Ok(ImageResult::Error(error))
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => Ok(self.fail(request, e)),
        }
    }

    fn fail(&self, request: &ImageRequest, error: ImageError) -> ImageResult {
        let result = self.inner.request_service.error_result(request, error);
        self.on_error(&result);
        ImageResult::Error(result)
    }

    fn on_success(&self, result: &SuccessResult) {
        let request = &result.request;
        info!(
            data = %request.data(),
            source = %result.data_source,
            sampled = result.is_sampled,
            "Successful"
        );
        if let Some(target) = request.target() {
            target.on_success(&result.drawable);
        }
        self.inner.event_listener.on_success(request, result);
        if let Some(listener) = request.listener() {
            listener.on_success(request, result);
        }
    }

    fn on_error(&self, result: &ErrorResult) {
        let request = &result.request;
        warn!(data = %request.data(), error = %result.error, "Failed");
        if let Some(target) = request.target() {
            target.on_error(result.drawable.as_ref());
        }
        self.inner.event_listener.on_error(request, result);
        if let Some(listener) = request.listener() {
            listener.on_error(request, result);
        }
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("components", &self.inner.components)
            .field("interceptors", &self.inner.interceptors.len())
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}
