//! Derives per-execution options and lifecycle delegates from requests.

use std::sync::Arc;

use tracing::trace;

use super::hardware_bitmap_service::HardwareBitmapService;
use super::request_delegate::{BaseRequestDelegate, RequestDelegate, ViewTargetRequestDelegate};
use super::view_request_manager::ViewTargetRequestManager;
use crate::application::loader::{ImageLoader, Job};
use crate::domain::entities::{
    BitmapConfig, CachePolicy, ErrorResult, ImageRequest, Options, Size,
};
use crate::domain::errors::ImageError;
use crate::domain::ports::LifecycleObserver;
use crate::infrastructure::SystemCallbacks;

/// Applies platform rules to requests before they run.
pub struct RequestService {
    hardware: HardwareBitmapService,
    system_callbacks: Arc<SystemCallbacks>,
}

impl RequestService {
    #[must_use]
    pub const fn new(hardware: HardwareBitmapService, system_callbacks: Arc<SystemCallbacks>) -> Self {
        Self {
            hardware,
            system_callbacks,
        }
    }

    /// Builds the options a request executes with at the resolved `size`.
    #[must_use]
    pub fn options(&self, request: &ImageRequest, size: Size) -> Options {
        let config = if Self::is_config_valid_for_transformations(request)
            && self.is_config_valid_for_hardware_allocation(request, size)
        {
            request.config()
        } else {
            trace!(requested = %request.config(), "Falling back to ARGB_8888");
            BitmapConfig::Argb8888
        };

        let network_cache_policy = if self.system_callbacks.is_online() {
            request.network_cache_policy()
        } else {
            CachePolicy::Disabled
        };

        let allow_rgb565 = request.allow_rgb565()
            && request.transformations().is_empty()
            && config != BitmapConfig::Alpha8;

        Options {
            config,
            color_space: request.color_space(),
            size,
            scale: request.scale(),
            allow_inexact_size: request.allow_inexact_size(),
            allow_rgb565,
            premultiplied_alpha: request.premultiplied_alpha(),
            headers: request.headers().clone(),
            parameters: request.parameters().clone(),
            memory_cache_policy: request.memory_cache_policy(),
            disk_cache_policy: request.disk_cache_policy(),
            network_cache_policy,
        }
    }

    /// Returns false if `config` is hardware-backed and the request cannot
    /// display it: either the request disallows hardware bitmaps or its view
    /// is on screen without hardware acceleration.
    #[must_use]
    pub fn is_config_valid_for_hardware(&self, request: &ImageRequest, config: BitmapConfig) -> bool {
        if !config.is_hardware() {
            return true;
        }
        if !request.allow_hardware() {
            return false;
        }
        let view = request.target().and_then(|target| target.view());
        !view.is_some_and(|view| view.is_attached() && !view.is_hardware_accelerated())
    }

    /// Whether a hardware config in `options` may still be allocated now.
    #[must_use]
    pub fn allow_hardware_worker_thread(&self, options: &Options) -> bool {
        !options.config.is_hardware() || self.hardware.allow_hardware_worker_thread()
    }

    /// Wraps `error` in a result showing the matching drawable: the fallback
    /// for null data, the error drawable otherwise.
    #[must_use]
    pub fn error_result(&self, request: &ImageRequest, error: ImageError) -> ErrorResult {
        let drawable = match error {
            ImageError::NullRequestData => request.fallback(),
            _ => request.error(),
        };
        ErrorResult {
            drawable: drawable.cloned(),
            request: request.clone(),
            error,
        }
    }

    /// Binds `job` to the request's lifecycle and, for view targets, to the
    /// view's request manager.
    ///
    /// A view that is already detached cancels the job immediately; it is
    /// restarted when the view is attached again.
    #[must_use]
    pub fn create_request_delegate(
        &self,
        loader: &ImageLoader,
        request: &ImageRequest,
        job: &Job,
        manager: Option<Arc<ViewTargetRequestManager>>,
    ) -> RequestDelegate {
        let lifecycle = Arc::clone(request.lifecycle());
        match manager {
            Some(manager) => {
                let delegate = Arc::new(ViewTargetRequestDelegate::new(
                    loader.downgrade(),
                    request.clone(),
                    Arc::clone(&manager),
                    Arc::clone(&lifecycle),
                    job.clone(),
                ));
                let id = lifecycle.add_observer(Arc::clone(&delegate) as Arc<dyn LifecycleObserver>);
                delegate.set_observer(id);
                manager.set_request(Some(Arc::clone(&delegate)));
                if request
                    .target()
                    .and_then(|target| target.view())
                    .is_some_and(|view| !view.is_attached())
                {
                    manager.on_detached();
                }
                RequestDelegate::ViewTarget(delegate)
            }
            None => {
                let delegate = Arc::new(BaseRequestDelegate::new(Arc::clone(&lifecycle), job.clone()));
                let id = lifecycle.add_observer(Arc::clone(&delegate) as Arc<dyn LifecycleObserver>);
                delegate.set_observer(id);
                RequestDelegate::Base(delegate)
            }
        }
    }

    fn is_config_valid_for_transformations(request: &ImageRequest) -> bool {
        request.transformations().is_empty() || request.config().is_valid_for_transformations()
    }

    fn is_config_valid_for_hardware_allocation(&self, request: &ImageRequest, size: Size) -> bool {
        let config = request.config();
        !config.is_hardware()
            || (self.is_config_valid_for_hardware(request, config)
                && self.hardware.allow_hardware_main_thread(size))
    }
}
