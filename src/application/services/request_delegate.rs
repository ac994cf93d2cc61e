//! Ties a running job to the lifecycle that owns it.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::view_request_manager::ViewTargetRequestManager;
use crate::application::loader::{Job, WeakImageLoader};
use crate::domain::entities::ImageRequest;
use crate::domain::ports::{Lifecycle, LifecycleObserver, ObserverId};

/// The delegate created for each execution.
#[derive(Clone)]
pub enum RequestDelegate {
    /// Requests without a view: cancelled when the lifecycle is destroyed.
    Base(Arc<BaseRequestDelegate>),
    /// Requests for a view: restarted and cancelled with the view.
    ViewTarget(Arc<ViewTargetRequestDelegate>),
}

impl RequestDelegate {
    /// Called once the job finished, whatever the outcome.
    pub fn complete(&self) {
        match self {
            Self::Base(delegate) => delegate.complete(),
            // Stays registered so a destroyed lifecycle still clears the view.
            Self::ViewTarget(_) => {}
        }
    }
}

/// Cancels its job when the owning lifecycle is destroyed.
pub struct BaseRequestDelegate {
    lifecycle: Arc<dyn Lifecycle>,
    job: Job,
    observer: Mutex<Option<ObserverId>>,
}

impl BaseRequestDelegate {
    #[must_use]
    pub fn new(lifecycle: Arc<dyn Lifecycle>, job: Job) -> Self {
        Self {
            lifecycle,
            job,
            observer: Mutex::new(None),
        }
    }

    pub(crate) fn set_observer(&self, id: ObserverId) {
        *self.observer.lock() = Some(id);
    }

    fn complete(&self) {
        if let Some(id) = self.observer.lock().take() {
            self.lifecycle.remove_observer(id);
        }
    }
}

impl LifecycleObserver for BaseRequestDelegate {
    fn on_destroy(&self) {
        self.job.cancel();
    }
}

/// The current request of a view.
///
/// Re-issues its request when the view is re-attached and disposes the
/// view's request when its lifecycle is destroyed.
pub struct ViewTargetRequestDelegate {
    loader: WeakImageLoader,
    request: ImageRequest,
    manager: Arc<ViewTargetRequestManager>,
    lifecycle: Arc<dyn Lifecycle>,
    job: Job,
    observer: Mutex<Option<ObserverId>>,
}

impl ViewTargetRequestDelegate {
    #[must_use]
    pub fn new(
        loader: WeakImageLoader,
        request: ImageRequest,
        manager: Arc<ViewTargetRequestManager>,
        lifecycle: Arc<dyn Lifecycle>,
        job: Job,
    ) -> Self {
        Self {
            loader,
            request,
            manager,
            lifecycle,
            job,
            observer: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn job(&self) -> &Job {
        &self.job
    }

    pub(crate) fn set_observer(&self, id: ObserverId) {
        *self.observer.lock() = Some(id);
    }

    /// Enqueues the same request again. Returns false if the loader is gone.
    pub fn restart(&self) -> bool {
        match self.loader.upgrade() {
            Some(loader) => {
                debug!(job = self.job.id(), "Restarting view request");
                // The returned disposable is the manager's current one.
                let _ = loader.enqueue(self.request.clone());
                true
            }
            None => false,
        }
    }

    /// Cancels the job and stops observing the lifecycle.
    pub fn dispose(&self) {
        self.job.cancel();
        if let Some(id) = self.observer.lock().take() {
            self.lifecycle.remove_observer(id);
        }
    }
}

impl LifecycleObserver for ViewTargetRequestDelegate {
    fn on_destroy(&self) {
        self.manager.dispose_now();
    }
}
