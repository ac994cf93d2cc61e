use std::sync::Arc;

use super::job::Job;
use crate::application::services::ViewTargetRequestManager;
use crate::domain::entities::ImageResult;
use crate::domain::errors::ImageError;

/// Handle returned by [`ImageLoader::enqueue`](super::ImageLoader::enqueue).
#[derive(Clone)]
pub enum Disposable {
    /// A request without a view.
    OneShot(OneShotDisposable),
    /// A request for a view. Follows the view's restarts.
    ViewTarget(ViewTargetDisposable),
}

impl Disposable {
    /// The job currently executing the request.
    #[must_use]
    pub fn job(&self) -> Job {
        match self {
            Self::OneShot(disposable) => disposable.job.clone(),
            Self::ViewTarget(disposable) => disposable.job(),
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        match self {
            Self::OneShot(disposable) => disposable.is_disposed(),
            Self::ViewTarget(disposable) => disposable.is_disposed(),
        }
    }

    /// Cancels the request. Idempotent.
    pub fn dispose(&self) {
        match self {
            Self::OneShot(disposable) => disposable.dispose(),
            Self::ViewTarget(disposable) => disposable.dispose(),
        }
    }

    /// Waits for the request's result.
    ///
    /// # Errors
    /// Returns [`ImageError::Cancelled`] if the request was cancelled or
    /// disposed.
    pub async fn await_result(&self) -> Result<ImageResult, ImageError> {
        match self {
            Self::OneShot(disposable) => disposable.job.await_result().await,
            Self::ViewTarget(disposable) => disposable.await_result().await,
        }
    }
}

/// Disposable for a single job.
#[derive(Clone)]
pub struct OneShotDisposable {
    job: Job,
}

impl OneShotDisposable {
    #[must_use]
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.job.is_active()
    }

    pub fn dispose(&self) {
        if !self.is_disposed() {
            self.job.cancel();
        }
    }
}

/// Disposable for a view's request. Live while its generation is the view's
/// current one.
#[derive(Clone)]
pub struct ViewTargetDisposable {
    manager: Arc<ViewTargetRequestManager>,
    generation: u64,
    initial_job: Job,
}

impl ViewTargetDisposable {
    #[must_use]
    pub fn new(manager: Arc<ViewTargetRequestManager>, generation: u64, initial_job: Job) -> Self {
        Self {
            manager,
            generation,
            initial_job,
        }
    }

    /// The view's current job, or the job this disposable started with once
    /// it is no longer current.
    #[must_use]
    pub fn job(&self) -> Job {
        self.manager
            .job_for(self.generation)
            .unwrap_or_else(|| self.initial_job.clone())
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.manager.is_current(self.generation)
    }

    pub fn dispose(&self) {
        if !self.is_disposed() {
            self.manager.dispose();
        }
    }

    async fn await_result(&self) -> Result<ImageResult, ImageError> {
        loop {
            let job = self.job();
            match job.await_result().await {
                // A restart replaced the job; wait for the new one.
                Err(ImageError::Cancelled) if !self.is_disposed() && self.job().id() != job.id() => {}
                outcome => return outcome,
            }
        }
    }
}
