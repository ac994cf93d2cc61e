//! Port definition for the owner lifecycle that gates and tears down requests.

use std::sync::Arc;

use async_trait::async_trait;

/// Handle returned by [`Lifecycle::add_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Notified when the owning lifecycle is destroyed.
pub trait LifecycleObserver: Send + Sync {
    fn on_destroy(&self);
}

/// The lifecycle of whatever owns a request, such as a screen.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Resolves once the owner is at least started.
    async fn await_started(&self);

    fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) -> ObserverId;

    fn remove_observer(&self, id: ObserverId);
}

/// A lifecycle that is always started and never destroyed.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalLifecycle;

#[async_trait]
impl Lifecycle for GlobalLifecycle {
    async fn await_started(&self) {}

    fn add_observer(&self, _observer: Arc<dyn LifecycleObserver>) -> ObserverId {
        ObserverId(0)
    }

    fn remove_observer(&self, _id: ObserverId) {}
}
