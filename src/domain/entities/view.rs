//! Handle for an on-screen element that displays images.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a [`View`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

/// Receives attach and detach events from a [`View`].
pub trait ViewAttachListener: Send + Sync {
    fn on_view_attached(&self);
    fn on_view_detached(&self);
}

/// A UI element that can be attached to and detached from the screen.
///
/// Attach state changes are pushed to listeners by the owning UI code through
/// [`View::dispatch_attached`] and [`View::dispatch_detached`].
pub struct View {
    id: ViewId,
    attached: AtomicBool,
    hardware_accelerated: AtomicBool,
    listeners: Mutex<Vec<Weak<dyn ViewAttachListener>>>,
}

impl View {
    /// Creates an attached, hardware accelerated view.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_state(true))
    }

    /// Creates a view that is not yet on screen.
    #[must_use]
    pub fn detached() -> Arc<Self> {
        Arc::new(Self::with_state(false))
    }

    fn with_state(attached: bool) -> Self {
        Self {
            id: ViewId(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed)),
            attached: AtomicBool::new(attached),
            hardware_accelerated: AtomicBool::new(true),
            listeners: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> ViewId {
        self.id
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_hardware_accelerated(&self) -> bool {
        self.hardware_accelerated.load(Ordering::Acquire)
    }

    pub fn set_hardware_accelerated(&self, enabled: bool) {
        self.hardware_accelerated.store(enabled, Ordering::Release);
    }

    /// Registers a listener. Dead listeners are pruned on the next dispatch.
    pub fn add_attach_listener(&self, listener: Weak<dyn ViewAttachListener>) {
        self.listeners.lock().push(listener);
    }

    /// Marks the view attached and notifies listeners.
    pub fn dispatch_attached(&self) {
        self.attached.store(true, Ordering::Release);
        for listener in self.live_listeners() {
            listener.on_view_attached();
        }
    }

    /// Marks the view detached and notifies listeners.
    pub fn dispatch_detached(&self) {
        self.attached.store(false, Ordering::Release);
        for listener in self.live_listeners() {
            listener.on_view_detached();
        }
    }

    // Listeners run without the lock held so they may register others.
    fn live_listeners(&self) -> Vec<Arc<dyn ViewAttachListener>> {
        let mut listeners = self.listeners.lock();
        listeners.retain(|listener| listener.strong_count() > 0);
        listeners.iter().filter_map(Weak::upgrade).collect()
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .field("hardware_accelerated", &self.is_hardware_accelerated())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter {
        attached: AtomicUsize,
        detached: AtomicUsize,
    }

    impl ViewAttachListener for Counter {
        fn on_view_attached(&self) {
            self.attached.fetch_add(1, Ordering::SeqCst);
        }

        fn on_view_detached(&self) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_dispatch_updates_state_and_listeners() {
        let view = View::new();
        let counter = Arc::new(Counter::default());
        let listener: Arc<dyn ViewAttachListener> = counter.clone();
        view.add_attach_listener(Arc::downgrade(&listener));

        view.dispatch_detached();
        assert!(!view.is_attached());
        view.dispatch_attached();
        assert!(view.is_attached());

        assert_eq!(counter.attached.load(Ordering::SeqCst), 1);
        assert_eq!(counter.detached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let view = View::detached();
        {
            let listener: Arc<dyn ViewAttachListener> = Arc::new(Counter::default());
            view.add_attach_listener(Arc::downgrade(&listener));
        }
        view.dispatch_attached();
        assert!(view.listeners.lock().is_empty());
    }
}
