//! Lifecycle driven explicitly by its owner.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::domain::ports::{Lifecycle, LifecycleObserver, ObserverId};

/// Lifecycle states, ordered so that "at least started" is a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Destroyed,
    Initialized,
    Created,
    Started,
    Resumed,
}

/// A lifecycle whose state is pushed by the owning code.
///
/// Observers are notified once, on [`ManualLifecycle::destroy`], and then
/// dropped.
pub struct ManualLifecycle {
    state: watch::Sender<LifecycleState>,
    observers: Mutex<Vec<(ObserverId, Arc<dyn LifecycleObserver>)>>,
    next_id: AtomicU64,
}

impl ManualLifecycle {
    #[must_use]
    pub fn new(initial: LifecycleState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn set_state(&self, state: LifecycleState) {
        if state == LifecycleState::Destroyed {
            self.destroy();
        } else {
            self.state.send_replace(state);
        }
    }

    pub fn start(&self) {
        self.set_state(LifecycleState::Started);
    }

    pub fn stop(&self) {
        self.set_state(LifecycleState::Created);
    }

    /// Moves to [`LifecycleState::Destroyed`] and notifies observers.
    pub fn destroy(&self) {
        let previous = self.state.send_replace(LifecycleState::Destroyed);
        if previous == LifecycleState::Destroyed {
            return;
        }
        let observers = std::mem::take(&mut *self.observers.lock());
        debug!(observers = observers.len(), "Lifecycle destroyed");
        for (_, observer) in observers {
            observer.on_destroy();
        }
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}

impl Default for ManualLifecycle {
    fn default() -> Self {
        Self::new(LifecycleState::Initialized)
    }
}

#[async_trait]
impl Lifecycle for ManualLifecycle {
    async fn await_started(&self) {
        let mut state = self.state.subscribe();
        // The sender lives as long as `self`, so this only ends once started.
        let _ = state.wait_for(|s| *s >= LifecycleState::Started).await;
    }

    fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if self.state() != LifecycleState::Destroyed {
            self.observers.lock().push((id, observer));
        }
        id
    }

    fn remove_observer(&self, id: ObserverId) {
        self.observers.lock().retain(|(existing, _)| *existing != id);
    }
}
