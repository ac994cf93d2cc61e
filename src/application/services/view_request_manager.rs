//! Per-view bookkeeping that keeps at most one request current for a view.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

use super::request_delegate::ViewTargetRequestDelegate;
use crate::application::loader::Job;
use crate::domain::entities::{ImageResult, View, ViewAttachListener, ViewId};

struct ManagerState {
    current_delegate: Option<Arc<ViewTargetRequestDelegate>>,
    current_job: Option<Job>,
    /// Generation of the live disposable, `None` once disposed.
    current_generation: Option<u64>,
    next_generation: u64,
    pending_clear: Option<JoinHandle<()>>,
    /// Bumped whenever a pending clear must not run anymore.
    clear_epoch: u64,
    is_restart: bool,
    /// Ignore the next attach event.
    skip_attach: bool,
}

/// Tracks the current request delegate and job of one view.
///
/// Delegates are never called while the state lock is held.
pub struct ViewTargetRequestManager {
    state: Mutex<ManagerState>,
}

impl Default for ViewTargetRequestManager {
    fn default() -> Self {
        Self {
            state: Mutex::new(ManagerState {
                current_delegate: None,
                current_job: None,
                current_generation: None,
                next_generation: 1,
                pending_clear: None,
                clear_epoch: 0,
                is_restart: false,
                skip_attach: true,
            }),
        }
    }
}

impl ViewTargetRequestManager {
    /// Makes `job` the view's current job and returns the generation of the
    /// disposable that represents it.
    ///
    /// A restarted request keeps the generation of the disposable it replaces.
    /// Any other request cancels a pending deferred clear and starts a new
    /// generation.
    pub fn attach_new_request(&self, job: Job) -> u64 {
        let mut state = self.state.lock();
        if state.is_restart
            && let Some(generation) = state.current_generation
        {
            state.is_restart = false;
            state.current_job = Some(job);
            return generation;
        }
        state.is_restart = false;
        if let Some(pending) = state.pending_clear.take() {
            pending.abort();
        }
        state.clear_epoch += 1;
        let generation = state.next_generation;
        state.next_generation += 1;
        state.current_generation = Some(generation);
        state.current_job = Some(job);
        generation
    }

    /// Installs `delegate`, disposing the previous one.
    ///
    /// The next attach event is ignored: it is the one the view emits when
    /// it first shows the request, not a re-attach.
    pub fn set_request(&self, delegate: Option<Arc<ViewTargetRequestDelegate>>) {
        let previous = {
            let mut state = self.state.lock();
            state.skip_attach = true;
            std::mem::replace(&mut state.current_delegate, delegate)
        };
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    /// Cancels the current job but keeps the delegate for a later restart.
    pub fn on_detached(&self) {
        let delegate = {
            let mut state = self.state.lock();
            state.skip_attach = false;
            state.current_delegate.clone()
        };
        if let Some(delegate) = delegate {
            trace!(job = delegate.job().id(), "View detached, cancelling request");
            delegate.job().cancel();
        }
    }

    /// Restarts the current delegate unless this attach is the one that
    /// follows installing it.
    pub fn on_attached(&self) {
        let delegate = {
            let mut state = self.state.lock();
            if state.skip_attach {
                state.skip_attach = false;
                return;
            }
            let Some(delegate) = state.current_delegate.clone() else {
                return;
            };
            state.is_restart = true;
            delegate
        };
        if !delegate.restart() {
            self.state.lock().is_restart = false;
        }
    }

    /// Invalidates the current disposable now and clears the delegate on the
    /// next scheduler turn. A request attached in the meantime cancels the
    /// clear.
    pub fn dispose(self: &Arc<Self>) {
        let mut state = self.state.lock();
        state.current_generation = None;
        if let Some(pending) = state.pending_clear.take() {
            pending.abort();
        }
        let epoch = state.clear_epoch;
        if let Ok(handle) = Handle::try_current() {
            let manager = Arc::downgrade(self);
            state.pending_clear = Some(handle.spawn(async move {
                tokio::task::yield_now().await;
                if let Some(manager) = manager.upgrade() {
                    manager.clear(Some(epoch));
                }
            }));
        } else {
            drop(state);
            self.clear(Some(epoch));
        }
    }

    /// Clears the delegate and job immediately.
    pub fn dispose_now(&self) {
        {
            let mut state = self.state.lock();
            state.current_generation = None;
            if let Some(pending) = state.pending_clear.take() {
                pending.abort();
            }
            state.clear_epoch += 1;
        }
        self.clear(None);
    }

    fn clear(&self, epoch: Option<u64>) {
        let previous = {
            let mut state = self.state.lock();
            if epoch.is_some_and(|epoch| epoch != state.clear_epoch) {
                return;
            }
            state.pending_clear = None;
            state.current_job = None;
            state.skip_attach = true;
            state.current_delegate.take()
        };
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    /// Whether `generation` belongs to the live disposable.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.state.lock().current_generation == Some(generation)
    }

    /// The current job, if `generation` is still live.
    #[must_use]
    pub fn job_for(&self, generation: u64) -> Option<Job> {
        let state = self.state.lock();
        if state.current_generation == Some(generation) {
            state.current_job.clone()
        } else {
            None
        }
    }

    /// Result of the current job, if it completed.
    #[must_use]
    pub fn result(&self) -> Option<ImageResult> {
        let state = self.state.lock();
        state.current_generation?;
        state.current_job.as_ref()?.completed_result()
    }
}

impl ViewAttachListener for ViewTargetRequestManager {
    fn on_view_attached(&self) {
        self.on_attached();
    }

    fn on_view_detached(&self) {
        self.on_detached();
    }
}

/// One request manager per live view.
#[derive(Default)]
pub struct ViewRegistry {
    managers: Mutex<HashMap<ViewId, (Weak<View>, Arc<ViewTargetRequestManager>)>>,
}

impl ViewRegistry {
    /// Returns the view's manager, creating and registering it on first use.
    pub fn manager_for(&self, view: &Arc<View>) -> Arc<ViewTargetRequestManager> {
        let mut managers = self.managers.lock();
        managers.retain(|_, (view, _)| view.strong_count() > 0);
        if let Some((_, manager)) = managers.get(&view.id()) {
            return Arc::clone(manager);
        }
        let manager = Arc::new(ViewTargetRequestManager::default());
        let listener: Arc<dyn ViewAttachListener> = Arc::clone(&manager) as _;
        view.add_attach_listener(Arc::downgrade(&listener));
        managers.insert(view.id(), (Arc::downgrade(view), Arc::clone(&manager)));
        manager
    }

    /// Returns the view's manager if a request was ever made for it.
    #[must_use]
    pub fn get(&self, view: &View) -> Option<Arc<ViewTargetRequestManager>> {
        self.managers
            .lock()
            .get(&view.id())
            .map(|(_, manager)| Arc::clone(manager))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn job() -> Job {
        Job::new(&CancellationToken::new()).0
    }

    #[test]
    fn test_generations_increase() {
        let manager = ViewTargetRequestManager::default();
        let first = manager.attach_new_request(job());
        let second = manager.attach_new_request(job());

        assert!(second > first);
        assert!(!manager.is_current(first));
        assert!(manager.is_current(second));
    }

    #[test]
    fn test_restart_keeps_generation() {
        let manager = ViewTargetRequestManager::default();
        let generation = manager.attach_new_request(job());
        manager.state.lock().is_restart = true;

        let replacement = job();
        let restarted = manager.attach_new_request(replacement.clone());

        assert_eq!(restarted, generation);
        assert_eq!(manager.job_for(generation).map(|job| job.id()), Some(replacement.id()));
        assert!(!manager.state.lock().is_restart);
    }

    #[test]
    fn test_dispose_without_runtime_clears_immediately() {
        let manager = Arc::new(ViewTargetRequestManager::default());
        let generation = manager.attach_new_request(job());

        manager.dispose();

        assert!(!manager.is_current(generation));
        assert!(manager.state.lock().current_job.is_none());
    }

    #[tokio::test]
    async fn test_new_request_cancels_deferred_clear() {
        let manager = Arc::new(ViewTargetRequestManager::default());
        manager.attach_new_request(job());
        manager.dispose();

        let replacement = job();
        let generation = manager.attach_new_request(replacement.clone());
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(manager.job_for(generation).map(|job| job.id()), Some(replacement.id()));
    }

    #[tokio::test]
    async fn test_deferred_clear_runs_on_next_turn() {
        let manager = Arc::new(ViewTargetRequestManager::default());
        manager.attach_new_request(job());

        manager.dispose();
        assert!(manager.state.lock().current_job.is_some());

        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert!(manager.state.lock().current_job.is_none());
    }

    #[test]
    fn test_registry_reuses_manager_per_view() {
        let registry = ViewRegistry::default();
        let view = View::new();
        let other = View::new();

        let first = registry.manager_for(&view);
        let again = registry.manager_for(&view);
        let different = registry.manager_for(&other);

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &different));
        assert!(registry.get(&view).is_some());
    }

    #[test]
    fn test_registry_drops_dead_views() {
        let registry = ViewRegistry::default();
        let view = View::new();
        let manager = Arc::downgrade(&registry.manager_for(&view));
        drop(view);

        registry.manager_for(&View::new());

        assert!(manager.upgrade().is_none());
    }
}
