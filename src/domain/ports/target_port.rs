//! Port definitions for where results are displayed and how big they should be.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entities::{Drawable, Size, View};

/// Receives the placeholder, result and error drawables of a request.
///
/// Callbacks run on the request's orchestration task.
pub trait Target: Send + Sync {
    fn on_start(&self, _placeholder: Option<&Drawable>) {}

    fn on_success(&self, _result: &Drawable) {}

    fn on_error(&self, _error: Option<&Drawable>) {}

    /// The view this target draws into. Requests for a view are restarted
    /// when it is re-attached and cancelled when it is detached.
    fn view(&self) -> Option<Arc<View>> {
        None
    }
}

/// Resolves the size a request should be loaded at.
#[async_trait]
pub trait SizeResolver: Send + Sync {
    async fn size(&self) -> Size;
}

#[async_trait]
impl SizeResolver for Size {
    async fn size(&self) -> Size {
        *self
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// One recorded target callback.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TargetEvent {
        Start(Option<Drawable>),
        Success(Drawable),
        Error(Option<Drawable>),
    }

    /// Target that records every callback.
    #[derive(Default)]
    pub struct RecordingTarget {
        view: Option<Arc<View>>,
        events: Mutex<Vec<TargetEvent>>,
    }

    impl RecordingTarget {
        /// Creates a target bound to `view`.
        pub fn for_view(view: Arc<View>) -> Self {
            Self {
                view: Some(view),
                events: Mutex::new(Vec::new()),
            }
        }

        /// Returns a snapshot of the recorded callbacks.
        pub fn events(&self) -> Vec<TargetEvent> {
            self.events.lock().clone()
        }
    }

    impl Target for RecordingTarget {
        fn on_start(&self, placeholder: Option<&Drawable>) {
            self.events.lock().push(TargetEvent::Start(placeholder.cloned()));
        }

        fn on_success(&self, result: &Drawable) {
            self.events.lock().push(TargetEvent::Success(result.clone()));
        }

        fn on_error(&self, error: Option<&Drawable>) {
            self.events.lock().push(TargetEvent::Error(error.cloned()));
        }

        fn view(&self) -> Option<Arc<View>> {
            self.view.clone()
        }
    }
}
