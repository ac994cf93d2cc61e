use std::future::Future;

use tokio::runtime::Handle;

use crate::domain::errors::ImageError;

/// Where a pipeline stage runs.
#[derive(Debug, Clone, Default)]
pub enum Dispatcher {
    /// Run the stage inline on the request's own task.
    #[default]
    Immediate,
    /// Spawn the stage on this runtime. The spawned task is aborted if the
    /// request stops waiting for it.
    Runtime(Handle),
}

impl Dispatcher {
    /// Spawns on the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::Runtime(Handle::current())
    }

    /// Runs `stage` on this dispatcher and waits for its output.
    ///
    /// # Errors
    ///
    /// Returns the stage's own error, [`ImageError::Cancelled`] if the spawned
    /// task was aborted, or [`ImageError::Component`] if it panicked.
    pub async fn run<F, T>(&self, stage: F) -> Result<T, ImageError>
    where
        F: Future<Output = Result<T, ImageError>> + Send + 'static,
        T: Send + 'static,
    {
        match self {
            Self::Immediate => stage.await,
            Self::Runtime(handle) => {
                let mut task = AbortOnDrop(handle.spawn(stage));
                match (&mut task.0).await {
                    Ok(output) => output,
                    Err(e) if e.is_cancelled() => Err(ImageError::Cancelled),
                    Err(e) => Err(ImageError::component(format!("pipeline stage panicked: {e}"))),
                }
            }
        }
    }
}

struct AbortOnDrop<T>(tokio::task::JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_immediate_runs_inline() {
        let output = Dispatcher::Immediate.run(async { Ok(7) }).await;
        assert_eq!(output.ok(), Some(7));
    }

    #[tokio::test]
    async fn test_runtime_propagates_stage_error() {
        let dispatcher = Dispatcher::current();
        let output: Result<(), _> = dispatcher
            .run(async { Err(ImageError::decode("bad header")) })
            .await;
        assert!(matches!(output, Err(ImageError::Decode(_))));
    }

    #[tokio::test]
    async fn test_runtime_aborts_stage_when_dropped() {
        let dispatcher = Dispatcher::current();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let run = dispatcher.run(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
            Ok(())
        });
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), run).await;
        assert!(timed_out.is_err());
        assert!(rx.await.is_err());
    }
}
