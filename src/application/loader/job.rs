use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::domain::entities::ImageResult;
use crate::domain::errors::ImageError;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// How a job ended.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed(ImageResult),
    Cancelled,
}

/// Handle to one in-flight execution of a request.
#[derive(Clone)]
pub struct Job {
    id: u64,
    token: CancellationToken,
    outcome: watch::Receiver<Option<JobOutcome>>,
}

/// Publishes the outcome of a [`Job`]. Dropping it unpublished reads as a
/// cancellation.
pub(crate) struct JobCompleter {
    tx: watch::Sender<Option<JobOutcome>>,
}

impl JobCompleter {
    pub(crate) fn complete(self, outcome: JobOutcome) {
        self.tx.send_replace(Some(outcome));
    }
}

impl Job {
    /// Creates a job whose token is a child of `parent`.
    pub(crate) fn new(parent: &CancellationToken) -> (Self, JobCompleter) {
        Self::with_token(parent.child_token())
    }

    pub(crate) fn with_token(token: CancellationToken) -> (Self, JobCompleter) {
        let (tx, outcome) = watch::channel(None);
        let job = Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            token,
            outcome,
        };
        (job, JobCompleter { tx })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Requests cancellation. Has no effect once the job completed.
    pub fn cancel(&self) {
        if !self.is_completed() {
            self.token.cancel();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match &*self.outcome.borrow() {
            Some(JobOutcome::Cancelled) => true,
            Some(JobOutcome::Completed(_)) => false,
            None => self.token.is_cancelled(),
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// True until the job completes or is cancelled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.is_completed() && !self.token.is_cancelled()
    }

    /// The result, if the job completed without being cancelled.
    #[must_use]
    pub fn completed_result(&self) -> Option<ImageResult> {
        match &*self.outcome.borrow() {
            Some(JobOutcome::Completed(result)) => Some(result.clone()),
            _ => None,
        }
    }

    /// Waits for the job to finish.
    ///
    /// # Errors
    /// Returns [`ImageError::Cancelled`] if the job was cancelled.
    pub async fn await_result(&self) -> Result<ImageResult, ImageError> {
        let mut outcome = self.outcome.clone();
        let outcome = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ImageError::Cancelled)?
            .clone();
        match outcome {
            Some(JobOutcome::Completed(result)) => Ok(result),
            _ => Err(ImageError::Cancelled),
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("completed", &self.is_completed())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ErrorResult, ImageRequest};

    fn result() -> ImageResult {
        ImageResult::Error(ErrorResult {
            drawable: None,
            request: ImageRequest::builder("x").build(),
            error: ImageError::decode("bad"),
        })
    }

    #[tokio::test]
    async fn test_completed_job_delivers_result() {
        let (job, completer) = Job::new(&CancellationToken::new());
        assert!(job.is_active());

        completer.complete(JobOutcome::Completed(result()));

        assert!(job.await_result().await.is_ok());
        assert!(job.is_completed());
        assert!(!job.is_active());
        assert!(job.completed_result().is_some());
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_ignored() {
        let (job, completer) = Job::new(&CancellationToken::new());
        completer.complete(JobOutcome::Completed(result()));

        job.cancel();

        assert!(!job.is_cancelled());
        assert!(job.completed_result().is_some());
    }

    #[tokio::test]
    async fn test_dropped_completer_reads_as_cancelled() {
        let (job, completer) = Job::new(&CancellationToken::new());
        drop(completer);
        assert_eq!(job.await_result().await.err(), Some(ImageError::Cancelled));
    }

    #[test]
    fn test_parent_cancellation_reaches_job() {
        let parent = CancellationToken::new();
        let (job, _completer) = Job::new(&parent);

        parent.cancel();

        assert!(job.is_cancelled());
        assert!(!job.is_active());
    }
}
