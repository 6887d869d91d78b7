//! Bounded pool for running work off the caller's task.
//!
//! Each submitted future is spawned immediately onto the tokio runtime and then waits
//! for one of the pool's permits, so at most `size` jobs make progress at once. The
//! returned [`TaskHandle`] resolves to the job's output. Dropping the handle detaches
//! the job; it still runs to completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};

/// Why a pooled job produced no output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The job panicked.
    #[error("Worker task panicked: {0}")]
    Panicked(String),

    /// The job was cancelled by runtime shutdown.
    #[error("Worker task was cancelled")]
    Cancelled,

    /// The pool was closed before the job obtained a permit.
    #[error("Worker pool is closed")]
    Closed,
}

impl From<JoinError> for WorkerError {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            Self::Panicked(err.to_string())
        } else {
            Self::Cancelled
        }
    }
}

/// Semaphore-limited pool of spawned tasks.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool allowing `size` concurrent jobs (minimum one).
    #[must_use]
    pub fn new(name: &'static str, size: usize) -> Self {
        let size = size.max(1);
        Self {
            name,
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Maximum concurrent jobs.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running job.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Submit a job. Must be called from within a tokio runtime.
    pub fn submit<F, T>(&self, job: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let pool = self.name;
        let inner = tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                tracing::warn!(pool, "Job rejected: worker pool closed");
                return Err(WorkerError::Closed);
            };
            Ok(job.await)
        });
        TaskHandle { inner }
    }

    /// Stop handing out permits. Jobs still waiting for one fail with
    /// [`WorkerError::Closed`]; running jobs are unaffected.
    pub fn close(&self) {
        self.permits.close();
    }
}

/// Completion handle for a pooled job.
///
/// Awaiting yields the job's output. Dropping it does not cancel the job.
#[derive(Debug)]
pub struct TaskHandle<T> {
    inner: JoinHandle<Result<T, WorkerError>>,
}

impl<T> TaskHandle<T> {
    /// Whether the job has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, WorkerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner)
            .poll(cx)
            .map(|joined| joined.map_err(WorkerError::from).and_then(|out| out))
    }
}
