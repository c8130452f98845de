//! Notification schedulers
//!
//! Settlement never runs observer callbacks while the deferred is locked.
//! Instead each callback becomes a [`Job`] handed to the deferred's
//! [`Scheduler`], which decides when it runs. Every scheduler here runs
//! jobs in the order they were scheduled.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A unit of notification work
pub type Job = Box<dyn FnOnce() + Send>;

/// Dispatch strategy for observer notifications
pub trait Scheduler: Send + Sync {
    /// Run `job` now or later. Jobs must run in scheduling order.
    fn schedule(&self, job: Job);
}

/// Runs every job inline on the notifying thread
#[derive(Clone, Copy, Debug, Default)]
pub struct Immediate;

impl Scheduler for Immediate {
    #[inline]
    fn schedule(&self, job: Job) {
        job();
    }
}

/// FIFO task queue drained explicitly by the host
///
/// Cloning a `TaskQueue` yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    jobs: Arc<Mutex<VecDeque<Job>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue::default()
    }

    /// Number of jobs waiting
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Run the oldest job. Returns false if the queue was empty.
    pub fn run_one(&self) -> bool {
        let job = self.jobs.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until the queue is empty, including jobs scheduled by the
    /// jobs themselves. Returns how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for TaskQueue {
    fn schedule(&self, job: Job) {
        self.jobs.lock().push_back(job);
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}

/// Single worker task on a tokio runtime
///
/// Jobs are sent over an unbounded channel and run one after another by
/// the worker, so scheduling order is preserved.
#[derive(Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<Job>,
}

impl TokioScheduler {
    /// Spawn the worker on the current runtime.
    ///
    /// Panics if called outside a tokio runtime, like `tokio::spawn`.
    pub fn spawn() -> Self {
        Self::spawn_on(&Handle::current())
    }

    /// Spawn the worker on a specific runtime
    pub fn spawn_on(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
        });

        TokioScheduler { tx }
    }

    /// Whether the worker is still accepting jobs
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::warn!("Scheduler worker stopped; dropping notification");
        }
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("running", &self.is_running())
            .finish()
    }
}
