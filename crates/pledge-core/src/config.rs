//! Deferred configuration

use std::fmt;
use std::sync::Arc;

use crate::{Immediate, Scheduler, TaskQueue, TokioScheduler};

/// Deferred configuration
///
/// Deferreds derived through `then` inherit their parent's configuration.
#[derive(Clone)]
pub struct DeferredConfig {
    /// Where observer notifications run
    pub scheduler: Arc<dyn Scheduler>,
    /// Name attached to this deferred's log events
    pub label: Option<String>,
}

impl Default for DeferredConfig {
    fn default() -> Self {
        DeferredConfig {
            scheduler: Arc::new(Immediate),
            label: None,
        }
    }
}

impl DeferredConfig {
    /// Notifications wait in `queue` until it is drained
    pub fn queued(queue: &TaskQueue) -> Self {
        DeferredConfig {
            scheduler: Arc::new(queue.clone()),
            label: None,
        }
    }

    /// Notifications run on a tokio worker task
    pub fn tokio(scheduler: TokioScheduler) -> Self {
        DeferredConfig {
            scheduler: Arc::new(scheduler),
            label: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Debug for DeferredConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredConfig")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
