//! Observer registration
//!
//! An observer is a triple of optional callbacks. Terminal callbacks are
//! `FnOnce` because at most one of them fires, at most once. The progress
//! callback is shared (`Arc<dyn Fn>`) since it may fire any number of
//! times before settlement.

use std::fmt;
use std::sync::Arc;

/// Fulfilment callback
pub type FulfilledFn<T> = Box<dyn FnOnce(T) + Send>;
/// Rejection callback
pub type RejectedFn<E> = Box<dyn FnOnce(E) + Send>;
/// Progress callback
pub type ProgressFn<P> = Arc<dyn Fn(P) + Send + Sync>;
/// Runs instead of a terminal callback when the deferred is abandoned
pub(crate) type AbandonFn = Box<dyn FnOnce() + Send>;

/// Observer callback triple
///
/// Each callback is independently optional. A missing callback simply is
/// not invoked for that event.
pub struct Callbacks<T, E, P = ()> {
    pub(crate) on_fulfilled: Option<FulfilledFn<T>>,
    pub(crate) on_rejected: Option<RejectedFn<E>>,
    pub(crate) on_progress: Option<ProgressFn<P>>,
    pub(crate) on_abandon: Option<AbandonFn>,
}

impl<T, E, P> Callbacks<T, E, P> {
    pub fn new() -> Self {
        Callbacks {
            on_fulfilled: None,
            on_rejected: None,
            on_progress: None,
            on_abandon: None,
        }
    }

    pub fn on_fulfilled(mut self, f: impl FnOnce(T) + Send + 'static) -> Self {
        self.on_fulfilled = Some(Box::new(f));
        self
    }

    pub fn on_rejected(mut self, f: impl FnOnce(E) + Send + 'static) -> Self {
        self.on_rejected = Some(Box::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl Fn(P) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    /// Hook for chains: told when the deferred will never settle.
    pub(crate) fn on_abandon(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_abandon = Some(Box::new(f));
        self
    }

    /// True when no callback is set
    pub fn is_empty(&self) -> bool {
        self.on_fulfilled.is_none() && self.on_rejected.is_none() && self.on_progress.is_none()
    }
}

impl<T, E, P> Default for Callbacks<T, E, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E, P> fmt::Debug for Callbacks<T, E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_fulfilled", &self.on_fulfilled.is_some())
            .field("on_rejected", &self.on_rejected.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Handle returned by `register`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registration {
    /// Position in registration order
    pub seq: u64,
    /// The deferred had already settled, so the terminal callback was
    /// dispatched straight away instead of being queued.
    pub replayed: bool,
}

/// Queued observer
pub(crate) struct Observer<T, E, P> {
    pub seq: u64,
    pub callbacks: Callbacks<T, E, P>,
}
