//! Callback recorder
//!
//! Hands out observer triples that append every invocation to one shared,
//! ordered log, tagged with the observer's index.

use std::sync::Arc;

use parking_lot::Mutex;
use pledge_core::{Callbacks, Payload, Promise, Registration};

/// One recorded callback invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification<T, E, P> {
    Fulfilled { observer: usize, value: T },
    Rejected { observer: usize, reason: E },
    Progress { observer: usize, update: P },
}

impl<T, E, P> Notification<T, E, P> {
    pub fn observer(&self) -> usize {
        match self {
            Notification::Fulfilled { observer, .. }
            | Notification::Rejected { observer, .. }
            | Notification::Progress { observer, .. } => *observer,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Progress { .. })
    }
}

/// Shared notification log
pub struct Recorder<T, E, P = ()> {
    log: Arc<Mutex<Vec<Notification<T, E, P>>>>,
}

impl<T, E, P> Clone for Recorder<T, E, P> {
    fn clone(&self) -> Self {
        Recorder {
            log: Arc::clone(&self.log),
        }
    }
}

impl<T: Payload, E: Payload, P: Payload> Default for Recorder<T, E, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Payload, E: Payload, P: Payload> Recorder<T, E, P> {
    pub fn new() -> Self {
        Recorder {
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Observer triple that records under `observer`
    pub fn callbacks(&self, observer: usize) -> Callbacks<T, E, P> {
        let (f, r, p) = (self.log.clone(), self.log.clone(), self.log.clone());
        Callbacks::new()
            .on_fulfilled(move |value| f.lock().push(Notification::Fulfilled { observer, value }))
            .on_rejected(move |reason| r.lock().push(Notification::Rejected { observer, reason }))
            .on_progress(move |update| p.lock().push(Notification::Progress { observer, update }))
    }

    /// Register a recording observer on `promise`
    pub fn attach(&self, promise: &Promise<T, E, P>, observer: usize) -> Registration {
        promise.register(self.callbacks(observer))
    }

    pub fn notifications(&self) -> Vec<Notification<T, E, P>> {
        self.log.lock().clone()
    }

    pub fn for_observer(&self, observer: usize) -> Vec<Notification<T, E, P>> {
        self.log
            .lock()
            .iter()
            .filter(|n| n.observer() == observer)
            .cloned()
            .collect()
    }

    /// Terminal notifications received by `observer`
    pub fn terminal_count(&self, observer: usize) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|n| n.observer() == observer && n.is_terminal())
            .count()
    }

    /// First terminal outcome received by `observer`
    pub fn outcome(&self, observer: usize) -> Option<Result<T, E>> {
        self.log.lock().iter().find_map(|n| match n {
            Notification::Fulfilled { observer: o, value } if *o == observer => Some(Ok(value.clone())),
            Notification::Rejected { observer: o, reason } if *o == observer => Some(Err(reason.clone())),
            _ => None,
        })
    }

    pub fn progress_updates(&self, observer: usize) -> Vec<P> {
        self.log
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Progress { observer: o, update } if *o == observer => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}
