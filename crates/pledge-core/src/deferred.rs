//! Deferred - the write side
//!
//! The producer holds the [`Deferred`] and settles it exactly once with
//! [`resolve`](Deferred::resolve) or [`reject`](Deferred::reject), optionally
//! emitting [`progress`](Deferred::progress) before that. Consumers only
//! get the [`Promise`].
//!
//! Any settlement operation after the first `resolve` or `reject` fails
//! with [`PledgeError::InvalidState`](crate::PledgeError::InvalidState).
//! This includes a `resolve` with a thenable that has not settled yet.

use std::fmt;

use crate::inner::{Inner, Origin};
use crate::{DeferredConfig, Payload, PledgeResult, Promise, Resolution, Status};

/// Producer handle of a deferred computation
pub struct Deferred<T, E, P = ()> {
    promise: Promise<T, E, P>,
}

/// Create a pending deferred with the default configuration
pub fn defer<T: Payload, E: Payload, P: Payload>() -> Deferred<T, E, P> {
    Deferred::new()
}

impl<T: Payload, E: Payload, P: Payload> Deferred<T, E, P> {
    pub fn new() -> Self {
        Self::with_config(DeferredConfig::default())
    }

    pub fn with_config(config: DeferredConfig) -> Self {
        Deferred {
            promise: Promise {
                inner: Inner::new(config),
            },
        }
    }

    /// The consumer half
    pub fn promise(&self) -> Promise<T, E, P> {
        self.promise.clone()
    }

    /// Fulfil with a value, or adopt the outcome of a thenable.
    pub fn resolve(&self, value: impl Into<Resolution<T, E>>) -> PledgeResult<()> {
        self.promise.inner.resolve(value.into(), Origin::Producer)
    }

    pub fn reject(&self, reason: E) -> PledgeResult<()> {
        self.promise.inner.settle(Err(reason), Origin::Producer)
    }

    /// Notify progress observers registered so far. Updates are not kept
    /// for later observers.
    pub fn progress(&self, update: P) -> PledgeResult<()> {
        self.promise.inner.progress(update, Origin::Producer)
    }

    pub fn status(&self) -> Status {
        self.promise.status()
    }

    /// Resolved with a thenable that has not settled yet
    pub fn is_adopting(&self) -> bool {
        self.promise.inner.is_adopting()
    }
}

impl<T: Payload, E: Payload, P: Payload> Default for Deferred<T, E, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E, P> Clone for Deferred<T, E, P> {
    fn clone(&self) -> Self {
        Deferred {
            promise: self.promise.clone(),
        }
    }
}

impl<T: Payload, E: Payload, P: Payload> fmt::Debug for Deferred<T, E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("status", &self.status())
            .field("adopting", &self.is_adopting())
            .finish()
    }
}
