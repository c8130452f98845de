//! Promise - the read side of a deferred
//!
//! A [`Promise`] lets consumers observe a deferred's outcome and build
//! chains on it. It cannot settle anything itself.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::inner::Inner;
use crate::{
    AdoptFulfilled, AdoptRejected, Callbacks, DeferredConfig, Payload, PledgeError, PledgeResult,
    Registration, Resolution, Status, Thenable,
};

/// What a chain handler produces: a resolution for the derived promise, or
/// a reason to reject it.
pub type Reaction<U, E> = Result<Resolution<U, E>, E>;

type FulfilledHandler<T, U, E> = Box<dyn FnOnce(T) -> Reaction<U, E> + Send>;
type RejectedHandler<U, E> = Box<dyn FnOnce(E) -> Reaction<U, E> + Send>;
type ProgressHandler<P, E> = Arc<dyn Fn(P) -> Result<P, E> + Send + Sync>;

/// Handlers for [`Promise::then`]
///
/// A missing rejection handler passes the reason through to the derived
/// promise, and a missing progress handler forwards updates unchanged.
/// [`Handlers::passthrough`] does the same for fulfilment.
///
/// A handler reports failure by returning `Err`. If a fulfilment or
/// rejection handler panics instead, the derived promise is abandoned: it
/// stays pending, its observers are dropped so [`Promise::settled`] yields
/// [`PledgeError::Abandoned`], and promises chained from it are abandoned
/// too.
pub struct Handlers<T, U, E, P = ()> {
    on_fulfilled: FulfilledHandler<T, U, E>,
    on_rejected: Option<RejectedHandler<U, E>>,
    on_progress: Option<ProgressHandler<P, E>>,
}

impl<T: Payload, E: 'static, P: 'static> Handlers<T, T, E, P> {
    /// Forward the fulfilment value unchanged
    pub fn passthrough() -> Self {
        Handlers {
            on_fulfilled: Box::new(|value| Ok(Resolution::Value(value))),
            on_rejected: None,
            on_progress: None,
        }
    }
}

impl<T, U, E, P> Handlers<T, U, E, P> {
    pub fn on_fulfilled(f: impl FnOnce(T) -> Reaction<U, E> + Send + 'static) -> Self {
        Handlers {
            on_fulfilled: Box::new(f),
            on_rejected: None,
            on_progress: None,
        }
    }

    pub fn on_rejected(mut self, f: impl FnOnce(E) -> Reaction<U, E> + Send + 'static) -> Self {
        self.on_rejected = Some(Box::new(f));
        self
    }

    /// Transform progress updates. `Err` rejects the derived promise.
    pub fn on_progress(mut self, f: impl Fn(P) -> Result<P, E> + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }
}

/// Read-only handle to a deferred's outcome
///
/// Cloning a `Promise` yields another handle to the same deferred.
pub struct Promise<T, E, P = ()> {
    pub(crate) inner: Arc<Inner<T, E, P>>,
}

impl<T, E, P> Clone for Promise<T, E, P> {
    fn clone(&self) -> Self {
        Promise {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Payload, E: Payload, P: Payload> Promise<T, E, P> {
    /// An already fulfilled promise
    pub fn resolved(value: T) -> Self {
        Promise {
            inner: Inner::settled(DeferredConfig::default(), Ok(value)),
        }
    }

    /// An already rejected promise
    pub fn rejected(reason: E) -> Self {
        Promise {
            inner: Inner::settled(DeferredConfig::default(), Err(reason)),
        }
    }

    pub fn status(&self) -> Status {
        self.inner.status()
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    /// The settled outcome, without registering anything
    pub fn peek(&self) -> Option<Result<T, E>> {
        self.inner.outcome()
    }

    /// Observers still waiting for settlement
    pub fn observer_count(&self) -> usize {
        self.inner.observer_count()
    }

    /// Register an observer triple.
    ///
    /// While pending the observer is queued. Once settled, the matching
    /// terminal callback is dispatched immediately and the progress callback
    /// is never called.
    pub fn register(&self, callbacks: Callbacks<T, E, P>) -> Registration {
        self.inner.register(callbacks)
    }

    /// Derive a promise from this one's outcome.
    pub fn then<U: Payload>(&self, handlers: Handlers<T, U, E, P>) -> Promise<U, E, P> {
        let child = Inner::new(self.inner.config().clone());
        let Handlers {
            on_fulfilled,
            on_rejected,
            on_progress,
        } = handlers;

        let fulfilled = Arc::clone(&child);
        let rejected = Arc::clone(&child);
        let progressed = Arc::clone(&child);
        let abandoned = Arc::clone(&child);

        self.inner.register(
            Callbacks::new()
                .on_fulfilled(move |value| react(&fulfilled, move || on_fulfilled(value)))
                .on_rejected(move |reason| match on_rejected {
                    Some(handler) => react(&rejected, move || handler(reason)),
                    None => rejected.complete(Err(reason)),
                })
                .on_abandon(move || abandoned.abandon("parent abandoned"))
                .on_progress(move |update| match &on_progress {
                    Some(handler) => match handler(update) {
                        Ok(update) => progressed.forward_progress(update),
                        Err(reason) => progressed.complete(Err(reason)),
                    },
                    None => progressed.forward_progress(update),
                }),
        );

        Promise { inner: child }
    }

    /// Transform the fulfilment value
    pub fn map<U: Payload>(&self, f: impl FnOnce(T) -> U + Send + 'static) -> Promise<U, E, P> {
        self.then(Handlers::on_fulfilled(move |value| {
            Ok(Resolution::Value(f(value)))
        }))
    }

    /// Chain a fallible step that may itself return a thenable
    pub fn and_then<U: Payload>(
        &self,
        f: impl FnOnce(T) -> Reaction<U, E> + Send + 'static,
    ) -> Promise<U, E, P> {
        self.then(Handlers::on_fulfilled(f))
    }

    /// Recover from a rejection
    pub fn or_else(&self, f: impl FnOnce(E) -> Reaction<T, E> + Send + 'static) -> Self {
        self.then(Handlers::passthrough().on_rejected(f))
    }

    /// Run `f` on either outcome and derive a promise from its reaction.
    pub fn always<U: Payload>(
        &self,
        f: impl FnOnce(Result<T, E>) -> Reaction<U, E> + Send + 'static,
    ) -> Promise<U, E, P> {
        let child = Inner::new(self.inner.config().clone());

        // Only one of the two terminal callbacks ever runs
        let handler = Arc::new(Mutex::new(Some(f)));
        let on_rejected = Arc::clone(&handler);

        let fulfilled = Arc::clone(&child);
        let rejected = Arc::clone(&child);
        let progressed = Arc::clone(&child);
        let abandoned = Arc::clone(&child);

        self.inner.register(
            Callbacks::new()
                .on_fulfilled(move |value| {
                    let f = handler.lock().take();
                    if let Some(f) = f {
                        react(&fulfilled, move || f(Ok(value)));
                    }
                })
                .on_rejected(move |reason| {
                    let f = on_rejected.lock().take();
                    if let Some(f) = f {
                        react(&rejected, move || f(Err(reason)));
                    }
                })
                .on_progress(move |update| progressed.forward_progress(update))
                .on_abandon(move || abandoned.abandon("parent abandoned")),
        );

        Promise { inner: child }
    }

    /// Future that completes with the outcome.
    ///
    /// Yields [`PledgeError::Abandoned`] if every handle to the deferred is
    /// dropped while it is still pending, or if the promise was abandoned
    /// by a panicking chain handler.
    pub fn settled(&self) -> impl Future<Output = PledgeResult<Result<T, E>>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let on_fulfilled = Arc::new(Mutex::new(Some(tx)));
        let on_rejected = Arc::clone(&on_fulfilled);

        self.inner.register(
            Callbacks::new()
                .on_fulfilled(move |value| {
                    if let Some(tx) = on_fulfilled.lock().take() {
                        let _ = tx.send(Ok(value));
                    }
                })
                .on_rejected(move |reason| {
                    if let Some(tx) = on_rejected.lock().take() {
                        let _ = tx.send(Err(reason));
                    }
                }),
        );

        async move { rx.await.map_err(|_| PledgeError::Abandoned) }
    }
}

/// Run a chain handler and feed its reaction into the derived deferred.
///
/// A panicking handler produces no reaction at all, so the derived
/// deferred is abandoned.
fn react<U: Payload, E: Payload, P: Payload>(
    child: &Arc<Inner<U, E, P>>,
    handler: impl FnOnce() -> Reaction<U, E>,
) {
    match panic::catch_unwind(AssertUnwindSafe(handler)) {
        Ok(Ok(resolution)) => child.follow(resolution),
        Ok(Err(reason)) => child.complete(Err(reason)),
        Err(_) => {
            tracing::error!(label = ?child.config().label, "Chain handler panicked");
            child.abandon("handler panicked");
        }
    }
}

impl<T: Payload, E: Payload, P: Payload> Thenable<T, E> for Promise<T, E, P> {
    fn subscribe(&self, on_fulfilled: AdoptFulfilled<T, E>, on_rejected: AdoptRejected<E>) {
        self.register(
            Callbacks::new()
                .on_fulfilled(move |value| on_fulfilled(Resolution::Value(value)))
                .on_rejected(on_rejected),
        );
    }

    fn cell_id(&self) -> Option<usize> {
        Some(self.inner.id())
    }
}

impl<T: Payload, E: Payload, P: Payload> fmt::Debug for Promise<T, E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("label", &self.inner.config().label)
            .field("status", &self.status())
            .field("observers", &self.observer_count())
            .finish()
    }
}
