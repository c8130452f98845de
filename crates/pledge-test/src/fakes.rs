//! Foreign thenables
//!
//! Minimal objects that satisfy the [`Thenable`] capability without being
//! a `Promise`. They settle synchronously inside `subscribe`.

use std::sync::Arc;

use pledge_core::{AdoptFulfilled, AdoptRejected, Payload, Resolution, Thenable};

/// Thenable that is already fulfilled with a value
#[derive(Clone, Debug)]
pub struct FakeResolved<T>(pub T);

impl<T, E> Thenable<T, E> for FakeResolved<T>
where
    T: Payload + Sync,
    E: Payload,
{
    fn subscribe(&self, on_fulfilled: AdoptFulfilled<T, E>, _on_rejected: AdoptRejected<E>) {
        on_fulfilled(Resolution::Value(self.0.clone()));
    }
}

/// Thenable that is already rejected with a reason
#[derive(Clone, Debug)]
pub struct FakeRejected<E>(pub E);

impl<T, E> Thenable<T, E> for FakeRejected<E>
where
    T: Payload,
    E: Payload + Sync,
{
    fn subscribe(&self, _on_fulfilled: AdoptFulfilled<T, E>, on_rejected: AdoptRejected<E>) {
        on_rejected(self.0.clone());
    }
}

/// Thenable that fulfils with another thenable
pub struct FakeChain<T, E> {
    next: Arc<dyn Thenable<T, E>>,
}

impl<T, E> FakeChain<T, E>
where
    T: Payload + Sync,
    E: Payload,
{
    pub fn new(next: impl Thenable<T, E> + 'static) -> Self {
        FakeChain {
            next: Arc::new(next),
        }
    }

    /// `depth` nested layers around a fulfilled thenable
    pub fn nested(depth: usize, value: T) -> Self {
        let mut next: Arc<dyn Thenable<T, E>> = Arc::new(FakeResolved(value));
        for _ in 1..depth {
            next = Arc::new(FakeChain { next });
        }
        FakeChain { next }
    }
}

impl<T: Payload, E: Payload> Thenable<T, E> for FakeChain<T, E> {
    fn subscribe(&self, on_fulfilled: AdoptFulfilled<T, E>, _on_rejected: AdoptRejected<E>) {
        on_fulfilled(Resolution::Thenable(Arc::clone(&self.next)));
    }
}

/// Thenable that breaks its contract by calling both continuations
#[derive(Clone, Debug)]
pub struct FakeUnruly<T, E> {
    pub value: T,
    pub reason: E,
}

impl<T, E> Thenable<T, E> for FakeUnruly<T, E>
where
    T: Payload + Sync,
    E: Payload + Sync,
{
    fn subscribe(&self, on_fulfilled: AdoptFulfilled<T, E>, on_rejected: AdoptRejected<E>) {
        on_fulfilled(Resolution::Value(self.value.clone()));
        on_rejected(self.reason.clone());
    }
}
