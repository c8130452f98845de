//! Thenable capability and resolution values
//!
//! Whether a resolution value is adopted or stored is decided by capability,
//! not by concrete type: anything implementing [`Thenable`] is followed
//! until it produces a plain value or a rejection.

use std::fmt;
use std::sync::Arc;

/// Fulfilment continuation handed to a thenable
pub type AdoptFulfilled<T, E> = Box<dyn FnOnce(Resolution<T, E>) + Send>;
/// Rejection continuation handed to a thenable
pub type AdoptRejected<E> = Box<dyn FnOnce(E) + Send>;

/// A value that can report an eventual outcome to subscribers
///
/// Implementors must call at most one of the two continuations, at most
/// once. Fulfilling with another thenable is allowed and is followed in
/// turn.
pub trait Thenable<T, E>: Send + Sync {
    fn subscribe(&self, on_fulfilled: AdoptFulfilled<T, E>, on_rejected: AdoptRejected<E>);

    /// Identity of the deferred behind this thenable, if it has one.
    ///
    /// A deferred refuses to follow a thenable reporting its own identity.
    fn cell_id(&self) -> Option<usize> {
        None
    }
}

/// What a deferred is resolved with
pub enum Resolution<T, E> {
    /// Settle with this value
    Value(T),
    /// Follow this thenable's outcome
    Thenable(Arc<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    pub fn thenable(thenable: impl Thenable<T, E> + 'static) -> Self {
        Resolution::Thenable(Arc::new(thenable))
    }

    #[inline]
    pub fn is_thenable(&self) -> bool {
        matches!(self, Resolution::Thenable(_))
    }
}

impl<T, E> From<T> for Resolution<T, E> {
    fn from(value: T) -> Self {
        Resolution::Value(value)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}
