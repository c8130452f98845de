//! Settlement state machine
//!
//! A deferred starts `Pending` and leaves it exactly once, into either
//! `Fulfilled` or `Rejected`. Both are terminal. Progress is not a state:
//! it is an event that may only be emitted while pending.
//!
//! Resolving with a thenable keeps the deferred `Pending` but marks it as
//! adopting. From then on only the adopted thenable may settle it.

use std::fmt;

use crate::{PledgeError, PledgeResult};

/// Bound shared by settled values, rejection reasons, and progress updates.
///
/// Values are cloned once per observer during fan-out and again for every
/// late registration.
pub trait Payload: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> Payload for T {}

/// Externally visible settlement status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

impl Status {
    #[inline]
    pub fn is_settled(self) -> bool {
        self != Status::Pending
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::Fulfilled => write!(f, "fulfilled"),
            Status::Rejected => write!(f, "rejected"),
        }
    }
}

/// Producer operation, reported when a transition is refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Resolve,
    Reject,
    Progress,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Resolve => write!(f, "resolve"),
            Operation::Reject => write!(f, "reject"),
            Operation::Progress => write!(f, "progress"),
        }
    }
}

/// Tagged settlement state with guarded transitions
#[derive(Clone, Debug)]
pub(crate) enum State<T, E> {
    Pending { adopting: bool },
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Default for State<T, E> {
    fn default() -> Self {
        State::Pending { adopting: false }
    }
}

impl<T, E> State<T, E> {
    pub fn status(&self) -> Status {
        match self {
            State::Pending { .. } => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }

    pub fn is_adopting(&self) -> bool {
        matches!(self, State::Pending { adopting: true })
    }

    /// Guard for calls made by the producer.
    ///
    /// Adoption consumes the producer's one-shot right, so an adopting
    /// deferred refuses producer calls even though it is still pending.
    pub fn check_producer(&self, operation: Operation) -> PledgeResult<()> {
        match self {
            State::Pending { adopting: false } => Ok(()),
            _ => Err(self.refuse(operation)),
        }
    }

    /// Guard for calls made on behalf of a chain or an adopted thenable.
    pub fn check_pending(&self, operation: Operation) -> PledgeResult<()> {
        match self {
            State::Pending { .. } => Ok(()),
            _ => Err(self.refuse(operation)),
        }
    }

    /// Producer resolved with a thenable.
    pub fn adopt(&mut self) -> PledgeResult<()> {
        self.check_producer(Operation::Resolve)?;
        self.follow()
    }

    /// Start (or keep) following a thenable. A thenable may fulfil with
    /// another thenable, so this is allowed while already adopting.
    pub fn follow(&mut self) -> PledgeResult<()> {
        self.check_pending(Operation::Resolve)?;
        *self = State::Pending { adopting: true };
        Ok(())
    }

    /// The single transition out of `Pending`.
    pub fn settle(&mut self, outcome: Result<T, E>) -> PledgeResult<()> {
        let operation = match outcome {
            Ok(_) => Operation::Resolve,
            Err(_) => Operation::Reject,
        };
        self.check_pending(operation)?;

        *self = match outcome {
            Ok(value) => State::Fulfilled(value),
            Err(reason) => State::Rejected(reason),
        };
        Ok(())
    }

    fn refuse(&self, operation: Operation) -> PledgeError {
        PledgeError::InvalidState {
            operation,
            status: self.status(),
        }
    }
}

impl<T: Clone, E: Clone> State<T, E> {
    /// Settled outcome, if any
    pub fn outcome(&self) -> Option<Result<T, E>> {
        match self {
            State::Pending { .. } => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }
}
