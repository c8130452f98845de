//! Error types for Pledge

use thiserror::Error;

use crate::{Operation, Status};

/// Errors raised by the producer side of a deferred.
///
/// Handler failures are not represented here: they travel down a chain as
/// ordinary rejections carrying the caller's own reason type.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PledgeError {
    /// A settlement operation was attempted on a deferred that already
    /// settled, or that is already following a thenable.
    #[error("Invalid state: cannot {operation} a deferred that was already resolved ({status})")]
    InvalidState { operation: Operation, status: Status },

    /// A deferred was resolved with its own promise.
    #[error("Cannot resolve a deferred with its own promise")]
    SelfResolution,

    /// The deferred can never settle: every handle to it was dropped while
    /// pending, or the chain handler that should have settled it panicked.
    #[error("Deferred abandoned before settlement")]
    Abandoned,
}

/// Result type for Pledge operations
pub type PledgeResult<T> = Result<T, PledgeError>;

impl PledgeError {
    #[inline]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, PledgeError::InvalidState { .. })
    }
}
