//! Pledge Core - Deferred values and their observers
//!
//! This crate implements the deferred computation primitive:
//! - One-shot settlement state machine (pending, fulfilled, rejected)
//! - Ordered observer fan-out with late-registration replay
//! - Progress notifications while pending
//! - `then` chaining with handler-driven derived deferreds
//! - Assimilation of thenables (flattening nested pending values)
//! - Pluggable notification schedulers

pub mod config;
pub mod deferred;
pub mod error;
pub mod observer;
pub mod promise;
pub mod scheduler;
pub mod state;
pub mod thenable;

mod inner;

pub use config::*;
pub use deferred::*;
pub use error::*;
pub use observer::*;
pub use promise::*;
pub use scheduler::*;
pub use state::*;
pub use thenable::*;
