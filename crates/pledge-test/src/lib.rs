//! Pledge Test Harness - Behavioural validation of deferred semantics
//!
//! This crate provides:
//! - A callback recorder that logs every notification in order
//! - Foreign thenables for assimilation tests
//! - A seeded settlement fuzzer with a reference model
//! - Scenario and property suites (test builds only)

pub mod fakes;
pub mod fuzzer;
pub mod recorder;

#[cfg(test)]
mod scenarios;

pub use fakes::*;
pub use fuzzer::*;
pub use recorder::*;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
