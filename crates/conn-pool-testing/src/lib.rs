//! # conn-pool-testing
//!
//! Test infrastructure for exercising `conn-pool` under concurrency.
//!
//! Pool-dependent scenario and property tests live in this crate's `tests/`
//! directory so `conn-pool` itself carries no dev-dependency on its own
//! test harness.
//!
//! ## Contents
//!
//! - [`MockFactory`] / [`MockConnection`]: counting factory with optional
//!   latency and scripted failures
//! - [`OccupancyTracker`]: detects the same resource being held twice
//! - [`StatusSampler`]: background thread recording pool snapshots
//! - [`init_test_tracing`]: route `tracing` output to the test harness

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock;
pub mod sampler;
pub mod tracker;

pub use mock::{MockConnection, MockError, MockFactory};
pub use sampler::{SampleReport, StatusSampler};
pub use tracker::{OccupancyGuard, OccupancyTracker};

use tracing_subscriber::EnvFilter;

/// Install a subscriber that writes through the test harness.
///
/// Filtering follows `RUST_LOG`. Safe to call from every test; only the
/// first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
