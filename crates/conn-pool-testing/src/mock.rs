//! Mock resources and factories.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use conn_pool::{BoxError, ResourceFactory, ResourceId};
use thiserror::Error;

/// Errors produced by [`MockFactory`].
#[derive(Debug, Error)]
pub enum MockError {
    /// A scripted creation failure.
    #[error("mock connection refused on attempt {attempt}")]
    Refused {
        /// Zero-based creation attempt that failed.
        attempt: usize,
    },
}

/// Stand-in for a network connection.
#[derive(Debug)]
pub struct MockConnection {
    id: ResourceId,
    uses: u64,
}

impl MockConnection {
    /// Pool-assigned identity.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Record one use of the connection.
    pub fn touch(&mut self) {
        self.uses += 1;
    }

    /// How many times [`touch`](Self::touch) was called.
    #[must_use]
    pub fn uses(&self) -> u64 {
        self.uses
    }
}

/// Factory that counts what it creates.
///
/// Clones share counters, so a test can keep one clone and hand the other to
/// the pool.
#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    counters: Arc<Counters>,
    fail_first: usize,
    latency: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicUsize,
    created: AtomicUsize,
}

impl MockFactory {
    /// A factory that always succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` inside every creation.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the first `n` creation attempts.
    #[must_use]
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    /// Number of times the factory was called.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.counters.attempts.load(Ordering::SeqCst)
    }

    /// Number of connections successfully created.
    #[must_use]
    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }
}

impl ResourceFactory<MockConnection> for MockFactory {
    fn create(&self, id: ResourceId) -> Result<MockConnection, BoxError> {
        let attempt = self.counters.attempts.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        if attempt < self.fail_first {
            tracing::debug!(attempt, id = %id, "mock factory refusing connection");
            return Err(MockError::Refused { attempt }.into());
        }

        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection { id, uses: 0 })
    }
}
