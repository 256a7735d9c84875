//! Background monitoring of pool snapshots.

use std::panic;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use conn_pool::{Pool, PoolStatus};

/// Samples [`Pool::status`] from a separate thread, the way an external
/// monitor would.
#[derive(Debug)]
pub struct StatusSampler {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Vec<PoolStatus>>,
}

impl StatusSampler {
    /// Start sampling `pool` every `interval`. A zero interval samples as
    /// fast as the thread is scheduled.
    pub fn spawn<R: Send + 'static>(pool: Pool<R>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let mut samples = Vec::new();
            loop {
                samples.push(pool.status());
                if flag.load(Ordering::Acquire) {
                    break;
                }
                if interval.is_zero() {
                    thread::yield_now();
                } else {
                    thread::sleep(interval);
                }
            }
            samples
        });

        Self { stop, handle }
    }

    /// Stop sampling and collect what was observed.
    ///
    /// A panic on the sampling thread is re-raised here.
    pub fn stop(self) -> SampleReport {
        self.stop.store(true, Ordering::Release);
        match self.handle.join() {
            Ok(samples) => SampleReport { samples },
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

/// Snapshots gathered by a [`StatusSampler`].
#[derive(Debug, Clone, Default)]
pub struct SampleReport {
    /// Every observed snapshot, in order.
    pub samples: Vec<PoolStatus>,
}

impl SampleReport {
    /// Snapshots that break `in_use <= alive <= capacity` or
    /// `idle + in_use == alive`.
    #[must_use]
    pub fn inconsistent(&self) -> Vec<PoolStatus> {
        self.samples
            .iter()
            .filter(|status| !status.is_consistent())
            .copied()
            .collect()
    }

    /// Largest `alive` count observed.
    #[must_use]
    pub fn max_alive(&self) -> usize {
        self.samples.iter().map(|s| s.alive).max().unwrap_or(0)
    }

    /// Largest `in_use` count observed.
    #[must_use]
    pub fn max_in_use(&self) -> usize {
        self.samples.iter().map(|s| s.in_use).max().unwrap_or(0)
    }

    /// Whether `alive` never went down between samples.
    #[must_use]
    pub fn alive_is_monotonic(&self) -> bool {
        self.samples.windows(2).all(|w| w[0].alive <= w[1].alive)
    }
}
