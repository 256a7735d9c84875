//! Exclusive-ownership checking.

use std::sync::atomic::{AtomicUsize, Ordering};

use conn_pool::ResourceId;
use hashbrown::HashSet;
use parking_lot::Mutex;

/// Records which resources are held right now, as seen by the callers.
///
/// Each worker enters the tracker right after acquiring and leaves right
/// before releasing. Entering with an id that is already held means the pool
/// handed the same resource to two callers.
#[derive(Debug, Default)]
pub struct OccupancyTracker {
    held: Mutex<HashSet<ResourceId>>,
    peak: AtomicUsize,
    double_issues: AtomicUsize,
    total: AtomicUsize,
}

impl OccupancyTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as held until the returned guard is dropped.
    pub fn hold(&self, id: ResourceId) -> OccupancyGuard<'_> {
        let mut held = self.held.lock();
        if !held.insert(id) {
            self.double_issues.fetch_add(1, Ordering::SeqCst);
            tracing::error!(id = %id, "resource issued to two holders");
        }
        self.peak.fetch_max(held.len(), Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        OccupancyGuard { tracker: self, id }
    }

    /// Number of resources held right now.
    #[must_use]
    pub fn current(&self) -> usize {
        self.held.lock().len()
    }

    /// Largest number of resources held at once.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of times an already-held id was entered again.
    #[must_use]
    pub fn double_issues(&self) -> usize {
        self.double_issues.load(Ordering::SeqCst)
    }

    /// Total number of holds recorded.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// Marks a resource as held; unmarks it on drop.
#[derive(Debug)]
pub struct OccupancyGuard<'a> {
    tracker: &'a OccupancyTracker,
    id: ResourceId,
}

impl Drop for OccupancyGuard<'_> {
    fn drop(&mut self) {
        self.tracker.held.lock().remove(&self.id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_double_issue() {
        let tracker = OccupancyTracker::new();
        let first = tracker.hold(ResourceId::new(1));
        let _second = tracker.hold(ResourceId::new(2));
        assert_eq!(tracker.double_issues(), 0);
        assert_eq!(tracker.peak(), 2);

        let _again = tracker.hold(ResourceId::new(1));
        assert_eq!(tracker.double_issues(), 1);

        drop(first);
        assert_eq!(tracker.total(), 3);
    }
}
