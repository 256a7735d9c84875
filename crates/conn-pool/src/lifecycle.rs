//! Per-resource lifecycle bookkeeping.

use std::time::{Duration, Instant};

use crate::resource::ResourceId;

/// Where a created resource currently is.
///
/// Resources cycle `Idle -> InUse -> Idle -> ...` for the lifetime of the
/// pool. There is no terminal state: the pool never destroys a resource it
/// has created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ResourceState {
    /// Sitting in the pool waiting for a caller.
    Idle,
    /// Lent to exactly one caller.
    InUse,
}

/// Metadata tracked alongside every pooled resource.
#[derive(Debug, Clone)]
pub struct ResourceMetadata {
    /// Pool-assigned identity.
    pub id: ResourceId,
    /// When the factory produced the resource.
    pub created_at: Instant,
    /// When the resource was most recently handed to a caller.
    pub last_checkout_at: Instant,
    /// How many times the resource has been handed out, including the
    /// checkout that created it.
    pub checkout_count: u64,
    /// Current lifecycle state.
    pub state: ResourceState,
}

impl ResourceMetadata {
    /// Metadata for a freshly created resource, already checked out by the
    /// caller that triggered its creation.
    pub(crate) fn created(id: ResourceId) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_checkout_at: now,
            checkout_count: 1,
            state: ResourceState::InUse,
        }
    }

    pub(crate) fn mark_checked_out(&mut self) {
        self.last_checkout_at = Instant::now();
        self.checkout_count += 1;
        self.state = ResourceState::InUse;
    }

    pub(crate) fn mark_idle(&mut self) {
        self.state = ResourceState::Idle;
    }

    /// Time since the resource was created.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Whether the resource has been handed out more than once.
    #[must_use]
    pub fn is_reused(&self) -> bool {
        self.checkout_count > 1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_cycle() {
        let mut meta = ResourceMetadata::created(ResourceId::new(0));
        assert_eq!(meta.state, ResourceState::InUse);
        assert!(!meta.is_reused());

        meta.mark_idle();
        assert_eq!(meta.state, ResourceState::Idle);

        meta.mark_checked_out();
        assert_eq!(meta.state, ResourceState::InUse);
        assert_eq!(meta.checkout_count, 2);
        assert!(meta.is_reused());
        assert!(meta.last_checkout_at >= meta.created_at);
    }
}
