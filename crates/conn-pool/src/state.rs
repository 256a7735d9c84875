//! Lock-protected pool state.
//!
//! Everything in here is only ever touched with the pool mutex held. The
//! state machine is kept free of any blocking so it can be tested directly.

use hashbrown::HashSet;

use crate::lifecycle::ResourceMetadata;
use crate::resource::ResourceId;

/// A resource together with its bookkeeping.
pub(crate) struct Pooled<R> {
    pub(crate) resource: R,
    pub(crate) meta: ResourceMetadata,
}

/// Outcome of a successful checkout attempt.
pub(crate) enum Checkout<R> {
    /// An idle resource was taken off the stack.
    Reused(Pooled<R>),
    /// A creation slot was reserved for the given id. The caller must follow
    /// up with [`PoolState::commit_created`] or [`PoolState::abort_created`].
    Create(ResourceId),
}

/// Running totals since the pool was created.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub(crate) resources_created: u64,
    pub(crate) creation_failures: u64,
    pub(crate) checkouts: u64,
    pub(crate) checkouts_waited: u64,
    pub(crate) releases: u64,
    pub(crate) contract_violations: u64,
}

pub(crate) struct PoolState<R> {
    capacity: usize,
    /// Most recently released resource last.
    idle: Vec<Pooled<R>>,
    checked_out: HashSet<ResourceId>,
    created: usize,
    /// Slots reserved by callers currently running the factory.
    pending: usize,
    next_id: u64,
    pub(crate) waiters: usize,
    pub(crate) counters: Counters,
}

impl<R> PoolState<R> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            idle: Vec::with_capacity(capacity),
            checked_out: HashSet::with_capacity(capacity),
            created: 0,
            pending: 0,
            next_id: 0,
            waiters: 0,
            counters: Counters::default(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn created(&self) -> usize {
        self.created
    }

    pub(crate) fn idle_len(&self) -> usize {
        self.idle.len()
    }

    pub(crate) fn in_use(&self) -> usize {
        self.checked_out.len()
    }

    /// The wait predicate: an idle resource exists or a new one may be made.
    pub(crate) fn can_checkout(&self) -> bool {
        !self.idle.is_empty() || self.created + self.pending < self.capacity
    }

    /// Take an idle resource, or reserve a slot to create one.
    pub(crate) fn checkout(&mut self) -> Option<Checkout<R>> {
        if let Some(mut pooled) = self.idle.pop() {
            pooled.meta.mark_checked_out();
            self.checked_out.insert(pooled.meta.id);
            self.counters.checkouts += 1;
            return Some(Checkout::Reused(pooled));
        }

        if self.created + self.pending < self.capacity {
            let id = ResourceId::new(self.next_id);
            self.next_id += 1;
            self.pending += 1;
            return Some(Checkout::Create(id));
        }

        None
    }

    /// Record a successful creation for a reserved slot.
    pub(crate) fn commit_created(&mut self, id: ResourceId) {
        debug_assert!(self.pending > 0, "commit without a reserved slot");
        self.pending -= 1;
        self.created += 1;
        self.checked_out.insert(id);
        self.counters.resources_created += 1;
        self.counters.checkouts += 1;
        debug_assert!(self.invariants_hold());
    }

    /// Give back a reserved slot after the factory failed.
    pub(crate) fn abort_created(&mut self) {
        debug_assert!(self.pending > 0, "abort without a reserved slot");
        self.pending -= 1;
        self.counters.creation_failures += 1;
    }

    /// Return a checked-out resource to the idle stack.
    ///
    /// Hands the resource back if its id is not currently checked out, in
    /// which case the state is left untouched.
    pub(crate) fn check_in(&mut self, mut pooled: Pooled<R>) -> Result<(), Pooled<R>> {
        if !self.checked_out.remove(&pooled.meta.id) {
            self.counters.contract_violations += 1;
            return Err(pooled);
        }

        pooled.meta.mark_idle();
        self.idle.push(pooled);
        self.counters.releases += 1;
        debug_assert!(self.invariants_hold());
        Ok(())
    }

    /// I1-I3 plus the reservation bound.
    pub(crate) fn invariants_hold(&self) -> bool {
        let in_use = self.checked_out.len();
        self.created <= self.capacity
            && self.created + self.pending <= self.capacity
            && in_use <= self.created
            && self.idle.len() + in_use == self.created
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn create(state: &mut PoolState<u64>) -> Pooled<u64> {
        match state.checkout() {
            Some(Checkout::Create(id)) => {
                state.commit_created(id);
                Pooled {
                    resource: id.get(),
                    meta: ResourceMetadata::created(id),
                }
            }
            _ => panic!("expected a creation slot"),
        }
    }

    #[test]
    fn test_lazy_creation_up_to_capacity() {
        let mut state = PoolState::<u64>::new(2);
        assert!(state.can_checkout());

        let a = create(&mut state);
        let b = create(&mut state);
        assert_eq!((a.resource, b.resource), (0, 1));
        assert_eq!(state.created(), 2);
        assert_eq!(state.in_use(), 2);

        assert!(!state.can_checkout());
        assert!(state.checkout().is_none());
        assert!(state.invariants_hold());
    }

    #[test]
    fn test_reuse_is_lifo() {
        let mut state = PoolState::<u64>::new(3);
        let a = create(&mut state);
        let b = create(&mut state);

        state.check_in(a).ok().unwrap();
        state.check_in(b).ok().unwrap();
        assert_eq!(state.idle_len(), 2);

        match state.checkout() {
            Some(Checkout::Reused(pooled)) => {
                assert_eq!(pooled.resource, 1);
                assert_eq!(pooled.meta.checkout_count, 2);
            }
            _ => panic!("expected the most recently released resource"),
        }
        assert_eq!(state.created(), 2);
        assert!(state.invariants_hold());
    }

    #[test]
    fn test_pending_slot_counts_against_capacity() {
        let mut state = PoolState::<u64>::new(1);
        let Some(Checkout::Create(id)) = state.checkout() else {
            panic!("expected a creation slot");
        };
        assert_eq!(id, ResourceId::new(0));
        assert!(!state.can_checkout());
        assert_eq!(state.created(), 0);

        state.abort_created();
        assert!(state.can_checkout());
        assert_eq!(state.created(), 0);
        assert_eq!(state.counters.creation_failures, 1);

        // The failed attempt consumed id 0.
        let Some(Checkout::Create(id)) = state.checkout() else {
            panic!("expected a creation slot");
        };
        assert_eq!(id, ResourceId::new(1));
    }

    #[test]
    fn test_check_in_unknown_id_is_rejected() {
        let mut state = PoolState::<u64>::new(2);
        let stray = Pooled {
            resource: 9,
            meta: ResourceMetadata::created(ResourceId::new(9)),
        };

        let rejected = state.check_in(stray).err().unwrap();
        assert_eq!(rejected.resource, 9);
        assert_eq!(state.idle_len(), 0);
        assert_eq!(state.counters.contract_violations, 1);
        assert!(state.invariants_hold());
    }
}
