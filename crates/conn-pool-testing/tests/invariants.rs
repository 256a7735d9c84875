//! Property tests for the pool invariants.
//!
//! Every observable snapshot must satisfy
//! `in_use <= alive <= capacity` and `idle + in_use == alive`, no resource
//! may be held by two callers at once, and `alive` never decreases.

#![allow(clippy::unwrap_used)]

use std::thread;
use std::time::Duration;

use conn_pool::{Lease, Pool, PoolConfig, ResourceId};
use conn_pool_testing::{OccupancyTracker, StatusSampler};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Acquire,
    Release(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Acquire),
        2 => any::<usize>().prop_map(Op::Release),
    ]
}

fn capacity_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(1usize), Just(5), Just(100)]
}

fn numbered(capacity: usize) -> Pool<ResourceId> {
    Pool::from_fn(PoolConfig::new().capacity(capacity), |id: ResourceId| id).unwrap()
}

proptest! {
    #[test]
    fn sequential_ops_match_model(
        capacity in capacity_strategy(),
        ops in prop::collection::vec(op_strategy(), 0..200),
    ) {
        let pool = numbered(capacity);
        let mut held: Vec<Lease<ResourceId>> = Vec::new();
        let mut peak = 0usize;

        for op in ops {
            match op {
                Op::Acquire => {
                    match pool.try_acquire().unwrap() {
                        Some(lease) => {
                            prop_assert!(held.iter().all(|h| h.id() != lease.id()));
                            held.push(lease);
                        }
                        None => prop_assert_eq!(held.len(), capacity),
                    }
                }
                Op::Release(index) => {
                    if !held.is_empty() {
                        let lease = held.swap_remove(index % held.len());
                        pool.release(lease).unwrap();
                    }
                }
            }

            peak = peak.max(held.len());
            let status = pool.status();
            prop_assert!(status.is_consistent());
            prop_assert_eq!(status.in_use, held.len());
            // New resources are only made when none is idle, so the pool
            // grows exactly to the peak number held at once.
            prop_assert_eq!(status.alive, peak);
        }

        drop(held);
        prop_assert_eq!(pool.in_use_count(), 0);
        prop_assert!(pool.alive_count() <= capacity);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn concurrent_ops_preserve_invariants(
        capacity in capacity_strategy(),
        plans in prop::collection::vec(
            prop::collection::vec(0u64..200, 1..20),
            2..12,
        ),
    ) {
        let pool = numbered(capacity);
        let tracker = OccupancyTracker::new();
        let sampler = StatusSampler::spawn(pool.clone(), Duration::ZERO);
        let expected: usize = plans.iter().map(Vec::len).sum();

        thread::scope(|s| {
            for plan in &plans {
                let pool = &pool;
                let tracker = &tracker;
                s.spawn(move || {
                    for &hold_micros in plan {
                        let lease = pool.acquire().unwrap();
                        let guard = tracker.hold(lease.id());
                        if hold_micros > 0 {
                            thread::sleep(Duration::from_micros(hold_micros));
                        }
                        drop(guard);
                        pool.release(lease).unwrap();
                    }
                });
            }
        });

        let report = sampler.stop();
        prop_assert!(report.inconsistent().is_empty());
        prop_assert!(report.max_alive() <= capacity);
        prop_assert!(report.alive_is_monotonic());

        prop_assert_eq!(tracker.double_issues(), 0);
        prop_assert_eq!(tracker.total(), expected);
        prop_assert!(tracker.peak() <= capacity.min(plans.len()));

        let status = pool.status();
        prop_assert_eq!(status.in_use, 0);
        prop_assert!(status.alive <= capacity.min(plans.len()));
        prop_assert_eq!(status.waiters, 0);
    }
}
