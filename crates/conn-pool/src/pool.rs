//! Connection pool implementation.
//!
//! All pool state lives behind a single mutex. Callers that find the pool
//! exhausted park on a condition variable tied to the predicate "an idle
//! resource exists or another one may be created", and every release wakes
//! one of them. Resources are created lazily by the caller that needs one,
//! outside the lock, after reserving a slot under it.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::PoolConfig;
use crate::error::{PoolError, ViolationReason};
use crate::lifecycle::ResourceMetadata;
use crate::resource::{FnFactory, ResourceFactory, ResourceId};
use crate::state::{Checkout, PoolState, Pooled};

/// A bounded pool of lazily created resources.
///
/// The pool creates at most [`capacity`](Pool::capacity) resources over its
/// whole lifetime and hands each one to a single caller at a time. Cloning a
/// `Pool` produces another handle to the same pool.
///
/// # Example
///
/// ```rust
/// use conn_pool::{Pool, PoolConfig, ResourceId};
///
/// # fn main() -> Result<(), conn_pool::PoolError> {
/// let pool = Pool::from_fn(PoolConfig::new().capacity(2), |id: ResourceId| {
///     format!("connection #{id}")
/// })?;
///
/// let conn = pool.acquire()?;
/// assert_eq!(*conn, "connection #0");
/// assert_eq!(pool.in_use_count(), 1);
///
/// pool.release(conn)?;
/// assert_eq!(pool.in_use_count(), 0);
/// assert_eq!(pool.alive_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Pool<R: 'static> {
    inner: Arc<Shared<R>>,
}

struct Shared<R: 'static> {
    /// Label for log events.
    name: String,

    /// Fixed at construction.
    capacity: usize,

    state: Mutex<PoolState<R>>,

    /// Signalled once per release or freed creation slot.
    available: Condvar,

    /// Async counterpart of `available`.
    #[cfg(feature = "async")]
    notify: tokio::sync::Notify,

    factory: Box<dyn ResourceFactory<R>>,

    /// When the pool was created.
    created_at: Instant,
}

impl<R: Send + 'static> Pool<R> {
    /// Create a new pool builder.
    ///
    /// Use the builder to configure the pool before creating it.
    #[must_use]
    pub fn builder() -> PoolBuilder<R> {
        PoolBuilder::new()
    }

    /// Create a pool that builds resources with `factory`.
    ///
    /// No resource is created until the first acquire.
    pub fn new(config: PoolConfig, factory: impl ResourceFactory<R>) -> Result<Self, PoolError> {
        config.validate()?;

        let inner = Arc::new(Shared {
            capacity: config.capacity,
            state: Mutex::new(PoolState::new(config.capacity)),
            available: Condvar::new(),
            #[cfg(feature = "async")]
            notify: tokio::sync::Notify::new(),
            factory: Box::new(factory),
            created_at: Instant::now(),
            name: config.name,
        });

        tracing::info!(
            pool = %inner.name,
            capacity = inner.capacity,
            "connection pool created"
        );

        Ok(Self { inner })
    }

    /// Create a pool from an infallible closure.
    pub fn from_fn<F>(config: PoolConfig, f: F) -> Result<Self, PoolError>
    where
        F: Fn(ResourceId) -> R + Send + Sync + 'static,
    {
        Self::new(config, FnFactory::new(f))
    }

    /// Get a resource, blocking until one is available.
    ///
    /// Returns the most recently released idle resource if there is one,
    /// otherwise creates a new resource if the pool is below capacity,
    /// otherwise waits for another caller to release. There is no timeout.
    ///
    /// Only fails if the factory fails.
    pub fn acquire(&self) -> Result<Lease<R>, PoolError> {
        let mut state = self.inner.state.lock();
        let mut waited = false;

        let checkout = loop {
            if let Some(checkout) = state.checkout() {
                break checkout;
            }

            if !waited {
                waited = true;
                state.waiters += 1;
                state.counters.checkouts_waited += 1;
                tracing::trace!(pool = %self.inner.name, "pool exhausted, waiting for a release");
            }

            self.inner.available.wait(&mut state);
        };

        if waited {
            state.waiters -= 1;
        }
        drop(state);

        self.inner.complete(checkout)
    }

    /// Get a resource without waiting.
    ///
    /// Returns `Ok(None)` if every resource is checked out and the pool is at
    /// capacity.
    pub fn try_acquire(&self) -> Result<Option<Lease<R>>, PoolError> {
        let checkout = self.inner.state.lock().checkout();
        match checkout {
            Some(checkout) => self.inner.complete(checkout).map(Some),
            None => Ok(None),
        }
    }

    /// Get a resource, waiting asynchronously until one is available.
    ///
    /// Behaves like [`acquire`](Pool::acquire) but yields to the runtime
    /// instead of parking the thread. Dropping the returned future cancels
    /// the wait without affecting the pool.
    ///
    /// The factory still runs synchronously on the polling task.
    #[cfg(feature = "async")]
    pub async fn acquire_async(&self) -> Result<Lease<R>, PoolError> {
        let mut waiter = AsyncWaiter {
            shared: &self.inner,
            registered: false,
        };

        loop {
            // Register interest before checking the predicate so a release
            // in between is not missed.
            let mut notified = std::pin::pin!(self.inner.notify.notified());
            notified.as_mut().enable();

            let checkout = {
                let mut state = self.inner.state.lock();
                let checkout = state.checkout();
                match (&checkout, waiter.registered) {
                    (Some(_), true) => {
                        state.waiters -= 1;
                        waiter.registered = false;
                    }
                    (None, false) => {
                        state.waiters += 1;
                        state.counters.checkouts_waited += 1;
                        waiter.registered = true;
                        tracing::trace!(pool = %self.inner.name, "pool exhausted, waiting for a release");
                    }
                    _ => {}
                }
                checkout
            };

            if let Some(checkout) = checkout {
                return self.inner.complete(checkout);
            }

            notified.await;
        }
    }

    /// Return a resource to the pool and wake one waiting acquirer.
    ///
    /// Dropping a [`Lease`] does the same thing; this form reports misuse.
    /// A lease issued by another pool is rejected with
    /// [`PoolError::ContractViolation`] and goes back to the pool that
    /// issued it.
    pub fn release(&self, mut lease: Lease<R>) -> Result<(), PoolError> {
        if !Arc::ptr_eq(&self.inner, &lease.pool) {
            self.inner.state.lock().counters.contract_violations += 1;
            tracing::warn!(
                pool = %self.inner.name,
                owner = %lease.pool.name,
                "lease released to a pool that did not issue it"
            );
            return Err(PoolError::ContractViolation {
                reason: ViolationReason::ForeignLease,
            });
        }

        match lease.pooled.take() {
            Some(pooled) => self.inner.check_in(pooled),
            None => Err(PoolError::ContractViolation {
                reason: ViolationReason::NotCheckedOut,
            }),
        }
    }
}

impl<R: 'static> Pool<R> {
    /// Maximum number of resources this pool will create.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of resources created so far.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.inner.state.lock().created()
    }

    /// Number of resources currently checked out.
    #[must_use]
    pub fn in_use_count(&self) -> usize {
        self.inner.state.lock().in_use()
    }

    /// Number of resources waiting in the pool.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle_len()
    }

    /// The pool name from its configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get a consistent snapshot of the pool counts.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            capacity: state.capacity(),
            alive: state.created(),
            in_use: state.in_use(),
            idle: state.idle_len(),
            waiters: state.waiters,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let counters = self.inner.state.lock().counters;
        PoolMetrics {
            resources_created: counters.resources_created,
            creation_failures: counters.creation_failures,
            checkouts: counters.checkouts,
            checkouts_waited: counters.checkouts_waited,
            releases: counters.releases,
            contract_violations: counters.contract_violations,
            uptime: self.inner.created_at.elapsed(),
        }
    }
}

impl<R: 'static> Clone for Pool<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: 'static> fmt::Debug for Pool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .finish()
    }
}

impl<R: 'static> Shared<R> {
    /// Wake one blocked thread and one waiting task.
    fn wake_one(&self) {
        self.available.notify_one();
        #[cfg(feature = "async")]
        self.notify.notify_one();
    }

    /// Turn a checkout into a lease, running the factory if a slot was
    /// reserved.
    fn complete(self: &Arc<Self>, checkout: Checkout<R>) -> Result<Lease<R>, PoolError> {
        let pooled = match checkout {
            Checkout::Reused(pooled) => {
                tracing::trace!(pool = %self.name, id = %pooled.meta.id, "reusing idle resource");
                pooled
            }
            Checkout::Create(id) => self.create(id)?,
        };

        Ok(Lease {
            pooled: Some(pooled),
            pool: Arc::clone(self),
        })
    }

    fn create(&self, id: ResourceId) -> Result<Pooled<R>, PoolError> {
        let reservation = Reservation {
            shared: self,
            armed: true,
        };

        match self.factory.create(id) {
            Ok(resource) => {
                reservation.commit(id);
                tracing::debug!(pool = %self.name, id = %id, "created resource");
                Ok(Pooled {
                    resource,
                    meta: ResourceMetadata::created(id),
                })
            }
            Err(source) => {
                drop(reservation);
                tracing::warn!(pool = %self.name, id = %id, error = %source, "resource creation failed");
                Err(PoolError::ResourceCreationFailed { id, source })
            }
        }
    }

    fn check_in(&self, pooled: Pooled<R>) -> Result<(), PoolError> {
        let id = pooled.meta.id;
        let mut state = self.state.lock();
        match state.check_in(pooled) {
            Ok(()) => {
                self.wake_one();
                drop(state);
                tracing::trace!(pool = %self.name, id = %id, "resource returned to pool");
                Ok(())
            }
            Err(_stray) => {
                drop(state);
                tracing::warn!(pool = %self.name, id = %id, "released resource was not checked out");
                Err(PoolError::ContractViolation {
                    reason: ViolationReason::NotCheckedOut,
                })
            }
        }
    }
}

/// A creation slot held while the factory runs.
///
/// Gives the slot back and wakes a waiter unless committed, including when
/// the factory panics.
struct Reservation<'a, R: 'static> {
    shared: &'a Shared<R>,
    armed: bool,
}

impl<R: 'static> Reservation<'_, R> {
    fn commit(mut self, id: ResourceId) {
        self.armed = false;
        self.shared.state.lock().commit_created(id);
    }
}

impl<R: 'static> Drop for Reservation<'_, R> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.shared.state.lock();
            state.abort_created();
            self.shared.wake_one();
        }
    }
}

/// Waiter registration for [`Pool::acquire_async`]; unregisters on
/// cancellation.
#[cfg(feature = "async")]
struct AsyncWaiter<'a, R: 'static> {
    shared: &'a Shared<R>,
    registered: bool,
}

#[cfg(feature = "async")]
impl<R: 'static> Drop for AsyncWaiter<'_, R> {
    fn drop(&mut self) {
        if self.registered {
            self.shared.state.lock().waiters -= 1;
        }
    }
}

/// Builder for creating a pool.
///
/// The resource type is fixed by the factory handed to
/// [`build`](PoolBuilder::build) or [`build_fn`](PoolBuilder::build_fn).
///
/// # Example
///
/// ```rust
/// use conn_pool::{Pool, ResourceId};
///
/// let pool = Pool::builder()
///     .capacity(5)
///     .name("orders")
///     .build_fn(|id: ResourceId| id.get())
///     .unwrap();
/// assert_eq!(pool.capacity(), 5);
/// ```
pub struct PoolBuilder<R> {
    config: PoolConfig,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Send + 'static> PoolBuilder<R> {
    /// Create a new pool builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            _resource: PhantomData,
        }
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of resources.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the pool name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Build the pool with a factory.
    pub fn build(self, factory: impl ResourceFactory<R>) -> Result<Pool<R>, PoolError> {
        Pool::new(self.config, factory)
    }

    /// Build the pool with an infallible closure.
    pub fn build_fn<F>(self, f: F) -> Result<Pool<R>, PoolError>
    where
        F: Fn(ResourceId) -> R + Send + Sync + 'static,
    {
        Pool::from_fn(self.config, f)
    }
}

impl<R: Send + 'static> Default for PoolBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for PoolBuilder<R> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R> fmt::Debug for PoolBuilder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("config", &self.config)
            .finish()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolStatus {
    /// Maximum number of resources.
    pub capacity: usize,
    /// Resources created so far.
    pub alive: usize,
    /// Resources currently checked out.
    pub in_use: usize,
    /// Resources waiting in the pool.
    pub idle: usize,
    /// Callers blocked in acquire.
    pub waiters: usize,
}

impl PoolStatus {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.in_use as f64 / self.capacity as f64) * 100.0
    }

    /// Check if the pool has created every resource it may.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.alive >= self.capacity
    }

    /// Check the pool invariants against this snapshot.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.in_use <= self.alive
            && self.alive <= self.capacity
            && self.idle + self.in_use == self.alive
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Resources created since pool start.
    pub resources_created: u64,
    /// Factory calls that failed.
    pub creation_failures: u64,
    /// Successful checkouts.
    pub checkouts: u64,
    /// Checkouts that found the pool exhausted and had to wait.
    pub checkouts_waited: u64,
    /// Resources returned to the pool.
    pub releases: u64,
    /// Releases rejected as misuse.
    pub contract_violations: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Fraction of checkouts that had to wait (0.0 to 1.0).
    #[must_use]
    pub fn wait_ratio(&self) -> f64 {
        if self.checkouts == 0 {
            return 0.0;
        }
        self.checkouts_waited as f64 / self.checkouts as f64
    }

    /// Fraction of factory calls that succeeded (0.0 to 1.0).
    #[must_use]
    pub fn creation_success_rate(&self) -> f64 {
        let attempts = self.resources_created + self.creation_failures;
        if attempts == 0 {
            return 1.0;
        }
        self.resources_created as f64 / attempts as f64
    }
}

/// A resource checked out of the pool.
///
/// Dereferences to the resource. When dropped, the resource is returned to
/// the pool that issued it.
pub struct Lease<R: 'static> {
    /// `None` only after the resource has been handed back.
    pooled: Option<Pooled<R>>,
    pool: Arc<Shared<R>>,
}

impl<R: 'static> Lease<R> {
    #[allow(clippy::expect_used)]
    fn pooled(&self) -> &Pooled<R> {
        self.pooled.as_ref().expect("lease is populated until dropped")
    }

    /// Pool-assigned identity of the resource.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.pooled().meta.id
    }

    /// Get the resource metadata.
    #[must_use]
    pub fn metadata(&self) -> &ResourceMetadata {
        &self.pooled().meta
    }

    /// Time since this checkout began.
    #[must_use]
    pub fn held_duration(&self) -> Duration {
        self.pooled().meta.last_checkout_at.elapsed()
    }
}

impl<R: 'static> Deref for Lease<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.pooled().resource
    }
}

impl<R: 'static> DerefMut for Lease<R> {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut R {
        &mut self
            .pooled
            .as_mut()
            .expect("lease is populated until dropped")
            .resource
    }
}

impl<R: fmt::Debug + 'static> fmt::Debug for Lease<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("pool", &self.pool.name)
            .field("resource", &self.pooled.as_ref().map(|p| &p.resource))
            .finish()
    }
}

impl<R: 'static> Drop for Lease<R> {
    fn drop(&mut self) {
        if let Some(pooled) = self.pooled.take() {
            // Misuse is already logged by check_in.
            let _ = self.pool.check_in(pooled);
        }
    }
}
