//! # conn-pool
//!
//! A bounded, thread-safe pool of expensive-to-create resources such as
//! network or database connections.
//!
//! Many workers share a fixed number of resources. The pool creates them
//! lazily, never more than its capacity, and parks callers when every
//! resource is checked out until another caller gives one back.
//!
//! ## Features
//!
//! - Lazy creation bounded by a fixed capacity
//! - Blocking checkout with no lost wakeups
//! - Most-recently-released reuse (warm resources first)
//! - Pool-owned resource numbering
//! - Detection of leases released to the wrong pool
//! - Cancellable async checkout (`async` feature, on by default)
//! - Status snapshots and metrics for monitoring
//!
//! ## Example
//!
//! ```rust
//! use conn_pool::{Pool, PoolConfig, ResourceId};
//! use std::thread;
//!
//! # fn main() -> Result<(), conn_pool::PoolError> {
//! let pool = Pool::from_fn(PoolConfig::new().capacity(5), |id: ResourceId| id)?;
//!
//! thread::scope(|s| {
//!     for _ in 0..12 {
//!         s.spawn(|| {
//!             let conn = pool.acquire().unwrap();
//!             // Use the connection...
//!             pool.release(conn).unwrap();
//!         });
//!     }
//! });
//!
//! let status = pool.status();
//! assert_eq!(status.in_use, 0);
//! assert!(status.alive <= 5);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod resource;

mod state;

// Configuration
pub use config::PoolConfig;

// Error types
pub use error::{BoxError, PoolError, ViolationReason};

// Pool types
pub use pool::{Lease, Pool, PoolBuilder, PoolMetrics, PoolStatus};

// Resources
pub use lifecycle::{ResourceMetadata, ResourceState};
pub use resource::{FnFactory, ResourceFactory, ResourceId, TryFnFactory};
