//! Resource identity and creation.
//!
//! The pool treats resources as opaque values. It only needs a way to make a
//! new one on demand, which is what [`ResourceFactory`] provides. Each
//! resource is numbered by the pool with a [`ResourceId`] taken from an
//! internal counter, so numbering never depends on which caller triggered
//! the creation.

use std::fmt;

use crate::error::BoxError;

/// Pool-assigned identity of a resource.
///
/// Identifiers start at 0 and increase by one for every creation attempt.
/// A failed creation consumes its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceId(u64);

impl ResourceId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Creates resources for a pool.
///
/// `create` is called without the pool lock held, so a slow factory never
/// stalls other acquire or release calls. It may be called concurrently from
/// several threads.
pub trait ResourceFactory<R>: Send + Sync + 'static {
    /// Create the resource that will be known as `id`.
    fn create(&self, id: ResourceId) -> Result<R, BoxError>;
}

/// Factory built from an infallible closure.
pub struct FnFactory<F>(F);

impl<F> FnFactory<F> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<R, F> ResourceFactory<R> for FnFactory<F>
where
    F: Fn(ResourceId) -> R + Send + Sync + 'static,
{
    fn create(&self, id: ResourceId) -> Result<R, BoxError> {
        Ok((self.0)(id))
    }
}

/// Factory built from a fallible closure.
pub struct TryFnFactory<F>(F);

impl<F> TryFnFactory<F> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<R, E, F> ResourceFactory<R> for TryFnFactory<F>
where
    F: Fn(ResourceId) -> Result<R, E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    fn create(&self, id: ResourceId) -> Result<R, BoxError> {
        (self.0)(id).map_err(Into::into)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_factory_passes_id() {
        let factory = FnFactory::new(|id: ResourceId| format!("conn-{id}"));
        let created = factory.create(ResourceId::new(7)).unwrap();
        assert_eq!(created, "conn-7");
    }

    #[test]
    fn test_try_fn_factory_boxes_error() {
        let factory = TryFnFactory::new(|id: ResourceId| {
            if id.get() == 0 {
                Err(std::io::Error::other("refused"))
            } else {
                Ok(id.get())
            }
        });

        let err = factory.create(ResourceId::new(0)).unwrap_err();
        assert_eq!(err.to_string(), "refused");
        assert_eq!(factory.create(ResourceId::new(1)).unwrap(), 1);
    }
}
