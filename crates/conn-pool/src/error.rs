//! Pool error types.

use thiserror::Error;

use crate::resource::ResourceId;

/// Boxed error returned by fallible resource factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while configuring or using a pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The pool configuration was rejected before any pool was created.
    #[error("invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    /// A caller returned a lease the pool does not consider checked out.
    #[error("pool contract violated: {reason}")]
    ContractViolation {
        /// What the caller did wrong.
        reason: ViolationReason,
    },

    /// The resource factory failed; no resource was created.
    #[error("failed to create resource #{id}: {source}")]
    ResourceCreationFailed {
        /// Identifier that was reserved for the resource.
        id: ResourceId,
        /// Error reported by the factory.
        #[source]
        source: BoxError,
    },
}

/// Kinds of caller errors detected on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ViolationReason {
    /// The lease was issued by a different pool.
    ForeignLease,
    /// The lease's resource is not in this pool's checked-out set.
    NotCheckedOut,
}

impl std::fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForeignLease => f.write_str("lease belongs to a different pool"),
            Self::NotCheckedOut => f.write_str("resource is not checked out"),
        }
    }
}

impl PoolError {
    /// Shorthand for [`PoolError::InvalidConfiguration`].
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Returns `true` if this error was caused by the caller rather than the
    /// resource or the environment.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::ContractViolation { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = PoolError::config("capacity must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid pool configuration: capacity must be at least 1"
        );

        let err = PoolError::ContractViolation {
            reason: ViolationReason::ForeignLease,
        };
        assert_eq!(
            err.to_string(),
            "pool contract violated: lease belongs to a different pool"
        );
    }

    #[test]
    fn test_creation_failure_keeps_source() {
        let source: BoxError = "connection refused".into();
        let err = PoolError::ResourceCreationFailed {
            id: ResourceId::new(3),
            source,
        };

        assert_eq!(
            err.to_string(),
            "failed to create resource #3: connection refused"
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_caller_error());
    }
}
