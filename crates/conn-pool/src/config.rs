//! Pool configuration.

use std::str::FromStr;

use crate::error::PoolError;

/// Configuration for a [`Pool`](crate::Pool).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Maximum number of resources the pool will ever create.
    pub capacity: usize,

    /// Name used to label log events from this pool.
    pub name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            name: "pool".to_string(),
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the pool name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Check the configuration.
    ///
    /// A pool with no capacity could never hand out a resource and every
    /// acquirer would block forever, so it is rejected here.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.capacity == 0 {
            return Err(PoolError::config("capacity must be at least 1"));
        }
        Ok(())
    }
}

impl FromStr for PoolConfig {
    type Err = PoolError;

    /// Parse a `key=value;` configuration string.
    ///
    /// ```text
    /// Max Pool Size=5;Pool Name=orders;
    /// ```
    ///
    /// Unknown keys are ignored. The result is validated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = Self::default();

        for part in s.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| PoolError::config(format!("invalid key-value: {part}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "max pool size" | "capacity" | "pool size" => {
                    let capacity: i64 = value
                        .parse()
                        .map_err(|_| PoolError::config(format!("invalid capacity: {value}")))?;
                    if capacity <= 0 {
                        return Err(PoolError::config(format!(
                            "capacity must be at least 1, got {capacity}"
                        )));
                    }
                    config.capacity = usize::try_from(capacity)
                        .map_err(|_| PoolError::config(format!("capacity too large: {value}")))?;
                }
                "pool name" | "name" => {
                    config.name = value.to_string();
                }
                _ => {
                    tracing::debug!(key = key, value = value, "ignoring unknown pool option");
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::new();
        assert_eq!(config.capacity, 10);
        assert_eq!(config.name, "pool");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = PoolConfig::new().capacity(0).validate().unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_parse_config_string() {
        let config: PoolConfig = "Max Pool Size=5; Pool Name=orders;".parse().unwrap();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.name, "orders");
    }

    #[test]
    fn test_parse_ignores_unknown_keys() {
        let config: PoolConfig = "capacity=2;Server=localhost".parse().unwrap();
        assert_eq!(config.capacity, 2);
    }

    #[test]
    fn test_parse_rejects_non_positive_capacity() {
        for text in ["capacity=0", "capacity=-3", "Max Pool Size=many"] {
            let err = text.parse::<PoolConfig>().unwrap_err();
            assert!(
                matches!(err, PoolError::InvalidConfiguration(_)),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        assert!("capacity".parse::<PoolConfig>().is_err());
    }
}
