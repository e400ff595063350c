//! Cache configuration.

use std::time::Duration;

/// Configuration for a cache instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    /// Zero means the owner should not build a cache at all.
    pub max_capacity: u64,

    /// Time-to-live for cache entries.
    pub ttl: Option<Duration>,

    /// Time-to-idle for cache entries.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)), // 5 minutes
            tti: None,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with the given max capacity.
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..Default::default()
        }
    }

    /// Set time-to-live for cache entries.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    /// Set time-to-idle for cache entries.
    #[must_use]
    pub fn tti(mut self, duration: Duration) -> Self {
        self.tti = Some(duration);
        self
    }

    /// Disable TTL (entries never expire based on time).
    #[must_use]
    pub fn no_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }

    /// Whether this config describes a usable cache.
    pub fn is_enabled(&self) -> bool {
        self.max_capacity > 0
    }

    /// Low capacity, long TTL. Rules are read on command, rarely written.
    pub fn lazy_load() -> Self {
        Self {
            max_capacity: 2_000,
            ttl: Some(Duration::from_secs(600)), // 10 minutes
            tti: None,
        }
    }

    /// Chat member lookups for admin checks.
    pub fn admin_lookups() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)), // 5 minutes
            tti: Some(Duration::from_secs(120)), // 2 minutes idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let config = CacheConfig::with_capacity(50)
            .ttl(Duration::from_secs(1))
            .tti(Duration::from_secs(2));

        assert_eq!(config.max_capacity, 50);
        assert_eq!(config.ttl, Some(Duration::from_secs(1)));
        assert_eq!(config.tti, Some(Duration::from_secs(2)));
        assert_eq!(config.no_ttl().ttl, None);
    }

    #[test]
    fn test_zero_capacity_is_disabled() {
        assert!(!CacheConfig::with_capacity(0).is_enabled());
        assert!(CacheConfig::lazy_load().is_enabled());
    }
}
