//! Per-call cache configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A cache backend a caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTarget {
    /// Process-local moka cache. Always available.
    Memory,
    /// On-disk cache. Available only if the startup probe succeeded.
    Disk,
}

impl CacheTarget {
    /// Every target, in default preference order.
    pub const ALL: [CacheTarget; 2] = [CacheTarget::Memory, CacheTarget::Disk];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTarget::Memory => "memory",
            CacheTarget::Disk => "disk",
        }
    }
}

impl fmt::Display for CacheTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(CacheTarget::Memory),
            "disk" | "persistent" => Ok(CacheTarget::Disk),
            other => Err(format!("unknown cache target '{}'", other)),
        }
    }
}

/// How a single call uses the cache.
///
/// Supplied per call and never persisted. `expires_in == 0` disables both
/// caching and coalescing for the call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheConfig {
    /// Time-to-live in seconds for entries written by this call.
    pub expires_in: u64,
    /// Ordered backend preference; the first available one is used.
    pub targets: Vec<CacheTarget>,
}

impl CacheConfig {
    /// Cache in the default backend for `secs` seconds.
    pub fn expires_in(secs: u64) -> Self {
        Self {
            expires_in: secs,
            targets: Vec::new(),
        }
    }

    /// Set the ordered backend preference.
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = CacheTarget>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    /// Returns `true` when this call caches and coalesces.
    pub fn is_enabled(&self) -> bool {
        self.expires_in > 0
    }

    /// The time-to-live as a `Duration`.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse() {
        assert_eq!("memory".parse::<CacheTarget>(), Ok(CacheTarget::Memory));
        assert_eq!(" Disk ".parse::<CacheTarget>(), Ok(CacheTarget::Disk));
        assert_eq!("persistent".parse::<CacheTarget>(), Ok(CacheTarget::Disk));
        assert!("redis".parse::<CacheTarget>().is_err());
    }

    #[test]
    fn test_config_enabled() {
        assert!(!CacheConfig::default().is_enabled());
        assert!(!CacheConfig::expires_in(0).is_enabled());
        assert!(CacheConfig::expires_in(1800).is_enabled());
        assert_eq!(CacheConfig::expires_in(90).ttl(), Duration::from_secs(90));
    }

    #[test]
    fn test_with_targets_keeps_order() {
        let config = CacheConfig::expires_in(60).with_targets([CacheTarget::Disk, CacheTarget::Memory]);
        assert_eq!(config.targets, vec![CacheTarget::Disk, CacheTarget::Memory]);
    }
}
