//! Point-in-time view of request counters.

use std::fmt;

/// Copy of [`RequestMetrics`](super::RequestMetrics) at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub requests: u64,
    pub network_calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_writes: u64,
    pub coalesced_waits: u64,
    pub retries: u64,
    pub cancellations: u64,
    pub failures: u64,
    pub bytes_received: u64,
}

impl TelemetrySnapshot {
    /// Fraction of cache lookups that hit, in `0.0..=1.0`.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }

    /// Requests that never reached the network, as a fraction of all requests.
    pub fn network_savings(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            1.0 - (self.network_calls.min(self.requests) as f64 / self.requests as f64)
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Requests:        {}", self.requests)?;
        writeln!(f, "Network calls:   {}", self.network_calls)?;
        writeln!(
            f,
            "Cache:           {} hits, {} misses ({:.1}% hit rate), {} writes",
            self.cache_hits,
            self.cache_misses,
            self.hit_rate() * 100.0,
            self.cache_writes
        )?;
        writeln!(f, "Coalesced waits: {}", self.coalesced_waits)?;
        writeln!(f, "Retries:         {}", self.retries)?;
        writeln!(f, "Cancelled:       {}", self.cancellations)?;
        writeln!(f, "Failed:          {}", self.failures)?;
        write!(f, "Received:        {} bytes", self.bytes_received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let snapshot = TelemetrySnapshot {
            cache_hits: 3,
            cache_misses: 1,
            ..Default::default()
        };
        assert!((snapshot.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(TelemetrySnapshot::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_network_savings() {
        let snapshot = TelemetrySnapshot {
            requests: 4,
            network_calls: 1,
            ..Default::default()
        };
        assert!((snapshot.network_savings() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display() {
        let snapshot = TelemetrySnapshot {
            requests: 10,
            network_calls: 2,
            cache_hits: 8,
            cache_misses: 2,
            ..Default::default()
        };
        let display = snapshot.to_string();
        assert!(display.contains("Requests:        10"));
        assert!(display.contains("80.0% hit rate"));
    }
}
