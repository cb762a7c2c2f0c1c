//! Background expiry sweeper.
//!
//! Expired entries already read as misses, so the sweeper is housekeeping:
//! it keeps memory and disk usage down by deleting entries whose freshness
//! header has passed. It sweeps once at start-up and then on a fixed
//! interval until shutdown is signalled.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::entry::now_millis;
use crate::cache::CacheStore;

/// Default interval between sweeps (in seconds).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Result of one sweep across every backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Number of keys inspected.
    pub scanned: usize,
    /// Number of expired entries deleted.
    pub evicted: usize,
    /// Duration of the sweep in milliseconds.
    pub duration_ms: u64,
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sweep: scanned {} entries, evicted {} in {}ms",
            self.scanned, self.evicted, self.duration_ms
        )
    }
}

/// Periodically evicts stale entries from every backend in a store.
pub struct ExpirySweeper {
    store: Arc<CacheStore>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<CacheStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Sweeps every backend against the current wall clock.
    pub async fn sweep_once(&self) -> SweepReport {
        self.sweep_at(now_millis()).await
    }

    /// Sweeps every backend, evicting entries that are stale at `now_ms`.
    pub async fn sweep_at(&self, now_ms: i64) -> SweepReport {
        let start = Instant::now();
        let mut report = SweepReport::default();

        for handle in self.store.handles() {
            for key in handle.keys().await {
                report.scanned += 1;
                let Some(entry) = handle.get(&key).await else {
                    continue;
                };
                if !entry.is_fresh_at(now_ms) && handle.delete(&key).await {
                    report.evicted += 1;
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// Runs until `shutdown` is cancelled. The first sweep happens immediately.
    ///
    /// A zero interval disables the periodic sweep; the task returns at once.
    pub async fn run(self, shutdown: CancellationToken) {
        if self.interval.is_zero() {
            warn!("Sweep interval is zero, expiry sweeper disabled");
            return;
        }

        info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                _ = ticker.tick() => {
                    let report = self.sweep_once().await;
                    if report.evicted > 0 {
                        debug!(
                            scanned = report.scanned,
                            evicted = report.evicted,
                            duration_ms = report.duration_ms,
                            "Evicted expired cache entries"
                        );
                    }
                }
            }
        }

        info!("Expiry sweeper stopped");
    }
}
