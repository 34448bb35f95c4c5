//! Pause between consecutive requests of one drain.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

/// Inserts the cooling interval between requests, never before the first or after the last.
#[derive(Debug, Clone, Copy)]
pub struct CoolingScheduler {
    interval: Duration,
}

impl CoolingScheduler {
    /// Scheduler pausing for `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Configured pause.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a pause follows the request at `index` out of `total`.
    #[must_use]
    pub const fn pauses_after(&self, index: usize, total: usize) -> bool {
        !self.interval.is_zero() && index + 1 < total
    }

    /// Sleep after handling request `index` of `total` if another request follows.
    pub async fn pause_after(&self, index: usize, total: usize) {
        if self.pauses_after(index, total) {
            debug!(interval_ms = self.interval.as_millis(), "cooling before next request");
            sleep(self.interval).await;
        }
    }
}
