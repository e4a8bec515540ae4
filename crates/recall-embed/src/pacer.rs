//! Token-paced gate for external API quotas
//!
//! Guarantees that no more than N operations per period are issued to the
//! embedding backend by spacing consecutive consumptions at least
//! `period / N` apart. The wait is a cooperative tokio sleep, never a spin.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// A simple interval pacer
///
/// Each call to [`tick`](Pacer::tick) suspends the caller just long enough
/// that the interval since the previous consumption is at least
/// `period / max_per_period`. If the caller is naturally slower than the
/// limit, `tick` never blocks.
pub struct Pacer {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Create a pacer allowing `max_per_period` consumptions per `period`
    ///
    /// # Panics
    /// Panics if `max_per_period` is zero.
    pub fn new(max_per_period: u32, period: Duration) -> Self {
        assert!(max_per_period > 0, "max_per_period must be positive");
        Self {
            interval: period / max_per_period,
            last: Mutex::new(None),
        }
    }

    /// Convenience constructor for per-minute quotas
    pub fn per_minute(max_per_minute: u32) -> Self {
        Self::new(max_per_minute, Duration::from_secs(60))
    }

    /// Minimum spacing between consecutive consumptions
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Consume one tick, sleeping if the previous one was too recent
    pub async fn tick(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let due = previous + self.interval;
            if due > Instant::now() {
                sleep_until(due).await;
            }
        }
        *last = Some(Instant::now());
    }
}
