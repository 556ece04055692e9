//! Respawn rate tracking.

use std::time::{Duration, Instant};

/// Counts respawns and turns them into a per-second rate.
///
/// The rate is recomputed at most once per `update_interval` (one second by
/// default) from the spawns recorded since the previous update.
#[derive(Debug, Clone)]
pub struct SpawnRate {
    /// Spawns since the last rate update.
    window_count: u64,
    /// Spawns since the last reset.
    total: u64,
    /// Spawns per second, as of the last update.
    rate: f32,
    /// Time of the last rate update.
    last_update: Instant,
    update_interval: Duration,
}

impl SpawnRate {
    pub fn new(now: Instant) -> Self {
        Self {
            window_count: 0,
            total: 0,
            rate: 0.0,
            last_update: now,
            update_interval: Duration::from_secs(1),
        }
    }

    /// Set how often the rate is recomputed.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    #[inline]
    pub fn record(&mut self, spawns: usize) {
        self.window_count += spawns as u64;
        self.total += spawns as u64;
    }

    /// Recompute the rate if the interval has elapsed.
    ///
    /// Returns the new rate when it changed, `None` otherwise.
    pub fn update(&mut self, now: Instant) -> Option<f32> {
        let elapsed = now.saturating_duration_since(self.last_update);
        if elapsed < self.update_interval {
            return None;
        }
        self.rate = self.window_count as f32 / elapsed.as_secs_f32();
        self.window_count = 0;
        self.last_update = now;
        Some(self.rate)
    }

    /// Spawns per second.
    #[inline]
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Spawns since the last reset.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Zero all counters and restart the window at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.window_count = 0;
        self.total = 0;
        self.rate = 0.0;
        self.last_update = now;
    }
}
