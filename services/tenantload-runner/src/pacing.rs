//! Time source and launch ramp for long-running drivers.

use std::time::Duration;

use async_trait::async_trait;
use tenantload_core::config::LaunchConfig;
use tokio::time::Instant;

/// Injectable time source.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by tokio's timer, so paused-time tests drive it too.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Intervals between consecutive user launches.
///
/// Starts at the initial interval and shrinks by `step` after every
/// `step_every` launches while it is above the floor. Never ends.
#[derive(Debug, Clone)]
pub struct LaunchSchedule {
    current: Duration,
    step: Duration,
    step_every: usize,
    floor: Duration,
    emitted: usize,
}

impl LaunchSchedule {
    pub fn new(config: &LaunchConfig) -> Self {
        Self {
            current: Duration::from_millis(config.initial_interval_ms),
            step: Duration::from_millis(config.step_ms),
            step_every: config.step_every.max(1),
            floor: Duration::from_millis(config.floor_ms),
            emitted: 0,
        }
    }
}

impl Iterator for LaunchSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let interval = self.current;
        self.emitted += 1;
        if self.emitted % self.step_every == 0 && self.current > self.floor {
            self.current = self.current.saturating_sub(self.step).max(self.floor);
        }
        Some(interval)
    }
}
