//! Fixed-rate driver for the cooperative pump loop.
//!
//! Inbound frames, reconnect deadlines and the redirect deadline are only
//! looked at when the coordinator is pumped. [`TickDriver`] decides when
//! that happens:
//!
//! ```ignore
//! let mut driver = TickDriver::new(30);
//! loop {
//!     driver.wait_for_tick().await;
//!     for event in coordinator.pump().await { /* ... */ }
//! }
//! ```
//!
//! A late wake-up does not cause a burst of catch-up ticks: the next tick
//! is scheduled one period after the late one.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Information about a tick, returned by [`TickDriver::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// How many ticks were skipped because this one fired late.
    pub ticks_skipped: u64,
}

/// Fires at a fixed rate, skipping ticks on overrun.
#[derive(Debug)]
pub struct TickDriver {
    period: Duration,
    next_tick: Instant,
    tick_count: u64,
}

impl TickDriver {
    /// Highest supported rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// Creates a driver firing `tick_rate_hz` times per second.
    ///
    /// The rate is clamped to `1..=MAX_TICK_RATE_HZ`.
    pub fn new(tick_rate_hz: u32) -> Self {
        let rate = tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
        if rate != tick_rate_hz {
            warn!(requested = tick_rate_hz, rate, "tick rate out of range, clamping");
        }
        let period = Duration::from_secs_f64(1.0 / f64::from(rate));
        debug!(rate_hz = rate, period_ms = period.as_secs_f64() * 1000.0, "tick driver created");

        Self {
            period,
            next_tick: Instant::now() + period,
            tick_count: 0,
        }
    }

    /// Duration of one tick.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Waits until the next tick is due.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let due = self.next_tick;
        time::sleep_until(due).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(due);
        let ticks_skipped = (late_by.as_nanos() / self.period.as_nanos()) as u64;
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, skipping ahead"
            );
        }
        self.next_tick = now + self.period;

        trace!(tick = self.tick_count, "tick fired");
        TickInfo {
            tick: self.tick_count,
            ticks_skipped,
        }
    }
}
