//! Loop timer: the control loop's only blocking point.
//!
//! A [`TickSource`] blocks until the next tick boundary and hands back a
//! [`Tick`] describing it.  Two sources exist:
//!
//! - [`FixedRateTimer`] sleeps against absolute deadlines.  When a wake
//!   lands further past its deadline than `overrun_factor × period` the tick
//!   carries `overrun = Some(lateness)` and the schedule is re-anchored at
//!   the actual wake time, so missed ticks are never fired back-to-back.
//! - [`ManualTimer`] advances a virtual clock by exactly one period per
//!   call, with optional injected delay.  Tests drive the loop with it.
//!
//! [`LoopStats`] keeps a bounded window of tick deltas for telemetry.

use core::fmt;
use std::time::{Duration, Instant};

use heapless::HistoryBuffer;

use crate::config::RideConfig;

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// One release of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 1-based tick counter.
    pub index: u64,
    /// Monotonic time since the timer started.
    pub now: Duration,
    /// Time since the previous tick.
    pub dt: Duration,
    /// Lateness past the deadline, when severe enough to report.
    pub overrun: Option<Duration>,
}

/// Source of control-loop ticks.
pub trait TickSource {
    /// Block until the next tick boundary.
    fn wait_for_tick(&mut self) -> Tick;

    /// Nominal tick period.
    fn period(&self) -> Duration;
}

impl<T: TickSource + ?Sized> TickSource for Box<T> {
    fn wait_for_tick(&mut self) -> Tick {
        (**self).wait_for_tick()
    }

    fn period(&self) -> Duration {
        (**self).period()
    }
}

fn overrun_threshold(config: &RideConfig) -> Duration {
    // Float-to-int `as` saturates, so an oversized factor cannot panic.
    let nanos = f64::from(config.tick_period_ms) * 1e6 * f64::from(config.overrun_factor);
    Duration::from_nanos(nanos as u64)
}

// ---------------------------------------------------------------------------
// Wall-clock timer
// ---------------------------------------------------------------------------

/// Absolute-deadline sleeping timer.
#[derive(Debug)]
pub struct FixedRateTimer {
    period: Duration,
    threshold: Duration,
    epoch: Instant,
    deadline: Instant,
    last_wake: Instant,
    index: u64,
}

impl FixedRateTimer {
    pub fn new(config: &RideConfig) -> Self {
        let epoch = Instant::now();
        let period = config.tick_period();
        Self {
            period,
            threshold: overrun_threshold(config),
            epoch,
            deadline: epoch + period,
            last_wake: epoch,
            index: 0,
        }
    }
}

impl TickSource for FixedRateTimer {
    fn wait_for_tick(&mut self) -> Tick {
        let now = Instant::now();
        if now < self.deadline {
            std::thread::sleep(self.deadline - now);
        }
        let woke = Instant::now();

        let lateness = woke.saturating_duration_since(self.deadline);
        let overrun = (lateness > self.threshold).then_some(lateness);
        self.deadline = if overrun.is_some() {
            woke + self.period
        } else {
            self.deadline + self.period
        };

        let dt = woke - self.last_wake;
        self.last_wake = woke;
        self.index += 1;

        Tick {
            index: self.index,
            now: woke - self.epoch,
            dt,
            overrun,
        }
    }

    fn period(&self) -> Duration {
        self.period
    }
}

// ---------------------------------------------------------------------------
// Virtual-clock timer
// ---------------------------------------------------------------------------

/// Timer that never sleeps.  Each call advances virtual time by one
/// period plus any delay injected since the previous call.
#[derive(Debug, Clone)]
pub struct ManualTimer {
    period: Duration,
    threshold: Duration,
    now: Duration,
    index: u64,
    injected: Duration,
}

impl ManualTimer {
    pub fn new(config: &RideConfig) -> Self {
        Self {
            period: config.tick_period(),
            threshold: overrun_threshold(config),
            now: Duration::ZERO,
            index: 0,
            injected: Duration::ZERO,
        }
    }

    /// Make the next tick arrive `delay` late.
    pub fn inject_delay(&mut self, delay: Duration) {
        self.injected += delay;
    }

    /// Virtual time of the most recent tick.
    pub fn now(&self) -> Duration {
        self.now
    }
}

impl TickSource for ManualTimer {
    fn wait_for_tick(&mut self) -> Tick {
        let late = core::mem::take(&mut self.injected);
        let dt = self.period + late;
        self.now += dt;
        self.index += 1;
        Tick {
            index: self.index,
            now: self.now,
            dt,
            overrun: (late > self.threshold).then_some(late),
        }
    }

    fn period(&self) -> Duration {
        self.period
    }
}

// ---------------------------------------------------------------------------
// Loop statistics
// ---------------------------------------------------------------------------

/// Number of tick deltas kept for the rolling statistics.
pub const STATS_WINDOW: usize = 128;

/// Rolling tick-delta statistics.
#[derive(Debug, Default)]
pub struct LoopStats {
    window: HistoryBuffer<Duration, STATS_WINDOW>,
    max: Duration,
    overruns: u64,
}

/// Point-in-time view of [`LoopStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopSummary {
    pub last: Duration,
    pub avg: Duration,
    pub p95: Duration,
    pub max: Duration,
    pub overruns: u64,
}

impl LoopStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tick: &Tick) {
        self.window.write(tick.dt);
        self.max = self.max.max(tick.dt);
        if tick.overrun.is_some() {
            self.overruns += 1;
        }
    }

    pub fn summary(&self) -> LoopSummary {
        let samples = self.window.as_slice();
        if samples.is_empty() {
            return LoopSummary::default();
        }

        let total: Duration = samples.iter().sum();
        let avg = total / samples.len() as u32;

        let mut sorted: heapless::Vec<Duration, STATS_WINDOW> = samples.iter().copied().collect();
        sorted.sort_unstable();
        let rank = (sorted.len() * 95).div_ceil(100).saturating_sub(1);

        LoopSummary {
            last: self.window.recent().copied().unwrap_or_default(),
            avg,
            p95: sorted[rank],
            max: self.max,
            overruns: self.overruns,
        }
    }
}

impl fmt::Display for LoopSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dt={:.1}ms avg={:.1}ms p95={:.1}ms max={:.1}ms overruns={}",
            self.last.as_secs_f64() * 1e3,
            self.avg.as_secs_f64() * 1e3,
            self.p95.as_secs_f64() * 1e3,
            self.max.as_secs_f64() * 1e3,
            self.overruns
        )
    }
}
