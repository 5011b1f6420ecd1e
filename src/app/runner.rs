//! Control loop: owns the timer and the adapters and drives
//! [`RideService`] one tick at a time.
//!
//! Cancellation is cooperative.  The stop flag is checked before each
//! wait, so an in-flight tick always completes.  On exit the ride is
//! halted through [`RideService::shutdown`].

use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::timer::{LoopStats, TickSource};

use super::ports::{ControlPanel, MotorController, StatusSink, ThemingController};
use super::service::RideService;
use super::status::StatusSnapshot;

/// Why [`ControlLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stop flag was raised.
    Requested,
    /// The tick limit was reached.
    TickLimit,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub ticks: u64,
    pub reason: StopReason,
    pub last: Option<StatusSnapshot>,
}

/// The timer, the adapters and the service, wired together.
pub struct ControlLoop<T, M, P, Th, S> {
    service: RideService,
    timer: T,
    motor: M,
    panel: P,
    theming: Th,
    sink: S,
    stats: LoopStats,
    max_ticks: Option<u64>,
}

impl<T, M, P, Th, S> ControlLoop<T, M, P, Th, S>
where
    T: TickSource,
    M: MotorController,
    P: ControlPanel,
    Th: ThemingController,
    S: StatusSink,
{
    pub fn new(service: RideService, timer: T, motor: M, panel: P, theming: Th, sink: S) -> Self {
        Self {
            service,
            timer,
            motor,
            panel,
            theming,
            sink,
            stats: LoopStats::new(),
            max_ticks: None,
        }
    }

    /// Stop on its own after `limit` ticks.
    pub fn with_max_ticks(mut self, limit: Option<u64>) -> Self {
        self.max_ticks = limit;
        self
    }

    /// Tick until `stop` is raised or the tick limit is reached.
    pub fn run(&mut self, stop: &AtomicBool) -> RunReport {
        let interval = u64::from(self.service.config().telemetry_interval_ticks);
        let mut ticks = 0u64;

        info!(
            "Control loop running at {} ms per tick",
            self.timer.period().as_millis()
        );

        let reason = loop {
            if stop.load(Ordering::Relaxed) {
                break StopReason::Requested;
            }
            if self.max_ticks.is_some_and(|limit| ticks >= limit) {
                break StopReason::TickLimit;
            }

            let tick = self.timer.wait_for_tick();
            self.stats.record(&tick);
            let outcome = self.service.tick(
                &tick,
                &mut self.motor,
                &mut self.panel,
                &mut self.theming,
                &mut self.sink,
            );
            ticks += 1;

            if tick.index % interval == 0 {
                info!(
                    "LOOP | state={:?} fault={} | {}",
                    outcome.snapshot.state,
                    outcome.snapshot.fault,
                    self.stats.summary()
                );
            }
        };

        info!("Control loop stopping ({reason:?}) after {ticks} ticks");
        self.service.shutdown(&mut self.motor, &mut self.theming);

        RunReport {
            ticks,
            reason,
            last: self.service.last_snapshot().copied(),
        }
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn theming(&self) -> &Th {
        &self.theming
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
