//! Safety monitor.
//!
//! The monitor runs **every tick before the FSM**.  It looks at the panel
//! and motor captures for this tick plus timing data and reports at most
//! one [`SafetyFault`]: every rule is checked, and when several are true at
//! once the one ranked highest by the configured [`SeverityOrder`] wins.
//!
//! ## Rules
//!
//! | Kind           | Condition                                                |
//! |----------------|----------------------------------------------------------|
//! | `EStopPressed` | panel e-stop asserted                                     |
//! | `MotorFault`   | motor reported an error code                              |
//! | `CommTimeout`  | motor silent for more than `comm_timeout_ticks` in a row  |
//! | `TickOverrun`  | loop timer reported a severe late wake (if enabled)       |
//! | `OverSpeed`    | \|measured velocity\| strictly above the ceiling          |
//! | `CycleTimeout` | dispatch + run, or a single stop, longer than `max_cycle_ms` |
//!
//! Over speed is only judged on live telemetry.  A silent tick reports a
//! zeroed velocity, and sustained silence is already `CommTimeout`.
//!
//! [`SafetyMonitor::evaluate`] is pure.  The only counter involved (silent
//! motor ticks) lives in [`CommWatchdog`], which the service advances once
//! per tick before evaluating.

use core::fmt;
use std::time::Duration;

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::RideConfig;
use crate::fsm::RideState;
use crate::fsm::context::{ControlPanelSnapshot, MotorStatus};

// ---------------------------------------------------------------------------
// Fault kinds and precedence
// ---------------------------------------------------------------------------

/// Discriminant of [`SafetyFault`] without its payload; used to express
/// precedence policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    EStopPressed,
    MotorFault,
    CommTimeout,
    TickOverrun,
    OverSpeed,
    CycleTimeout,
}

impl FaultKind {
    pub const COUNT: usize = 6;

    /// Default precedence, most severe first.
    pub const ALL: [FaultKind; Self::COUNT] = [
        FaultKind::EStopPressed,
        FaultKind::MotorFault,
        FaultKind::CommTimeout,
        FaultKind::TickOverrun,
        FaultKind::OverSpeed,
        FaultKind::CycleTimeout,
    ];
}

/// Fault precedence list.  Validated by [`RideConfig::validate`] to be a
/// permutation of [`FaultKind::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeverityOrder(heapless::Vec<FaultKind, { FaultKind::COUNT }>);

impl Default for SeverityOrder {
    fn default() -> Self {
        Self(heapless::Vec::from_slice(&FaultKind::ALL).unwrap_or_default())
    }
}

impl SeverityOrder {
    /// Build an order from an explicit list.  Returns `None` if the list
    /// is longer than the number of fault kinds.
    pub fn new(order: &[FaultKind]) -> Option<Self> {
        heapless::Vec::from_slice(order).ok().map(Self)
    }

    /// True when every kind appears exactly once.
    pub fn is_complete(&self) -> bool {
        self.0.len() == FaultKind::COUNT
            && FaultKind::ALL
                .iter()
                .all(|k| self.0.iter().filter(|o| *o == k).count() == 1)
    }

    /// Position of `kind` in the order (0 = most severe).
    pub fn rank(&self, kind: FaultKind) -> usize {
        self.0
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(FaultKind::COUNT)
    }

    pub fn as_slice(&self) -> &[FaultKind] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// SafetyFault
// ---------------------------------------------------------------------------

/// The single fault verdict reported for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SafetyFault {
    #[default]
    None,
    /// Operator (or fail-safe) emergency stop.
    EStopPressed,
    /// Motor controller error code.
    MotorFault(u32),
    /// Motor telemetry silent past the timeout.
    CommTimeout,
    /// Loop woke this many milliseconds past its deadline.
    TickOverrun(u32),
    /// Measured velocity (QPPS) above the ceiling.
    OverSpeed(i32),
    /// Ride cycle ran past its maximum duration.
    CycleTimeout,
}

impl SafetyFault {
    pub fn kind(self) -> Option<FaultKind> {
        match self {
            Self::None => None,
            Self::EStopPressed => Some(FaultKind::EStopPressed),
            Self::MotorFault(_) => Some(FaultKind::MotorFault),
            Self::CommTimeout => Some(FaultKind::CommTimeout),
            Self::TickOverrun(_) => Some(FaultKind::TickOverrun),
            Self::OverSpeed(_) => Some(FaultKind::OverSpeed),
            Self::CycleTimeout => Some(FaultKind::CycleTimeout),
        }
    }

    pub fn is_none(self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::EStopPressed => write!(f, "e-stop pressed"),
            Self::MotorFault(code) => write!(f, "motor fault {code:#010x}"),
            Self::CommTimeout => write!(f, "motor communication timeout"),
            Self::TickOverrun(ms) => write!(f, "control loop overrun ({ms} ms late)"),
            Self::OverSpeed(v) => write!(f, "over speed ({v} QPPS)"),
            Self::CycleTimeout => write!(f, "ride cycle timeout"),
        }
    }
}

// ---------------------------------------------------------------------------
// Monitor inputs
// ---------------------------------------------------------------------------

/// Everything the monitor looks at for one tick.
#[derive(Debug, Clone, Copy)]
pub struct SafetyInputs<'a> {
    pub panel: &'a ControlPanelSnapshot,
    pub motor: &'a MotorStatus,
    /// Consecutive ticks with no motor telemetry, this tick included.
    pub silent_ticks: u32,
    /// State the FSM is in when the tick starts.
    pub state: RideState,
    /// Time spent in `state` as of this tick.
    pub elapsed_in_state: Duration,
    /// Time since dispatch started, if a cycle is in progress.
    pub cycle_elapsed: Option<Duration>,
    /// Lateness reported by the loop timer for this tick.
    pub overrun: Option<Duration>,
}

// ---------------------------------------------------------------------------
// SafetyMonitor
// ---------------------------------------------------------------------------

/// Safety monitor.
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    overspeed_ceiling: u32,
    comm_timeout_ticks: u32,
    max_cycle: Duration,
    fault_on_overrun: bool,
    order: SeverityOrder,
}

impl SafetyMonitor {
    pub fn new(config: &RideConfig) -> Self {
        Self {
            overspeed_ceiling: config.overspeed_ceiling.unsigned_abs(),
            comm_timeout_ticks: config.comm_timeout_ticks,
            max_cycle: Duration::from_millis(u64::from(config.max_cycle_ms)),
            fault_on_overrun: config.fault_on_overrun,
            order: config.severity_order.clone(),
        }
    }

    /// Evaluate every rule and return the most severe active fault, or
    /// [`SafetyFault::None`].
    pub fn evaluate(&self, inputs: &SafetyInputs<'_>) -> SafetyFault {
        self.active(inputs)
            .into_iter()
            .next()
            .unwrap_or(SafetyFault::None)
    }

    /// All active faults, most severe first.
    pub fn active(&self, inputs: &SafetyInputs<'_>) -> heapless::Vec<SafetyFault, { FaultKind::COUNT }> {
        let mut found: heapless::Vec<SafetyFault, { FaultKind::COUNT }> = heapless::Vec::new();
        let mut raise = |fault: SafetyFault| {
            // Capacity equals the number of rules; one push per rule.
            let _ = found.push(fault);
        };

        // ── E-stop ────────────────────────────────────────────────
        if inputs.panel.estop_asserted {
            raise(SafetyFault::EStopPressed);
        }

        // ── Motor controller fault code ──────────────────────────
        if let Some(code) = inputs.motor.fault_code {
            raise(SafetyFault::MotorFault(code));
        }

        // ── Telemetry silence ─────────────────────────────────────
        if inputs.silent_ticks > self.comm_timeout_ticks {
            raise(SafetyFault::CommTimeout);
        }

        // ── Scheduling delay ──────────────────────────────────────
        if self.fault_on_overrun {
            if let Some(late) = inputs.overrun {
                raise(SafetyFault::TickOverrun(
                    u32::try_from(late.as_millis()).unwrap_or(u32::MAX),
                ));
            }
        }

        // ── Over speed ────────────────────────────────────────────
        // Silent ticks carry no measurement; silence has its own rule.
        if inputs.motor.comm_alive
            && inputs.motor.measured_velocity.unsigned_abs() > self.overspeed_ceiling
        {
            raise(SafetyFault::OverSpeed(inputs.motor.measured_velocity));
        }

        // ── Cycle duration ────────────────────────────────────────
        let cycle_overdue = matches!(inputs.state, RideState::Dispatching | RideState::Running)
            && inputs.cycle_elapsed.is_some_and(|t| t > self.max_cycle);
        // A stop that never settles would hold the ride in Stopping forever.
        let stop_overdue =
            inputs.state == RideState::Stopping && inputs.elapsed_in_state > self.max_cycle;
        if cycle_overdue || stop_overdue {
            raise(SafetyFault::CycleTimeout);
        }

        found.sort_unstable_by_key(|f| f.kind().map_or(FaultKind::COUNT, |k| self.order.rank(k)));
        found
    }
}

// ---------------------------------------------------------------------------
// Communication watchdog
// ---------------------------------------------------------------------------

/// Counts consecutive ticks without motor telemetry.
#[derive(Debug, Clone, Default)]
pub struct CommWatchdog {
    silent: u32,
}

impl CommWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this tick's liveness.  Returns the updated silent-tick count.
    pub fn observe(&mut self, alive: bool) -> u32 {
        if alive {
            self.silent = 0;
        } else {
            self.silent = self.silent.saturating_add(1);
        }
        self.silent
    }

    pub fn silent_ticks(&self) -> u32 {
        self.silent
    }
}

// ---------------------------------------------------------------------------
// Fault edge logging
// ---------------------------------------------------------------------------

/// Remembers the last reported fault so onset and clearance are logged
/// once instead of every tick.
#[derive(Debug, Clone, Default)]
pub struct FaultTracker {
    last: SafetyFault,
}

impl FaultTracker {
    pub fn update(&mut self, fault: SafetyFault) {
        if fault == self.last {
            return;
        }
        match (self.last, fault) {
            (_, SafetyFault::None) => info!("SAFETY FAULT CLEARED: {}", self.last),
            (SafetyFault::None, now) => error!("SAFETY FAULT SET: {now}"),
            (before, now) => error!("SAFETY FAULT CHANGED: {before} -> {now}"),
        }
        self.last = fault;
    }

    pub fn last(&self) -> SafetyFault {
        self.last
    }
}
