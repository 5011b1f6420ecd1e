//! Ride service: the per-tick orchestration core.
//!
//! [`RideService`] owns the state machine, the safety monitor and the
//! communication watchdog.  All I/O flows through port traits injected at
//! call sites, so the service runs unchanged against mocks or hardware.
//!
//! ```text
//!  ControlPanel ──▶ ┌──────────────────────────┐ ──▶ MotorController
//!                   │        RideService        │ ──▶ ThemingController
//! MotorController ─▶│  Watchdog · Safety · FSM  │ ──▶ StatusSink
//!                   └──────────────────────────┘
//! ```
//!
//! Tick order:
//!
//! 1. capture panel and motor inputs (a failed panel read becomes the
//!    fail-safe snapshot, which asserts e-stop)
//! 2. advance the watchdog and evaluate safety
//! 3. tick the state machine
//! 4. command the motor, fire the cue, publish the snapshot
//!
//! Theming and sink failures are logged and dropped.  A rejected motor
//! command counts as a silent tick on the next poll.

use log::{error, warn};

use crate::config::RideConfig;
use crate::error::ConfigError;
use crate::fsm::context::{ControlPanelSnapshot, Cue, RideCommand};
use crate::fsm::{RideState, RideStateMachine};
use crate::safety::{CommWatchdog, FaultTracker, SafetyFault, SafetyInputs, SafetyMonitor};
use crate::timer::Tick;

use super::ports::{ControlPanel, MotorController, StatusSink, ThemingController};
use super::status::{StatusSnapshot, TickOutcome};

// ───────────────────────────────────────────────────────────────
// RideService
// ───────────────────────────────────────────────────────────────

/// The ride service orchestrates all domain logic for one run.
pub struct RideService {
    config: RideConfig,
    machine: RideStateMachine,
    monitor: SafetyMonitor,
    watchdog: CommWatchdog,
    faults: FaultTracker,
    /// The previous tick's motor command was rejected.
    command_failed: bool,
    last: Option<StatusSnapshot>,
}

impl RideService {
    /// Validate `config` and build the service in `Idle`.
    pub fn new(config: RideConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let monitor = SafetyMonitor::new(&config);
        let machine = RideStateMachine::new(config.clone());
        Ok(Self {
            config,
            machine,
            monitor,
            watchdog: CommWatchdog::new(),
            faults: FaultTracker::default(),
            command_failed: false,
            last: None,
        })
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    pub fn tick(
        &mut self,
        tick: &Tick,
        motor: &mut impl MotorController,
        panel: &mut impl ControlPanel,
        theming: &mut impl ThemingController,
        sink: &mut impl StatusSink,
    ) -> TickOutcome {
        let previous = self.machine.state();

        // 1. Capture inputs
        let panel_snapshot = match panel.read() {
            Ok(s) => s,
            Err(e) => {
                error!("Control panel read failed ({e}); assuming e-stop");
                ControlPanelSnapshot::fail_safe()
            }
        };
        let mut motor_status = motor.read_status();
        if self.command_failed {
            motor_status.comm_alive = false;
        }

        // 2. Safety evaluation
        let silent_ticks = self.watchdog.observe(motor_status.comm_alive);
        let fault = self.monitor.evaluate(&SafetyInputs {
            panel: &panel_snapshot,
            motor: &motor_status,
            silent_ticks,
            state: previous,
            elapsed_in_state: self.machine.elapsed_in_state(tick.now),
            cycle_elapsed: self.machine.cycle_elapsed(tick.now),
            overrun: tick.overrun,
        });
        self.faults.update(fault);

        // 3. State machine
        let decision = self
            .machine
            .tick(tick.now, &panel_snapshot, &motor_status, fault);

        // 4. Outputs
        let commanded = self.issue(motor, &decision.command);
        if let Some(cue) = decision.cue {
            fire(theming, cue);
        }

        let snapshot = StatusSnapshot {
            tick: tick.index,
            state: decision.state,
            fault,
            elapsed_in_state: self.machine.elapsed_in_state(tick.now),
            motor: motor_status,
            command: decision.command,
            cue: decision.cue,
            overrun: tick.overrun,
        };
        let published = match sink.publish(&snapshot) {
            Ok(()) => true,
            Err(e) => {
                warn!("Status publish failed: {e}");
                false
            }
        };
        self.last = Some(snapshot);

        TickOutcome {
            snapshot,
            previous,
            commanded,
            published,
        }
    }

    /// Bring the ride to rest before the process exits: command a halt
    /// and, unless the ride was idle, close the show.
    pub fn shutdown(
        &mut self,
        motor: &mut impl MotorController,
        theming: &mut impl ThemingController,
    ) {
        let state = self.machine.state();
        self.issue(motor, &RideCommand::halt());
        if state != RideState::Idle {
            warn!("Shutdown requested in {state:?}; ride halted");
            fire(theming, Cue::ShowStop);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> RideState {
        self.machine.state()
    }

    /// Fault reported on the most recent tick.
    pub fn fault(&self) -> SafetyFault {
        self.faults.last()
    }

    /// Most recent snapshot, if any tick has run.
    pub fn last_snapshot(&self) -> Option<&StatusSnapshot> {
        self.last.as_ref()
    }

    pub fn config(&self) -> &RideConfig {
        &self.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn issue(&mut self, motor: &mut impl MotorController, command: &RideCommand) -> bool {
        match motor.command(command) {
            Ok(()) => {
                self.command_failed = false;
                true
            }
            Err(e) => {
                warn!("Motor command {:?} failed: {e}", command.profile);
                self.command_failed = true;
                false
            }
        }
    }
}

fn fire(theming: &mut impl ThemingController, cue: Cue) {
    if let Err(e) = theming.trigger(&cue) {
        warn!("Theming cue {cue:?} failed: {e}");
    }
}
