//! Per-tick context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to.  It carries this tick's panel and motor captures, the safety
//! verdict, timing, the command and cue produced for the tick, and the
//! ride configuration.  The service fills the inputs, the engine runs the
//! handlers, and the outputs are read back once the tick is done.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RideConfig;
use crate::safety::SafetyFault;

// ---------------------------------------------------------------------------
// Control panel capture (read-only to state handlers)
// ---------------------------------------------------------------------------

/// Operator inputs sampled once at the start of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPanelSnapshot {
    /// Dispatch button held.
    pub dispatch_requested: bool,
    /// Emergency-stop loop open.
    pub estop_asserted: bool,
    /// Operator key switch in the armed position.
    pub key_armed: bool,
    /// Restraint-check signal: every lap bar locked.
    pub restraints_locked: bool,
    /// Reset button held.
    pub reset_requested: bool,
    /// Cycle-stop button held.
    pub stop_requested: bool,
    /// Maintenance key switch on.  Inhibits arming.
    pub maintenance_mode: bool,
}

impl ControlPanelSnapshot {
    /// Snapshot substituted when the panel cannot be read: e-stop asserted,
    /// nothing else.
    pub const fn fail_safe() -> Self {
        Self {
            dispatch_requested: false,
            estop_asserted: true,
            key_armed: false,
            restraints_locked: false,
            reset_requested: false,
            stop_requested: false,
            maintenance_mode: false,
        }
    }

    /// Key armed and restraints locked, no buttons.
    pub const fn ready() -> Self {
        Self {
            dispatch_requested: false,
            estop_asserted: false,
            key_armed: true,
            restraints_locked: true,
            reset_requested: false,
            stop_requested: false,
            maintenance_mode: false,
        }
    }

    /// Whether the panel allows the ride to arm.
    pub fn arming_permitted(&self) -> bool {
        self.key_armed && self.restraints_locked && !self.maintenance_mode
    }
}

// ---------------------------------------------------------------------------
// Motor capture (read-only to state handlers)
// ---------------------------------------------------------------------------

/// Motor controller telemetry sampled once at the start of a tick.
/// Velocities are quadrature pulses per second (QPPS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorStatus {
    /// Velocity most recently accepted by the controller.
    pub commanded_velocity: i32,
    /// Velocity reported by the encoder.
    pub measured_velocity: i32,
    /// Encoder count.
    pub position: i64,
    /// Controller-reported error code, if any.
    pub fault_code: Option<u32>,
    /// Telemetry arrived this tick.
    pub comm_alive: bool,
}

impl MotorStatus {
    /// A healthy, stationary motor.
    pub const fn stopped() -> Self {
        Self {
            commanded_velocity: 0,
            measured_velocity: 0,
            position: 0,
            fault_code: None,
            comm_alive: true,
        }
    }

    /// No telemetry arrived.  Measurements are zeroed and must not be
    /// trusted.
    pub const fn silent() -> Self {
        Self {
            comm_alive: false,
            ..Self::stopped()
        }
    }
}

impl Default for MotorStatus {
    fn default() -> Self {
        Self::silent()
    }
}

// ---------------------------------------------------------------------------
// Motor command (written by the engine from the state's command fn)
// ---------------------------------------------------------------------------

/// Motion profile requested from the motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Stationary, ride ready.
    Hold,
    /// Stop as hard as the controller allows.
    Halt,
    /// Dispatch acceleration out of the station.
    Launch,
    /// Steady running speed.
    Cruise,
    /// Controlled ramp down at end of cycle.
    Decelerate,
}

/// One tick's motor command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideCommand {
    pub profile: Profile,
    /// Target velocity (QPPS).
    pub velocity: i32,
    /// Acceleration toward the target (QPPS/s).  Zero means the
    /// controller's own stopping rate.
    pub acceleration: u32,
}

impl RideCommand {
    pub const fn hold() -> Self {
        Self {
            profile: Profile::Hold,
            velocity: 0,
            acceleration: 0,
        }
    }

    pub const fn halt() -> Self {
        Self {
            profile: Profile::Halt,
            velocity: 0,
            acceleration: 0,
        }
    }

    /// Whether the command requests motion.
    pub fn is_motion(&self) -> bool {
        self.velocity != 0
    }
}

impl Default for RideCommand {
    fn default() -> Self {
        Self::hold()
    }
}

// ---------------------------------------------------------------------------
// Theming cues
// ---------------------------------------------------------------------------

/// Trigger sent to the theming controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "cue", content = "id", rename_all = "snake_case")]
pub enum Cue {
    /// Ride armed and waiting for dispatch.
    Ready,
    /// Dispatch started.
    ShowStart,
    /// Train at running speed.
    RideRunning,
    /// Normal end of cycle.
    ShowStop,
    /// Emergency stop or fault.
    ShowAbort,
    /// Configured cue at an offset into the run.
    Timed(u8),
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Monotonic time of the current tick.
    pub now: Duration,
    /// Time the current state was entered.
    pub state_entered_at: Duration,
    /// Time dispatch began, while a cycle is in progress.
    pub cycle_started_at: Option<Duration>,

    // -- Inputs --
    pub panel: ControlPanelSnapshot,
    /// Panel as captured on the previous tick.  Buttons act on the
    /// press, not the hold.
    pub prev_panel: ControlPanelSnapshot,
    pub motor: MotorStatus,
    /// Safety verdict for this tick.
    pub fault: SafetyFault,

    // -- Outputs --
    /// Motor command for this tick.
    pub command: RideCommand,
    /// Cue fired this tick.
    pub cue: Option<Cue>,
    /// Cue displaced by a transition cue; fires next tick.
    pub pending_cue: Option<Cue>,

    // -- Profile bookkeeping --
    /// Velocity commanded when Stopping was entered.
    pub stop_from_velocity: i32,
    /// Consecutive ticks within stop tolerance.
    pub settled_ticks: u32,
    /// Index of the next timed show cue.
    pub next_show_cue: usize,

    // -- Configuration --
    pub config: RideConfig,
}

impl FsmContext {
    /// Create a new context with the given configuration.
    pub fn new(config: RideConfig) -> Self {
        Self {
            now: Duration::ZERO,
            state_entered_at: Duration::ZERO,
            cycle_started_at: None,
            panel: ControlPanelSnapshot::default(),
            prev_panel: ControlPanelSnapshot::default(),
            motor: MotorStatus::stopped(),
            fault: SafetyFault::None,
            command: RideCommand::hold(),
            cue: None,
            pending_cue: None,
            stop_from_velocity: 0,
            settled_ticks: 0,
            next_show_cue: 0,
            config,
        }
    }

    /// Time spent in the current state as of this tick.
    pub fn elapsed_in_state(&self) -> Duration {
        self.now.saturating_sub(self.state_entered_at)
    }

    /// Milliseconds spent in the current state.
    pub fn ms_in_state(&self) -> u64 {
        self.elapsed_in_state().as_millis() as u64
    }

    /// Time since dispatch began, if a cycle is in progress.
    pub fn cycle_elapsed(&self) -> Option<Duration> {
        self.cycle_started_at.map(|t| self.now.saturating_sub(t))
    }

    /// Dispatch button went down this tick.
    pub fn dispatch_pressed(&self) -> bool {
        self.panel.dispatch_requested && !self.prev_panel.dispatch_requested
    }

    /// Reset button went down this tick.
    pub fn reset_pressed(&self) -> bool {
        self.panel.reset_requested && !self.prev_panel.reset_requested
    }

    /// Returns `true` if the safety monitor reported a fault this tick.
    pub fn has_fault(&self) -> bool {
        self.fault.is_some()
    }

    /// Fire a cue.  If one is already queued for this tick the new cue
    /// waits for the next tick.
    pub fn emit_cue(&mut self, cue: Cue) {
        if self.cue.is_none() {
            self.cue = Some(cue);
        } else {
            self.pending_cue = Some(cue);
        }
    }

    /// Fire a transition cue.  It always goes out this tick; a cue already
    /// queued moves to the next tick.
    pub fn emit_transition_cue(&mut self, cue: Cue) {
        if let Some(displaced) = self.cue.replace(cue) {
            self.pending_cue = Some(displaced);
        }
    }
}
