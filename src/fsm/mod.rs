//! Function-pointer finite state machine engine for the ride sequence.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                         │
//! │  ┌───────────────┬──────────┬──────────┬───────────────┬──────────┐ │
//! │  │ RideState     │ on_enter │ on_exit  │ on_update     │ command  │ │
//! │  ├───────────────┼──────────┼──────────┼───────────────┼──────────┤ │
//! │  │ Idle          │ fn(ctx)  │          │ fn->Option<>  │ Hold     │ │
//! │  │ Armed         │ fn(ctx)  │          │ fn->Option<>  │ Hold     │ │
//! │  │ Dispatching   │ fn(ctx)  │          │ fn->Option<>  │ Launch   │ │
//! │  │ Running       │ fn(ctx)  │ fn(ctx)  │ fn->Option<>  │ Cruise   │ │
//! │  │ Stopping      │ fn(ctx)  │          │ fn->Option<>  │ Decel    │ │
//! │  │ EmergencyStop │ fn(ctx)  │ fn(ctx)  │ fn->Option<>  │ Halt     │ │
//! │  │ Fault         │ fn(ctx)  │ fn(ctx)  │ fn->Option<>  │ Halt     │ │
//! │  └───────────────┴──────────┴──────────┴───────────────┴──────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine first maps the safety verdict onto a fault state.
//! Only when that yields nothing does it call `on_update` for the
//! **current** state.  A resulting transition runs `on_exit` for the
//! current state, then `on_enter` for the next.  Finally the command fn of
//! whichever state is now current produces the tick's [`RideCommand`].
//! At most one transition happens per tick, and a transition to the
//! current state is a no-op.

pub mod context;
pub mod states;

use std::time::Duration;

use context::{ControlPanelSnapshot, Cue, FsmContext, MotorStatus, RideCommand};
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::RideConfig;
use crate::safety::SafetyFault;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all ride states.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RideState {
    Idle = 0,
    Armed = 1,
    Dispatching = 2,
    Running = 3,
    Stopping = 4,
    EmergencyStop = 5,
    Fault = 6,
}

impl RideState {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 7;

    pub const ALL: [RideState; Self::COUNT] = [
        Self::Idle,
        Self::Armed,
        Self::Dispatching,
        Self::Running,
        Self::Stopping,
        Self::EmergencyStop,
        Self::Fault,
    ];

    /// Convert an index back to `RideState`.  Asserts in debug builds;
    /// returns `Fault` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Armed,
            2 => Self::Dispatching,
            3 => Self::Running,
            4 => Self::Stopping,
            5 => Self::EmergencyStop,
            6 => Self::Fault,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Fault
            }
        }
    }

    /// States in which a nonzero velocity may be commanded.
    pub fn permits_motion(self) -> bool {
        matches!(self, Self::Dispatching | Self::Running | Self::Stopping)
    }

    /// `EmergencyStop` or `Fault`.
    pub fn is_latched(self) -> bool {
        matches!(self, Self::EmergencyStop | Self::Fault)
    }
}

/// State a fault sends the ride to, given the state it is in now.
///
/// E-stop and motor faults go to `EmergencyStop` unless the ride is
/// already latched.  Every other fault goes to `Fault` from anywhere.
pub fn fault_target(fault: SafetyFault, current: RideState) -> Option<RideState> {
    match fault {
        SafetyFault::None => None,
        SafetyFault::EStopPressed | SafetyFault::MotorFault(_) => {
            (!current.is_latched()).then_some(RideState::EmergencyStop)
        }
        SafetyFault::CommTimeout
        | SafetyFault::OverSpeed(_)
        | SafetyFault::CycleTimeout
        | SafetyFault::TickOverrun(_) => Some(RideState::Fault),
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<RideState>;

/// Signature for the per-tick motor command of a state.
pub type StateCommandFn = fn(&FsmContext) -> RideCommand;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single ride state.
pub struct StateDescriptor {
    pub id: RideState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
    pub command: StateCommandFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `RideState as usize`.
    table: [StateDescriptor; RideState::COUNT],
    /// Index of the currently active state.
    current: usize,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; RideState::COUNT], initial: RideState) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.state_entered_at = ctx.now;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
        ctx.command = (self.table[self.current].command)(ctx);
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Release any cue deferred from the previous tick.
    /// 2. Map the fault onto a target state; if none, call `on_update`.
    /// 3. Transition if the target differs from the current state.
    /// 4. Compute the command for the (possibly new) current state.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        ctx.cue = ctx.pending_cue.take();

        let current = self.current_state();
        let next = match fault_target(ctx.fault, current) {
            Some(target) => Some(target),
            None => (self.table[self.current].on_update)(ctx),
        };

        if let Some(next_id) = next {
            self.force_transition(next_id, ctx);
        }

        ctx.command = (self.table[self.current].command)(ctx);
    }

    /// Transition immediately unless already in `next`.
    pub fn force_transition(&mut self, next: RideState, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> RideState {
        RideState::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: RideState, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        ctx.state_entered_at = ctx.now;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

// ---------------------------------------------------------------------------
// Ride state machine facade
// ---------------------------------------------------------------------------

/// What one tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub command: RideCommand,
    pub state: RideState,
    pub cue: Option<Cue>,
}

/// Ride state machine: the engine, its table and its context behind the
/// `tick(now, panel, motor, fault)` contract.
pub struct RideStateMachine {
    fsm: Fsm,
    ctx: FsmContext,
}

impl RideStateMachine {
    /// Build the machine in `Idle`.  `config` must already be validated.
    pub fn new(config: RideConfig) -> Self {
        let mut fsm = Fsm::new(states::build_state_table(), RideState::Idle);
        let mut ctx = FsmContext::new(config);
        fsm.start(&mut ctx);
        Self { fsm, ctx }
    }

    /// Process one tick's inputs and return the command, resulting state
    /// and cue.
    pub fn tick(
        &mut self,
        now: Duration,
        panel: &ControlPanelSnapshot,
        motor: &MotorStatus,
        fault: SafetyFault,
    ) -> Decision {
        self.ctx.now = now;
        self.ctx.panel = *panel;
        self.ctx.motor = *motor;
        self.ctx.fault = fault;

        self.fsm.tick(&mut self.ctx);
        self.ctx.prev_panel = *panel;

        let state = self.fsm.current_state();
        if !state.permits_motion() && self.ctx.command.is_motion() {
            // Unreachable through the table; kept as a last gate.
            log::error!("{state:?} produced a motion command; substituting halt");
            self.ctx.command = RideCommand::halt();
        }

        Decision {
            command: self.ctx.command,
            state,
            cue: self.ctx.cue,
        }
    }

    pub fn state(&self) -> RideState {
        self.fsm.current_state()
    }

    /// Time in the current state as of `now`.
    pub fn elapsed_in_state(&self, now: Duration) -> Duration {
        now.saturating_sub(self.ctx.state_entered_at)
    }

    /// Time since dispatch as of `now`, while a cycle is in progress.
    pub fn cycle_elapsed(&self, now: Duration) -> Option<Duration> {
        self.ctx.cycle_started_at.map(|t| now.saturating_sub(t))
    }

    /// Last command produced.
    pub fn command(&self) -> RideCommand {
        self.ctx.command
    }

    pub fn context(&self) -> &FsmContext {
        &self.ctx
    }
}
