//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers.  Fault routing happens in
//! the engine before `on_update` is called, so the forward handlers below
//! only ever see a tick with no active fault.
//!
//! ```text
//!  IDLE ──[key + restraints]──▶ ARMED ──[dispatch press]──▶ DISPATCHING
//!    ▲  ◀──[key off / stop]──────┘                              │
//!    │                                              [time or position]
//!    │                                                          ▼
//!    └──[settled N ticks]── STOPPING ◀──[run done]────────── RUNNING
//!                              ▲                                │
//!                              └─────────[stop button]──────────┘
//!
//!  any ──[e-stop / motor fault]──▶ EMERGENCY_STOP ──[released + reset press]──▶ IDLE
//!  any ──[comm / speed / cycle / overrun]──▶ FAULT ──[cleared + reset press]──▶ IDLE
//! ```

use log::{error, info, warn};

use super::context::{Cue, FsmContext, Profile, RideCommand};
use super::{RideState, StateDescriptor};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; RideState::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: RideState::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
            command: hold_command,
        },
        // Index 1: Armed
        StateDescriptor {
            id: RideState::Armed,
            name: "Armed",
            on_enter: Some(armed_enter),
            on_exit: None,
            on_update: armed_update,
            command: hold_command,
        },
        // Index 2: Dispatching
        StateDescriptor {
            id: RideState::Dispatching,
            name: "Dispatching",
            on_enter: Some(dispatching_enter),
            on_exit: None,
            on_update: dispatching_update,
            command: dispatching_command,
        },
        // Index 3: Running
        StateDescriptor {
            id: RideState::Running,
            name: "Running",
            on_enter: Some(running_enter),
            on_exit: Some(running_exit),
            on_update: running_update,
            command: running_command,
        },
        // Index 4: Stopping
        StateDescriptor {
            id: RideState::Stopping,
            name: "Stopping",
            on_enter: Some(stopping_enter),
            on_exit: None,
            on_update: stopping_update,
            command: stopping_command,
        },
        // Index 5: EmergencyStop
        StateDescriptor {
            id: RideState::EmergencyStop,
            name: "EmergencyStop",
            on_enter: Some(estop_enter),
            on_exit: Some(latch_exit),
            on_update: estop_update,
            command: halt_command,
        },
        // Index 6: Fault
        StateDescriptor {
            id: RideState::Fault,
            name: "Fault",
            on_enter: Some(fault_enter),
            on_exit: Some(latch_exit),
            on_update: fault_update,
            command: halt_command,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Stationary commands
// ═══════════════════════════════════════════════════════════════════════════

fn hold_command(_ctx: &FsmContext) -> RideCommand {
    RideCommand::hold()
}

fn halt_command(_ctx: &FsmContext) -> RideCommand {
    RideCommand::halt()
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state: station, train stationary
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.cycle_started_at = None;
    ctx.settled_ticks = 0;
    info!("IDLE: train held in station");
}

fn idle_update(ctx: &mut FsmContext) -> Option<RideState> {
    // Stop held keeps the ride down; Armed would drop straight back.
    if ctx.panel.arming_permitted() && !ctx.panel.stop_requested {
        return Some(RideState::Armed);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  ARMED state: key on, restraints locked, waiting for dispatch
// ═══════════════════════════════════════════════════════════════════════════

fn armed_enter(ctx: &mut FsmContext) {
    ctx.emit_transition_cue(Cue::Ready);
    info!("ARMED: restraints locked, ready for dispatch");
}

fn armed_update(ctx: &mut FsmContext) -> Option<RideState> {
    if !ctx.panel.arming_permitted() || ctx.panel.stop_requested {
        info!("ARMED: arming conditions lost, returning to Idle");
        return Some(RideState::Idle);
    }
    if ctx.dispatch_pressed() {
        return Some(RideState::Dispatching);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISPATCHING state: launch out of the station
// ═══════════════════════════════════════════════════════════════════════════

fn dispatching_enter(ctx: &mut FsmContext) {
    ctx.cycle_started_at = Some(ctx.now);
    ctx.emit_transition_cue(Cue::ShowStart);
    info!(
        "DISPATCHING: launch at {} QPPS for {} ms",
        ctx.config.dispatch_velocity, ctx.config.dispatch_ms
    );
}

fn dispatching_update(ctx: &mut FsmContext) -> Option<RideState> {
    if ctx.panel.stop_requested {
        warn!("DISPATCHING: operator stop");
        return Some(RideState::Stopping);
    }

    let timed_out = ctx.ms_in_state() >= u64::from(ctx.config.dispatch_ms);
    let at_position = ctx
        .config
        .dispatch_position
        .is_some_and(|p| ctx.motor.position >= p);
    if timed_out || at_position {
        return Some(RideState::Running);
    }
    None
}

fn dispatching_command(ctx: &FsmContext) -> RideCommand {
    RideCommand {
        profile: Profile::Launch,
        velocity: ctx.config.dispatch_velocity,
        acceleration: ctx.config.acceleration,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  RUNNING state: on circuit, timed show cues
// ═══════════════════════════════════════════════════════════════════════════

fn running_enter(ctx: &mut FsmContext) {
    ctx.next_show_cue = 0;
    ctx.emit_transition_cue(Cue::RideRunning);
    info!(
        "RUNNING: cruise at {} QPPS for {} ms",
        ctx.config.run_velocity, ctx.config.run_ms
    );
}

fn running_exit(ctx: &mut FsmContext) {
    // Show cues do not outlive the run.
    if matches!(ctx.cue, Some(Cue::Timed(_))) {
        ctx.cue = None;
    }
    if matches!(ctx.pending_cue, Some(Cue::Timed(_))) {
        ctx.pending_cue = None;
    }
}

fn running_update(ctx: &mut FsmContext) -> Option<RideState> {
    if ctx.panel.stop_requested {
        warn!("RUNNING: operator stop");
        return Some(RideState::Stopping);
    }

    let ms = ctx.ms_in_state();
    if ms >= u64::from(ctx.config.run_ms) {
        info!("RUNNING: cycle complete after {ms} ms");
        return Some(RideState::Stopping);
    }

    // One show cue per tick; a cue already out this tick holds the next.
    if ctx.cue.is_none() {
        if let Some(show) = ctx.config.show_cues.get(ctx.next_show_cue).copied() {
            if ms >= u64::from(show.at_ms) {
                ctx.next_show_cue += 1;
                ctx.emit_cue(Cue::Timed(show.id));
            }
        }
    }
    None
}

fn running_command(ctx: &FsmContext) -> RideCommand {
    RideCommand {
        profile: Profile::Cruise,
        velocity: ctx.config.run_velocity,
        acceleration: ctx.config.acceleration,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  STOPPING state: ramp to zero, wait for the train to settle
// ═══════════════════════════════════════════════════════════════════════════

fn stopping_enter(ctx: &mut FsmContext) {
    // `command` still holds last tick's output here.
    ctx.stop_from_velocity = ctx.command.velocity;
    ctx.settled_ticks = 0;
    ctx.cycle_started_at = None;
    ctx.emit_transition_cue(Cue::ShowStop);
    info!(
        "STOPPING: ramp {} QPPS -> 0 over {} ms",
        ctx.stop_from_velocity, ctx.config.stop_ramp_ms
    );
}

fn stopping_update(ctx: &mut FsmContext) -> Option<RideState> {
    let tolerance = ctx.config.stop_tolerance.unsigned_abs();
    if ctx.motor.comm_alive && ctx.motor.measured_velocity.unsigned_abs() <= tolerance {
        ctx.settled_ticks = ctx.settled_ticks.saturating_add(1);
    } else {
        ctx.settled_ticks = 0;
    }

    if ctx.settled_ticks >= ctx.config.stop_settle_ticks {
        info!("STOPPING: train settled for {} ticks", ctx.settled_ticks);
        return Some(RideState::Idle);
    }
    None
}

fn stopping_command(ctx: &FsmContext) -> RideCommand {
    let ramp = u64::from(ctx.config.stop_ramp_ms);
    let v0 = i64::from(ctx.stop_from_velocity);
    let (velocity, acceleration) = if ramp == 0 {
        (0, 0)
    } else {
        let remaining = ramp.saturating_sub(ctx.ms_in_state()) as i64;
        let v = v0 * remaining / ramp as i64;
        let decel = v0.unsigned_abs() * 1_000 / ramp;
        (v as i32, u32::try_from(decel).unwrap_or(u32::MAX))
    };
    RideCommand {
        profile: Profile::Decelerate,
        velocity,
        acceleration,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  EMERGENCY_STOP state: latched until released and reset
// ═══════════════════════════════════════════════════════════════════════════

fn estop_enter(ctx: &mut FsmContext) {
    ctx.cycle_started_at = None;
    ctx.emit_transition_cue(Cue::ShowAbort);
    error!("EMERGENCY STOP: {}", ctx.fault);
}

fn estop_update(ctx: &mut FsmContext) -> Option<RideState> {
    if !ctx.panel.estop_asserted && ctx.reset_pressed() && !ctx.has_fault() {
        return Some(RideState::Idle);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  FAULT state: latched until the condition clears and is reset
// ═══════════════════════════════════════════════════════════════════════════

fn fault_enter(ctx: &mut FsmContext) {
    ctx.cycle_started_at = None;
    ctx.emit_transition_cue(Cue::ShowAbort);
    error!("FAULT: {}", ctx.fault);
}

fn fault_update(ctx: &mut FsmContext) -> Option<RideState> {
    if ctx.reset_pressed() && !ctx.has_fault() {
        return Some(RideState::Idle);
    }
    None
}

fn latch_exit(_ctx: &mut FsmContext) {
    info!("RESET: operator reset accepted");
}
