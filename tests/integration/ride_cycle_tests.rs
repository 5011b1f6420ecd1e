//! Integration tests for the normal ride cycle: panel → service → FSM →
//! motor, theming and status sink.

use crate::rig::{Rig, dispatch, short_cycle};

use rcc::config::{RideConfig, ShowCue};
use rcc::fsm::RideState;
use rcc::fsm::context::{ControlPanelSnapshot, Cue, Profile};
use rcc::safety::SafetyFault;

// ── Arm and dispatch ─────────────────────────────────────────

#[test]
fn arm_then_dispatch_over_two_ticks() {
    let mut rig = Rig::new(RideConfig::default());

    let first = rig.step();
    assert_eq!(first.previous, RideState::Idle);
    assert_eq!(first.snapshot.state, RideState::Armed);
    assert_eq!(first.snapshot.cue, Some(Cue::Ready));

    let second = rig.step_with(dispatch());
    assert_eq!(second.previous, RideState::Armed);
    assert_eq!(second.snapshot.state, RideState::Dispatching);
    assert_eq!(second.snapshot.command.profile, Profile::Launch);
    assert_eq!(second.snapshot.cue, Some(Cue::ShowStart));
}

#[test]
fn dispatch_without_arming_is_ignored() {
    let mut rig = Rig::with_panel(RideConfig::default(), Default::default());
    let out = rig.step_with(ControlPanelSnapshot {
        dispatch_requested: true,
        ..ControlPanelSnapshot::default()
    });
    assert_eq!(out.snapshot.state, RideState::Idle);
    assert!(out.snapshot.is_stationary_command());
}

#[test]
fn entry_cue_fires_once_while_guard_holds() {
    let mut rig = Rig::new(RideConfig::default());
    for _ in 0..20 {
        rig.step();
    }
    assert_eq!(rig.service.state(), RideState::Armed);
    assert_eq!(rig.theming.cues(), &[Cue::Ready]);
}

#[test]
fn losing_restraints_disarms() {
    let mut rig = Rig::new(RideConfig::default());
    rig.step();
    let out = rig.step_with(ControlPanelSnapshot {
        restraints_locked: false,
        ..ControlPanelSnapshot::ready()
    });
    assert_eq!(out.snapshot.state, RideState::Idle);
}

#[test]
fn stop_held_on_ready_console_keeps_ride_idle() {
    let held = ControlPanelSnapshot {
        stop_requested: true,
        ..ControlPanelSnapshot::ready()
    };
    let mut rig = Rig::with_panel(RideConfig::default(), rcc::adapters::MockControlPanel::holding(held));
    for _ in 0..6 {
        assert_eq!(rig.step().snapshot.state, RideState::Idle);
    }
    assert!(rig.theming.cues().is_empty());
}

#[test]
fn stuck_dispatch_button_does_not_relaunch() {
    let mut rig = Rig::with_panel(short_cycle(), rcc::adapters::MockControlPanel::holding(dispatch()));
    rig.step_with(ControlPanelSnapshot::ready());
    for _ in 0..500 {
        rig.step();
    }
    let launches = rig.theming.cues().iter().filter(|c| **c == Cue::ShowStart).count();
    assert_eq!(launches, 1);
    assert_eq!(rig.service.state(), RideState::Armed);
}

#[test]
fn maintenance_mode_inhibits_arming() {
    let mut rig = Rig::with_panel(
        RideConfig::default(),
        rcc::adapters::MockControlPanel::holding(ControlPanelSnapshot {
            maintenance_mode: true,
            ..ControlPanelSnapshot::ready()
        }),
    );
    for _ in 0..5 {
        assert_eq!(rig.step().snapshot.state, RideState::Idle);
    }
}

// ── Full cycle ───────────────────────────────────────────────

#[test]
fn round_trip_returns_to_idle_on_schedule() {
    let config = short_cycle();
    // arm + dispatch ticks, then each phase, then the settle window
    let expected = 2
        + config.ticks_for(config.dispatch_ms)
        + config.ticks_for(config.run_ms)
        + config.ticks_for(config.stop_ramp_ms)
        + u64::from(config.stop_settle_ticks);

    let mut rig = Rig::new(config);
    rig.step();
    rig.step_with(dispatch());
    let idle = rig
        .run_until(1_000, |o| o.snapshot.state == RideState::Idle)
        .expect("cycle never completed");

    assert!(
        idle.snapshot.tick.abs_diff(expected) <= 1,
        "idle at tick {}, expected {expected}",
        idle.snapshot.tick
    );
    assert!(rig.sink.snapshots().iter().all(|s| s.fault == SafetyFault::None));
    assert_eq!(
        rig.theming.cues(),
        &[Cue::Ready, Cue::ShowStart, Cue::RideRunning, Cue::ShowStop]
    );
}

#[test]
fn phases_follow_in_order() {
    let mut rig = Rig::new(short_cycle());
    rig.step();
    rig.step_with(dispatch());
    rig.run_until(1_000, |o| o.snapshot.state == RideState::Idle);

    let mut phases: Vec<RideState> = Vec::new();
    for s in rig.sink.snapshots() {
        if phases.last() != Some(&s.state) {
            phases.push(s.state);
        }
    }
    assert_eq!(
        phases,
        vec![
            RideState::Armed,
            RideState::Dispatching,
            RideState::Running,
            RideState::Stopping,
            RideState::Idle,
        ]
    );
}

#[test]
fn stopping_ramp_never_increases_speed() {
    let mut rig = Rig::new(short_cycle());
    rig.drive_to_running();
    rig.run_until(1_000, |o| o.snapshot.state == RideState::Idle);

    let ramp: Vec<i32> = rig
        .sink
        .snapshots()
        .iter()
        .filter(|s| s.state == RideState::Stopping)
        .map(|s| s.command.velocity)
        .collect();
    assert!(!ramp.is_empty());
    assert_eq!(ramp[0], short_cycle().run_velocity);
    assert!(ramp.windows(2).all(|w| w[1] <= w[0]));
    assert_eq!(ramp.last(), Some(&0));
}

#[test]
fn dispatch_completes_early_at_position() {
    let config = RideConfig {
        dispatch_position: Some(100),
        ..short_cycle()
    };
    let mut rig = Rig::new(config);
    rig.step();
    rig.step_with(dispatch());
    // 800 QPPS × 50 ms = 40 counts per tick once moving
    let running = rig
        .run_until(20, |o| o.snapshot.state == RideState::Running)
        .expect("position never reached");
    assert!(running.snapshot.tick < 2 + short_cycle().ticks_for(short_cycle().dispatch_ms));
    assert!(running.snapshot.motor.position >= 100);
}

#[test]
fn stop_button_during_run_ramps_down() {
    let mut rig = Rig::new(short_cycle());
    rig.drive_to_running();
    let out = rig.step_with(ControlPanelSnapshot {
        stop_requested: true,
        ..ControlPanelSnapshot::ready()
    });
    assert_eq!(out.snapshot.state, RideState::Stopping);
    assert_eq!(out.snapshot.cue, Some(Cue::ShowStop));
    assert_eq!(out.snapshot.command.profile, Profile::Decelerate);
}

#[test]
fn timed_show_cues_fire_during_run() {
    let config = RideConfig {
        show_cues: vec![ShowCue { at_ms: 200, id: 1 }, ShowCue { at_ms: 1_000, id: 2 }],
        ..short_cycle()
    };
    let mut rig = Rig::new(config);
    rig.step();
    rig.step_with(dispatch());
    rig.run_until(1_000, |o| o.snapshot.state == RideState::Idle);

    assert_eq!(
        rig.theming.cues(),
        &[
            Cue::Ready,
            Cue::ShowStart,
            Cue::RideRunning,
            Cue::Timed(1),
            Cue::Timed(2),
            Cue::ShowStop,
        ]
    );
}

#[test]
fn every_tick_publishes_one_snapshot() {
    let mut rig = Rig::new(short_cycle());
    for _ in 0..100 {
        assert!(rig.step().published);
    }
    let ticks: Vec<u64> = rig.sink.snapshots().iter().map(|s| s.tick).collect();
    assert_eq!(ticks, (1..=100).collect::<Vec<_>>());
}
