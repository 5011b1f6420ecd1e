//! Integration tests for fault handling: every safety rule routed through
//! the service, latching, and operator reset.

use std::time::Duration;

use crate::rig::{Rig, dispatch, estop, reset, short_cycle};

use rcc::adapters::MockControlPanel;
use rcc::config::RideConfig;
use rcc::fsm::RideState;
use rcc::fsm::context::{ControlPanelSnapshot, Cue, Profile};
use rcc::safety::{FaultKind, SafetyFault, SeverityOrder};

// ── E-stop ───────────────────────────────────────────────────

#[test]
fn estop_while_running_halts_in_same_tick() {
    let mut rig = Rig::new(short_cycle());
    rig.drive_to_running();

    let out = rig.step_with(estop());
    assert_eq!(out.snapshot.fault, SafetyFault::EStopPressed);
    assert_eq!(out.snapshot.state, RideState::EmergencyStop);
    assert_eq!(out.snapshot.command.velocity, 0);
    assert_eq!(out.snapshot.command.profile, Profile::Halt);
    assert_eq!(out.snapshot.cue, Some(Cue::ShowAbort));
    assert_eq!(rig.motor.last_command().map(|c| c.velocity), Some(0));
}

#[test]
fn estop_from_idle_latches() {
    let mut rig = Rig::new(RideConfig::default());
    let out = rig.step_with(estop());
    assert_eq!(out.snapshot.state, RideState::EmergencyStop);
}

#[test]
fn estop_reset_requires_release_and_reset() {
    let mut rig = Rig::new(short_cycle());
    rig.drive_to_running();
    rig.step_with(estop());

    // Still pressed: reset refused.
    let held = rig.step_with(ControlPanelSnapshot {
        reset_requested: true,
        ..estop()
    });
    assert_eq!(held.snapshot.state, RideState::EmergencyStop);

    // Released, no reset: stays latched with the fault cleared.
    let released = rig.step();
    assert_eq!(released.snapshot.state, RideState::EmergencyStop);
    assert_eq!(released.snapshot.fault, SafetyFault::None);

    let out = rig.step_with(reset());
    assert_eq!(out.snapshot.state, RideState::Idle);
    assert!(out.snapshot.is_stationary_command());
}

#[test]
fn unreadable_panel_counts_as_estop() {
    use rcc::app::ControlPanel;
    use rcc::error::PanelError;

    struct Flaky(MockControlPanel, u32);
    impl ControlPanel for Flaky {
        fn read(&mut self) -> Result<ControlPanelSnapshot, PanelError> {
            self.1 += 1;
            if self.1 == 3 {
                return Err(PanelError::InputRead {
                    line: "estop",
                    reason: "gpio vanished".into(),
                });
            }
            self.0.read()
        }
    }

    let config = short_cycle();
    let mut timer = rcc::timer::ManualTimer::new(&config);
    let mut service = rcc::app::RideService::new(config).unwrap();
    let mut motor = rcc::adapters::MockMotorController::new();
    let mut panel = Flaky(MockControlPanel::holding(ControlPanelSnapshot::ready()), 0);
    panel.0.push(ControlPanelSnapshot::ready());
    panel.0.push(dispatch());
    let mut theming = rcc::adapters::MockThemingController::new();
    let mut sink = rcc::adapters::MemoryStatusSink::new();

    let mut states = Vec::new();
    for _ in 0..3 {
        use rcc::timer::TickSource;
        let out = service.tick(&timer.wait_for_tick(), &mut motor, &mut panel, &mut theming, &mut sink);
        states.push((out.snapshot.state, out.snapshot.fault));
    }
    assert_eq!(
        states,
        vec![
            (RideState::Armed, SafetyFault::None),
            (RideState::Dispatching, SafetyFault::None),
            (RideState::EmergencyStop, SafetyFault::EStopPressed),
        ]
    );
}

// ── Motor controller fault ───────────────────────────────────

#[test]
fn motor_fault_during_tick_10_stops_on_tick_11() {
    let config = RideConfig {
        dispatch_ms: 200,
        ..short_cycle()
    };
    let mut rig = Rig::new(config);
    // Controller raises code 7 while handling the tick-10 command.
    rig.motor.fault_after_commands(10, 7);

    rig.step();
    rig.step_with(dispatch());
    for _ in 3..=10 {
        rig.step();
    }
    let tick10 = rig.sink.last().copied().unwrap();
    assert_eq!(tick10.tick, 10);
    assert_eq!(tick10.state, RideState::Running);
    assert_eq!(tick10.fault, SafetyFault::None);

    let out = rig.step();
    assert_eq!(out.snapshot.tick, 11);
    assert_eq!(out.snapshot.fault, SafetyFault::MotorFault(7));
    assert_eq!(out.snapshot.state, RideState::EmergencyStop);
    assert_eq!(out.snapshot.command.velocity, 0);
}

#[test]
fn motor_fault_blocks_reset_until_cleared() {
    let mut rig = Rig::new(short_cycle());
    rig.motor.set_fault(Some(0x20));
    assert_eq!(rig.step().snapshot.state, RideState::EmergencyStop);

    assert_eq!(rig.step_with(reset()).snapshot.state, RideState::EmergencyStop);

    // Reset still held when the fault clears: no new press, stays latched.
    rig.motor.set_fault(None);
    let held = rig.step_with(reset());
    assert_eq!(held.snapshot.fault, SafetyFault::None);
    assert_eq!(held.snapshot.state, RideState::EmergencyStop);

    rig.step();
    assert_eq!(rig.step_with(reset()).snapshot.state, RideState::Idle);
}

// ── Communication ────────────────────────────────────────────

#[test]
fn four_silent_ticks_with_threshold_three_fault_on_tick_four() {
    let config = RideConfig {
        comm_timeout_ticks: 3,
        ..RideConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.motor.go_silent_for(4);

    for tick in 1..=3 {
        let out = rig.step();
        assert_eq!(out.snapshot.tick, tick);
        assert_eq!(out.snapshot.fault, SafetyFault::None, "tick {tick}");
        assert!(!out.snapshot.motor.comm_alive);
    }
    let out = rig.step();
    assert_eq!(out.snapshot.tick, 4);
    assert_eq!(out.snapshot.fault, SafetyFault::CommTimeout);
    assert_eq!(out.snapshot.state, RideState::Fault);
}

#[test]
fn fault_reset_waits_for_comm_to_return() {
    let mut rig = Rig::new(RideConfig::default());
    rig.motor.set_silent(true);
    rig.run_until(10, |o| o.snapshot.state == RideState::Fault)
        .expect("no comm fault");

    let refused = rig.step_with(reset());
    assert_eq!(refused.snapshot.state, RideState::Fault);
    assert_eq!(refused.snapshot.fault, SafetyFault::CommTimeout);

    rig.motor.set_silent(false);
    rig.step();
    let out = rig.step_with(reset());
    assert_eq!(out.snapshot.state, RideState::Idle);
    assert_eq!(out.snapshot.fault, SafetyFault::None);
}

#[test]
fn fault_state_holds_without_reset() {
    let mut rig = Rig::new(RideConfig::default());
    rig.motor.go_silent_for(10);
    rig.run_until(20, |o| o.snapshot.state == RideState::Fault);
    for _ in 0..20 {
        let out = rig.step();
        assert_eq!(out.snapshot.state, RideState::Fault);
        assert!(out.snapshot.is_stationary_command());
    }
}

// ── Over speed ───────────────────────────────────────────────

#[test]
fn speed_equal_to_ceiling_is_allowed() {
    let config = short_cycle();
    let ceiling = config.overspeed_ceiling;
    let mut rig = Rig::new(config);
    rig.drive_to_running();

    rig.motor.override_velocity(Some(ceiling));
    let out = rig.step();
    assert_eq!(out.snapshot.fault, SafetyFault::None);
    assert_eq!(out.snapshot.state, RideState::Running);
}

#[test]
fn speed_one_above_ceiling_faults() {
    let config = short_cycle();
    let ceiling = config.overspeed_ceiling;
    let mut rig = Rig::new(config);
    rig.drive_to_running();

    rig.motor.override_velocity(Some(ceiling + 1));
    let out = rig.step();
    assert_eq!(out.snapshot.fault, SafetyFault::OverSpeed(ceiling + 1));
    assert_eq!(out.snapshot.state, RideState::Fault);
    assert_eq!(out.snapshot.command.velocity, 0);
}

#[test]
fn reverse_over_speed_faults() {
    let config = short_cycle();
    let ceiling = config.overspeed_ceiling;
    let mut rig = Rig::new(config);
    rig.motor.override_velocity(Some(-ceiling - 1));
    assert_eq!(rig.step().snapshot.state, RideState::Fault);
}

// ── Timing ───────────────────────────────────────────────────

#[test]
fn overrun_faults_and_is_reported() {
    let mut rig = Rig::new(RideConfig::default());
    rig.step();
    rig.timer.inject_delay(Duration::from_millis(200));

    let out = rig.step();
    assert_eq!(out.snapshot.overrun, Some(Duration::from_millis(200)));
    assert_eq!(out.snapshot.fault, SafetyFault::TickOverrun(200));
    assert_eq!(out.snapshot.state, RideState::Fault);

    // Next tick is on schedule again.
    let next = rig.step();
    assert_eq!(next.snapshot.overrun, None);
    assert_eq!(next.snapshot.fault, SafetyFault::None);
    assert_eq!(next.snapshot.state, RideState::Fault);
}

#[test]
fn overrun_below_threshold_is_not_reported() {
    let mut rig = Rig::new(RideConfig::default());
    // Threshold is 3 × 50 ms.
    rig.timer.inject_delay(Duration::from_millis(150));
    let out = rig.step();
    assert_eq!(out.snapshot.overrun, None);
    assert_eq!(out.snapshot.fault, SafetyFault::None);
}

#[test]
fn overrun_only_reported_when_not_fatal() {
    let config = RideConfig {
        fault_on_overrun: false,
        ..RideConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.timer.inject_delay(Duration::from_millis(400));
    let out = rig.step();
    assert_eq!(out.snapshot.overrun, Some(Duration::from_millis(400)));
    assert_eq!(out.snapshot.fault, SafetyFault::None);
    assert_eq!(out.snapshot.state, RideState::Armed);
}

#[test]
fn stalled_cycle_times_out() {
    let config = RideConfig {
        fault_on_overrun: false,
        ..short_cycle()
    };
    let max_cycle = Duration::from_millis(u64::from(config.max_cycle_ms));
    let mut rig = Rig::new(config);
    rig.drive_to_running();

    rig.timer.inject_delay(max_cycle);
    let out = rig.step();
    assert_eq!(out.snapshot.fault, SafetyFault::CycleTimeout);
    assert_eq!(out.snapshot.state, RideState::Fault);
}

#[test]
fn stop_that_never_settles_times_out() {
    let config = RideConfig {
        max_cycle_ms: 3_000,
        ..short_cycle()
    };
    let limit = 2 * config.ticks_for(config.max_cycle_ms);
    let mut rig = Rig::new(config);
    rig.drive_to_running();
    rig.run_until(1_000, |o| o.snapshot.state == RideState::Stopping)
        .expect("never stopped");

    // Train keeps rolling above the settle tolerance.
    rig.motor.override_velocity(Some(500));
    let out = rig
        .run_until(limit, |o| o.snapshot.state != RideState::Stopping)
        .expect("stuck in Stopping");
    assert_eq!(out.snapshot.fault, SafetyFault::CycleTimeout);
    assert_eq!(out.snapshot.state, RideState::Fault);
    assert!(out.snapshot.elapsed_in_state.is_zero());
}

// ── Severity ─────────────────────────────────────────────────

fn estop_and_silence(config: RideConfig) -> (RideState, SafetyFault) {
    let mut rig = Rig::with_panel(config, MockControlPanel::holding(estop()));
    rig.motor.set_silent(true);
    let mut last = None;
    for _ in 0..4 {
        last = Some(rig.step());
    }
    let s = last.unwrap().snapshot;
    (s.state, s.fault)
}

#[test]
fn estop_outranks_comm_timeout_by_default() {
    let (state, fault) = estop_and_silence(RideConfig::default());
    assert_eq!(fault, SafetyFault::EStopPressed);
    assert_eq!(state, RideState::EmergencyStop);
}

#[test]
fn severity_order_override_changes_reported_fault() {
    let order = SeverityOrder::new(&[
        FaultKind::CommTimeout,
        FaultKind::EStopPressed,
        FaultKind::MotorFault,
        FaultKind::TickOverrun,
        FaultKind::OverSpeed,
        FaultKind::CycleTimeout,
    ])
    .unwrap();
    let (state, fault) = estop_and_silence(RideConfig {
        severity_order: order,
        ..RideConfig::default()
    });
    assert_eq!(fault, SafetyFault::CommTimeout);
    assert_eq!(state, RideState::Fault);
}
