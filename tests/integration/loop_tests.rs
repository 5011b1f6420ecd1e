//! Integration tests for the outer ring: control loop, real-time timer,
//! status sinks and configuration files.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;

use crate::rig::{Rig, dispatch, short_cycle};

use rcc::adapters::{
    JsonLinesSink, LogStatusSink, MemoryStatusSink, MockControlPanel, MockMotorController,
    MockThemingController,
};
use rcc::app::{ControlLoop, RideService, StatusSink, StatusSnapshot, StopReason};
use rcc::config::RideConfig;
use rcc::error::{ConfigError, SinkError};
use rcc::fsm::RideState;
use rcc::fsm::context::{ControlPanelSnapshot, Cue, RideCommand};
use rcc::timer::FixedRateTimer;

// ── Status sinks ─────────────────────────────────────────────

struct Refusing;

impl StatusSink for Refusing {
    fn publish(&mut self, _: &StatusSnapshot) -> Result<(), SinkError> {
        Err(SinkError::Closed)
    }
}

#[derive(Clone, Default)]
struct Shared(Rc<RefCell<Vec<u64>>>);

impl StatusSink for Shared {
    fn publish(&mut self, s: &StatusSnapshot) -> Result<(), SinkError> {
        self.0.borrow_mut().push(s.tick);
        Ok(())
    }
}

#[test]
fn failing_sink_does_not_starve_the_others() {
    let config = short_cycle();
    let mut rig = Rig::new(config.clone());
    let seen = Shared::default();
    let mut sinks: Vec<Box<dyn StatusSink>> = vec![
        Box::new(Refusing),
        Box::new(seen.clone()),
        Box::new(LogStatusSink::new(config.telemetry_interval_ticks)),
    ];

    let tick = {
        use rcc::timer::TickSource;
        rig.timer.wait_for_tick()
    };
    let out = rig.service.tick(&tick, &mut rig.motor, &mut rig.panel, &mut rig.theming, &mut sinks);

    assert!(!out.published);
    assert_eq!(out.snapshot.state, RideState::Armed);
    assert_eq!(*seen.0.borrow(), vec![1]);
}

#[test]
fn json_feed_records_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.jsonl");

    let config = short_cycle();
    let mut panel = MockControlPanel::holding(ControlPanelSnapshot::ready());
    panel.push(ControlPanelSnapshot::ready());
    panel.push(dispatch());
    let mut control = ControlLoop::new(
        RideService::new(config.clone()).unwrap(),
        rcc::timer::ManualTimer::new(&config),
        MockMotorController::new(),
        panel,
        MockThemingController::new(),
        JsonLinesSink::create(&path).unwrap(),
    )
    .with_max_ticks(Some(70));
    let report = control.run(&AtomicBool::new(false));
    assert_eq!(report.reason, StopReason::TickLimit);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 70);
    assert_eq!(lines[1]["state"], "dispatching");
    assert_eq!(lines[1]["cue"]["cue"], "show_start");
    assert_eq!(lines[1]["command"]["profile"], "launch");
    assert!(lines.iter().any(|l| l["state"] == "stopping"));
    assert!(lines.iter().all(|l| l["fault"]["kind"] == "none"));
}

// ── Control loop ─────────────────────────────────────────────

#[test]
fn fixed_rate_loop_runs_to_tick_limit() {
    let config = RideConfig {
        tick_period_ms: 5,
        // Host scheduling jitter must not fault the test.
        fault_on_overrun: false,
        ..RideConfig::default()
    };
    let mut control = ControlLoop::new(
        RideService::new(config.clone()).unwrap(),
        FixedRateTimer::new(&config),
        MockMotorController::new(),
        MockControlPanel::holding(ControlPanelSnapshot::ready()),
        MockThemingController::new(),
        MemoryStatusSink::new(),
    )
    .with_max_ticks(Some(20));

    let started = std::time::Instant::now();
    let report = control.run(&AtomicBool::new(false));

    assert_eq!(report.ticks, 20);
    assert!(started.elapsed() >= std::time::Duration::from_millis(95));
    assert_eq!(control.sink().len(), 20);
    assert_eq!(report.last.map(|s| s.state), Some(RideState::Armed));
    // Shutdown from Armed halts and closes the show.
    assert_eq!(control.motor().last_command(), Some(RideCommand::halt()));
    assert_eq!(control.theming().cues(), &[Cue::Ready, Cue::ShowStop]);
}

// ── Configuration files ──────────────────────────────────────

#[test]
fn config_file_loads_and_drives_the_service() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
tick_period_ms = 20
dispatch_ms = 400
run_ms = 1000
stop_ramp_ms = 200
severity_order = ["comm_timeout", "e_stop_pressed", "motor_fault", "tick_overrun", "over_speed", "cycle_timeout"]

[[show_cues]]
at_ms = 100
id = 4
"#
    )
    .unwrap();

    let config = RideConfig::load(file.path()).unwrap();
    assert_eq!(config.tick_period_ms, 20);
    assert_eq!(config.ticks_for(config.dispatch_ms), 20);
    assert_eq!(config.show_cues.len(), 1);
    assert_eq!(config.severity()[0], rcc::safety::FaultKind::CommTimeout);
    RideService::new(config).unwrap();
}

#[test]
fn incomplete_severity_order_is_rejected() {
    let err = RideConfig::from_toml_str(r#"severity_order = ["e_stop_pressed"]"#).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            field: "severity_order",
            ..
        }
    ));
}

#[test]
fn show_cues_must_be_in_time_order() {
    let err = RideConfig::from_toml_str(
        r#"
[[show_cues]]
at_ms = 300
id = 1

[[show_cues]]
at_ms = 100
id = 2
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "show_cues", .. }));
}

#[test]
fn oversized_overrun_factor_is_rejected() {
    let err = RideConfig::from_toml_str("overrun_factor = 1e30\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "overrun_factor", .. }));
}

#[test]
fn missing_config_file_names_the_path() {
    let err = RideConfig::load(std::path::Path::new("/nonexistent/ride.toml")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/ride.toml"));
}
