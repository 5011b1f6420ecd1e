//! Test rig: a [`RideService`] wired to the in-memory adapters and a
//! virtual-clock timer.

use rcc::adapters::{MemoryStatusSink, MockControlPanel, MockMotorController, MockThemingController};
use rcc::app::{RideService, TickOutcome};
use rcc::config::RideConfig;
use rcc::fsm::RideState;
use rcc::fsm::context::ControlPanelSnapshot;
use rcc::timer::{ManualTimer, TickSource};

pub struct Rig {
    pub service: RideService,
    pub timer: ManualTimer,
    pub motor: MockMotorController,
    pub panel: MockControlPanel,
    pub theming: MockThemingController,
    pub sink: MemoryStatusSink,
}

#[allow(dead_code)]
impl Rig {
    /// Rig whose panel holds key-armed, restraints-locked.
    pub fn new(config: RideConfig) -> Self {
        Self::with_panel(config, MockControlPanel::holding(ControlPanelSnapshot::ready()))
    }

    pub fn with_panel(config: RideConfig, panel: MockControlPanel) -> Self {
        Self {
            timer: ManualTimer::new(&config),
            motor: MockMotorController::new().with_period(config.tick_period()),
            panel,
            theming: MockThemingController::new(),
            sink: MemoryStatusSink::new(),
            service: RideService::new(config).expect("test config must be valid"),
        }
    }

    pub fn step(&mut self) -> TickOutcome {
        let tick = self.timer.wait_for_tick();
        self.service.tick(
            &tick,
            &mut self.motor,
            &mut self.panel,
            &mut self.theming,
            &mut self.sink,
        )
    }

    /// Run one tick with `snapshot` on the console.
    pub fn step_with(&mut self, snapshot: ControlPanelSnapshot) -> TickOutcome {
        self.panel.push(snapshot);
        self.step()
    }

    /// Step until `done` holds, at most `limit` ticks.
    pub fn run_until(
        &mut self,
        limit: u64,
        done: impl Fn(&TickOutcome) -> bool,
    ) -> Option<TickOutcome> {
        for _ in 0..limit {
            let out = self.step();
            if done(&out) {
                return Some(out);
            }
        }
        None
    }

    /// Arm on tick 1, dispatch on tick 2, then run until `Running`.
    pub fn drive_to_running(&mut self) -> TickOutcome {
        assert_eq!(self.step().snapshot.state, RideState::Armed);
        assert_eq!(self.step_with(dispatch()).snapshot.state, RideState::Dispatching);
        self.run_until(10_000, |o| o.snapshot.state == RideState::Running)
            .expect("ride never reached Running")
    }
}

/// Ready console with the dispatch button held.
pub fn dispatch() -> ControlPanelSnapshot {
    ControlPanelSnapshot {
        dispatch_requested: true,
        ..ControlPanelSnapshot::ready()
    }
}

/// Ready console with the reset button held and e-stop released.
pub fn reset() -> ControlPanelSnapshot {
    ControlPanelSnapshot {
        reset_requested: true,
        ..ControlPanelSnapshot::ready()
    }
}

pub fn estop() -> ControlPanelSnapshot {
    ControlPanelSnapshot {
        estop_asserted: true,
        ..ControlPanelSnapshot::ready()
    }
}

/// 50 ms ticks; 10 dispatch ticks, 40 run ticks, 10 ramp ticks.
pub fn short_cycle() -> RideConfig {
    RideConfig {
        tick_period_ms: 50,
        dispatch_ms: 500,
        run_ms: 2_000,
        stop_ramp_ms: 500,
        ..RideConfig::default()
    }
}
