//! Simulated drive motor.
//!
//! A first-order follower: each poll moves the measured velocity a fixed
//! fraction of the way toward the last accepted command and integrates
//! position over one tick period.  With the default response of 1.0 the
//! measurement equals the previous tick's command.
//!
//! Faults, silence and velocity overrides can be scripted for tests.

use std::time::Duration;

use crate::app::ports::MotorController;
use crate::error::MotorError;
use crate::fsm::context::{MotorStatus, RideCommand};

/// In-memory motor controller.
#[derive(Debug, Clone)]
pub struct MockMotorController {
    response: f32,
    period: Duration,
    commanded: i32,
    measured: f32,
    position: f64,
    last_command: Option<RideCommand>,
    commands: u64,
    fault_code: Option<u32>,
    scheduled_fault: Option<(u64, u32)>,
    silent_polls: u32,
    silent: bool,
    velocity_override: Option<i32>,
    offline: bool,
}

impl Default for MockMotorController {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMotorController {
    pub fn new() -> Self {
        Self {
            response: 1.0,
            period: Duration::from_millis(50),
            commanded: 0,
            measured: 0.0,
            position: 0.0,
            last_command: None,
            commands: 0,
            fault_code: None,
            scheduled_fault: None,
            silent_polls: 0,
            silent: false,
            velocity_override: None,
            offline: false,
        }
    }

    /// Fraction of the remaining velocity error closed per poll, clamped
    /// to `0.0..=1.0`.
    pub fn with_response(mut self, response: f32) -> Self {
        self.response = response.clamp(0.0, 1.0);
        self
    }

    /// Period used to integrate position.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    // ── Scripting ─────────────────────────────────────────────

    /// Report `code` from now until cleared.
    pub fn set_fault(&mut self, code: Option<u32>) {
        self.fault_code = code;
    }

    /// Raise `code` once `after` commands have been accepted.
    pub fn fault_after_commands(&mut self, after: u64, code: u32) {
        self.scheduled_fault = Some((after, code));
    }

    /// Drop the next `polls` status reads.
    pub fn go_silent_for(&mut self, polls: u32) {
        self.silent_polls = polls;
    }

    /// Drop every status read until turned off.
    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// Report this measured velocity regardless of the command.
    pub fn override_velocity(&mut self, velocity: Option<i32>) {
        self.velocity_override = velocity;
    }

    /// Reject every command with [`MotorError::Offline`].
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn last_command(&self) -> Option<RideCommand> {
        self.last_command
    }

    /// Number of commands accepted so far.
    pub fn commands(&self) -> u64 {
        self.commands
    }

    pub fn measured_velocity(&self) -> i32 {
        self.velocity_override.unwrap_or(self.measured.round() as i32)
    }
}

impl MotorController for MockMotorController {
    fn command(&mut self, command: &RideCommand) -> Result<(), MotorError> {
        if self.offline {
            return Err(MotorError::Offline);
        }
        self.commanded = command.velocity;
        self.last_command = Some(*command);
        self.commands += 1;

        if let Some((after, code)) = self.scheduled_fault {
            if self.commands >= after {
                self.fault_code = Some(code);
                self.scheduled_fault = None;
            }
        }
        Ok(())
    }

    fn read_status(&mut self) -> MotorStatus {
        self.measured += (self.commanded as f32 - self.measured) * self.response;
        let velocity = self.measured_velocity();
        self.position += f64::from(velocity) * self.period.as_secs_f64();

        if self.silent || self.silent_polls > 0 {
            self.silent_polls = self.silent_polls.saturating_sub(1);
            return MotorStatus::silent();
        }

        MotorStatus {
            commanded_velocity: self.commanded,
            measured_velocity: velocity,
            position: self.position as i64,
            fault_code: self.fault_code,
            comm_alive: true,
        }
    }
}
