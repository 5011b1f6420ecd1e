//! Drive motor adapter over a RoboClaw motor controller.
//!
//! Both channels carry the same train, so every command is sent to M1 and
//! M2 in lock-step.  Telemetry is taken from M1 (speed and encoder) plus
//! the board status word.  Any framing or I/O failure during a poll turns
//! the whole tick's status silent; retrying is left to the next tick.

use std::io::{Read, Write};

use log::{info, warn};

use crate::app::ports::MotorController;
use crate::drivers::roboclaw::{Channel, RoboClaw, split_status, status_flags};
use crate::error::MotorError;
use crate::fsm::context::{MotorStatus, RideCommand};

/// Deceleration used when a command carries no acceleration (`Hold`,
/// `Halt`), in QPPS/s.
pub const HALT_ACCELERATION: u32 = 20_000;

pub struct RoboClawMotorController<T> {
    driver: RoboClaw<T>,
    halt_acceleration: u32,
    commanded: i32,
    warnings: u32,
}

impl<T: Read + Write> RoboClawMotorController<T> {
    pub fn new(driver: RoboClaw<T>) -> Self {
        Self {
            driver,
            halt_acceleration: HALT_ACCELERATION,
            commanded: 0,
            warnings: 0,
        }
    }

    pub fn with_halt_acceleration(mut self, accel: u32) -> Self {
        self.halt_acceleration = accel.max(1);
        self
    }

    /// Zero both encoders and log the controller's identity.  Called once
    /// before the loop starts.
    pub fn initialise(&mut self) -> Result<(), MotorError> {
        let version = self.driver.read_version()?;
        let battery = self.driver.read_main_battery()?;
        let temperature = self.driver.read_temperature()?;
        let (m1_amps, m2_amps) = self.driver.read_currents()?;
        info!(
            "RoboClaw {version} | battery={battery:.1}V temp={temperature:.1}C \
             current={m1_amps:.2}A/{m2_amps:.2}A"
        );

        self.driver.set_encoder(Channel::M1, 0)?;
        self.driver.set_encoder(Channel::M2, 0)?;
        self.driver.speed_accel(Channel::M1, self.halt_acceleration, 0)?;
        self.driver.speed_accel(Channel::M2, self.halt_acceleration, 0)?;
        Ok(())
    }

    pub fn driver(&self) -> &RoboClaw<T> {
        &self.driver
    }

    fn poll(&mut self) -> Result<MotorStatus, MotorError> {
        let measured_velocity = self.driver.read_speed(Channel::M1)?;
        let encoder = self.driver.read_encoder(Channel::M1)?;
        let status = self.driver.read_status()?;

        let (errors, warnings) = split_status(status);
        if warnings != self.warnings {
            for name in status_flags(warnings & !self.warnings) {
                warn!("RoboClaw warning: {name}");
            }
            self.warnings = warnings;
        }

        Ok(MotorStatus {
            commanded_velocity: self.commanded,
            measured_velocity,
            position: i64::from(encoder.count),
            fault_code: (errors != 0).then_some(errors),
            comm_alive: true,
        })
    }
}

impl<T: Read + Write> MotorController for RoboClawMotorController<T> {
    fn command(&mut self, command: &RideCommand) -> Result<(), MotorError> {
        let accel = match command.acceleration {
            0 => self.halt_acceleration,
            a => a,
        };
        self.driver.speed_accel(Channel::M1, accel, command.velocity)?;
        if let Err(e) = self.driver.speed_accel(Channel::M2, accel, command.velocity) {
            // M1 took the new speed and M2 did not: pull M1 back to rest.
            if command.velocity != 0 {
                if let Err(halt) = self.driver.speed_accel(Channel::M1, self.halt_acceleration, 0) {
                    warn!("RoboClaw M1 halt after M2 failure: {halt}");
                }
            }
            return Err(e);
        }
        self.commanded = command.velocity;
        Ok(())
    }

    fn read_status(&mut self) -> MotorStatus {
        match self.poll() {
            Ok(status) => status,
            Err(e) => {
                warn!("RoboClaw poll failed: {e}");
                MotorStatus::silent()
            }
        }
    }
}
