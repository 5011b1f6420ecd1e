//! Port traits: the boundary between ride logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RideService (domain)
//! ```
//!
//! Mock and hardware adapters implement these traits.  The
//! [`RideService`](super::service::RideService) takes them as generics at
//! the call site, so the core never touches hardware directly and can run
//! with any combination of implementations.  Boxed trait objects forward
//! to their contents so the binary can choose adapters at runtime.
//!
//! Every adapter must return within one tick period.  A motor controller
//! that stalls shows up as a silent status and is caught by the
//! communication watchdog, not by a timeout here.

use crate::app::status::StatusSnapshot;
use crate::error::{MotorError, PanelError, SinkError, ThemingError};
use crate::fsm::context::{ControlPanelSnapshot, Cue, MotorStatus, RideCommand};

// ───────────────────────────────────────────────────────────────
// Motor controller (domain → drive)
// ───────────────────────────────────────────────────────────────

/// Drive motor capability.
pub trait MotorController {
    /// Issue this tick's command.
    fn command(&mut self, command: &RideCommand) -> Result<(), MotorError>;

    /// Poll telemetry.  Communication failures are reported in the status
    /// (`comm_alive = false`), never as an error.
    fn read_status(&mut self) -> MotorStatus;
}

// ───────────────────────────────────────────────────────────────
// Control panel (operator → domain)
// ───────────────────────────────────────────────────────────────

/// Operator console capability.
pub trait ControlPanel {
    /// Sample every input once.
    fn read(&mut self) -> Result<ControlPanelSnapshot, PanelError>;
}

// ───────────────────────────────────────────────────────────────
// Theming controller (domain → show)
// ───────────────────────────────────────────────────────────────

/// Show system capability.  Fire-and-forget.
pub trait ThemingController {
    fn trigger(&mut self, cue: &Cue) -> Result<(), ThemingError>;
}

// ───────────────────────────────────────────────────────────────
// Status sink (domain → dashboard / log)
// ───────────────────────────────────────────────────────────────

/// Receives one snapshot per tick.  Write-only from the core.
pub trait StatusSink {
    fn publish(&mut self, snapshot: &StatusSnapshot) -> Result<(), SinkError>;
}

// ───────────────────────────────────────────────────────────────
// Boxed forwarding
// ───────────────────────────────────────────────────────────────

impl<T: MotorController + ?Sized> MotorController for Box<T> {
    fn command(&mut self, command: &RideCommand) -> Result<(), MotorError> {
        (**self).command(command)
    }

    fn read_status(&mut self) -> MotorStatus {
        (**self).read_status()
    }
}

impl<T: ControlPanel + ?Sized> ControlPanel for Box<T> {
    fn read(&mut self) -> Result<ControlPanelSnapshot, PanelError> {
        (**self).read()
    }
}

impl<T: ThemingController + ?Sized> ThemingController for Box<T> {
    fn trigger(&mut self, cue: &Cue) -> Result<(), ThemingError> {
        (**self).trigger(cue)
    }
}

impl<T: StatusSink + ?Sized> StatusSink for Box<T> {
    fn publish(&mut self, snapshot: &StatusSnapshot) -> Result<(), SinkError> {
        (**self).publish(snapshot)
    }
}

/// Fan a snapshot out to several sinks.  Every sink is tried; the first
/// error is returned.
impl<S: StatusSink> StatusSink for Vec<S> {
    fn publish(&mut self, snapshot: &StatusSnapshot) -> Result<(), SinkError> {
        let mut first = Ok(());
        for sink in self.iter_mut() {
            let result = sink.publish(snapshot);
            if first.is_ok() {
                first = result;
            }
        }
        first
    }
}
