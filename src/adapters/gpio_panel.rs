//! Operator console on GPIO input lines.
//!
//! Buttons and key switches pull their line LOW when active.  The e-stop is
//! a normally-closed loop: LOW while intact, HIGH when pressed or broken,
//! so a cut wire reads as an emergency stop.

use embedded_hal::digital::InputPin;

use crate::app::ports::ControlPanel;
use crate::error::PanelError;
use crate::fsm::context::ControlPanelSnapshot;

/// The seven console inputs.
pub struct PanelLines<P> {
    pub dispatch: P,
    pub estop: P,
    pub key_armed: P,
    pub restraints: P,
    pub reset: P,
    pub stop: P,
    pub maintenance: P,
}

pub struct GpioControlPanel<P> {
    lines: PanelLines<P>,
}

impl<P: InputPin> GpioControlPanel<P> {
    pub fn new(lines: PanelLines<P>) -> Self {
        Self { lines }
    }
}

fn active_low<P: InputPin>(pin: &mut P, line: &'static str) -> Result<bool, PanelError> {
    pin.is_low().map_err(|e| PanelError::InputRead {
        line,
        reason: format!("{e:?}"),
    })
}

impl<P: InputPin> ControlPanel for GpioControlPanel<P> {
    fn read(&mut self) -> Result<ControlPanelSnapshot, PanelError> {
        let l = &mut self.lines;
        // Loop intact reads LOW; anything else is an e-stop.
        let estop_asserted = !active_low(&mut l.estop, "estop")?;
        Ok(ControlPanelSnapshot {
            dispatch_requested: active_low(&mut l.dispatch, "dispatch")?,
            estop_asserted,
            key_armed: active_low(&mut l.key_armed, "key_armed")?,
            restraints_locked: active_low(&mut l.restraints, "restraints")?,
            reset_requested: active_low(&mut l.reset, "reset")?,
            stop_requested: active_low(&mut l.stop, "stop")?,
            maintenance_mode: active_low(&mut l.maintenance, "maintenance")?,
        })
    }
}
