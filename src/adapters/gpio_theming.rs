//! Show controller on two GPIO output lines.
//!
//! `enable` is held HIGH while the show runs.  `fx` changes level once per
//! cue so the show controller can trigger on either edge.

use embedded_hal::digital::OutputPin;
use log::debug;

use crate::app::ports::ThemingController;
use crate::error::ThemingError;
use crate::fsm::context::Cue;

pub struct GpioThemingController<P> {
    enable: P,
    fx: P,
    fx_level: bool,
}

impl<P: OutputPin> GpioThemingController<P> {
    /// Takes both lines and drives them LOW.
    pub fn new(mut enable: P, mut fx: P) -> Result<Self, ThemingError> {
        drive(&mut enable, "show_enable", false)?;
        drive(&mut fx, "show_fx", false)?;
        Ok(Self {
            enable,
            fx,
            fx_level: false,
        })
    }
}

fn drive<P: OutputPin>(pin: &mut P, line: &'static str, high: bool) -> Result<(), ThemingError> {
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.map_err(|e| ThemingError::OutputWrite {
        line,
        reason: format!("{e:?}"),
    })
}

impl<P: OutputPin> ThemingController for GpioThemingController<P> {
    fn trigger(&mut self, cue: &Cue) -> Result<(), ThemingError> {
        match cue {
            Cue::ShowStart | Cue::RideRunning => drive(&mut self.enable, "show_enable", true)?,
            Cue::ShowStop | Cue::ShowAbort => drive(&mut self.enable, "show_enable", false)?,
            Cue::Ready | Cue::Timed(_) => {}
        }
        drive(&mut self.fx, "show_fx", !self.fx_level)?;
        self.fx_level = !self.fx_level;
        debug!("SHOW | cue={cue:?} fx={}", self.fx_level);
        Ok(())
    }
}
