//! Recording show controller.

use log::info;

use crate::app::ports::ThemingController;
use crate::error::ThemingError;
use crate::fsm::context::Cue;

/// Show status as reported by the theming system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowStatus {
    NotStarted,
    On,
    Off,
}

impl ShowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

/// Keeps every cue it was given and tracks whether the show is running.
#[derive(Debug, Clone)]
pub struct MockThemingController {
    cues: Vec<Cue>,
    status: ShowStatus,
    failing: bool,
}

impl Default for MockThemingController {
    fn default() -> Self {
        Self::new()
    }
}

impl MockThemingController {
    pub fn new() -> Self {
        Self {
            cues: Vec::new(),
            status: ShowStatus::NotStarted,
            failing: false,
        }
    }

    /// Refuse every cue from now on.
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Cues accepted, oldest first.
    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn status(&self) -> ShowStatus {
        self.status
    }
}

impl ThemingController for MockThemingController {
    fn trigger(&mut self, cue: &Cue) -> Result<(), ThemingError> {
        if self.failing {
            return Err(ThemingError::OutputWrite {
                line: "mock",
                reason: "theming offline".into(),
            });
        }
        match cue {
            Cue::ShowStart | Cue::RideRunning => self.status = ShowStatus::On,
            Cue::ShowStop | Cue::ShowAbort => self.status = ShowStatus::Off,
            Cue::Ready | Cue::Timed(_) => {}
        }
        info!("SHOW | cue={cue:?} status={}", self.status.as_str());
        self.cues.push(*cue);
        Ok(())
    }
}
