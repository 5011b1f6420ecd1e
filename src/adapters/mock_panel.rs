//! Scripted operator console.
//!
//! Frames queued with [`MockControlPanel::push`] are returned one per
//! read.  Once the script runs out the panel keeps returning its holding
//! snapshot.

use std::collections::VecDeque;

use crate::app::ports::ControlPanel;
use crate::error::PanelError;
use crate::fsm::context::ControlPanelSnapshot;

#[derive(Debug, Clone, Default)]
pub struct MockControlPanel {
    script: VecDeque<ControlPanelSnapshot>,
    holding: ControlPanelSnapshot,
    reads: u64,
}

impl MockControlPanel {
    /// All inputs released, key off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `snapshot` whenever the script is empty.
    pub fn holding(snapshot: ControlPanelSnapshot) -> Self {
        Self {
            holding: snapshot,
            ..Self::default()
        }
    }

    /// Operator sequence for simulated runs: key off for `wait` reads,
    /// then armed with restraints locked, then one dispatch press.
    /// The panel stays armed afterwards.
    pub fn demo(wait: u32) -> Self {
        let mut panel = Self::holding(ControlPanelSnapshot::ready());
        for _ in 0..wait {
            panel.push(ControlPanelSnapshot::default());
        }
        for _ in 0..wait {
            panel.push(ControlPanelSnapshot::ready());
        }
        panel.push(ControlPanelSnapshot {
            dispatch_requested: true,
            ..ControlPanelSnapshot::ready()
        });
        panel
    }

    /// Queue one frame.
    pub fn push(&mut self, snapshot: ControlPanelSnapshot) {
        self.script.push_back(snapshot);
    }

    /// Frames still queued.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// Reads served so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl ControlPanel for MockControlPanel {
    fn read(&mut self) -> Result<ControlPanelSnapshot, PanelError> {
        self.reads += 1;
        Ok(self.script.pop_front().unwrap_or(self.holding))
    }
}
