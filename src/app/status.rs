//! Per-tick output records.

use std::time::Duration;

use serde::Serialize;

use crate::fsm::RideState;
use crate::fsm::context::{Cue, MotorStatus, RideCommand};
use crate::safety::SafetyFault;

/// One tick's view of the ride, published to every status sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub tick: u64,
    pub state: RideState,
    /// Fault reported this tick.  Stays set in every snapshot until the
    /// condition clears.
    pub fault: SafetyFault,
    #[serde(rename = "elapsed_in_state_ms", serialize_with = "as_millis")]
    pub elapsed_in_state: Duration,
    pub motor: MotorStatus,
    pub command: RideCommand,
    pub cue: Option<Cue>,
    #[serde(rename = "overrun_ms", serialize_with = "opt_as_millis")]
    pub overrun: Option<Duration>,
}

impl StatusSnapshot {
    /// Zero-velocity check on the issued command.
    pub fn is_stationary_command(&self) -> bool {
        !self.command.is_motion()
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn opt_as_millis<S: serde::Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&(d.as_millis() as u64)),
        None => s.serialize_none(),
    }
}

/// What [`RideService::tick`](super::service::RideService::tick) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub snapshot: StatusSnapshot,
    /// State when the tick began.
    pub previous: RideState,
    /// The motor accepted the command.
    pub commanded: bool,
    /// Every status sink accepted the snapshot.
    pub published: bool,
}

impl TickOutcome {
    pub fn transitioned(&self) -> bool {
        self.previous != self.snapshot.state
    }
}
