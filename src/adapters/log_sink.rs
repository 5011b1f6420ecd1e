//! Log-based status sink adapter.
//!
//! Implements [`StatusSink`] by writing status lines through the `log`
//! facade (which the binary routes to the console).  Periodic telemetry
//! is rate-limited; state changes, fault changes and cues are logged on
//! the tick they happen.

use log::{info, warn};

use crate::app::ports::StatusSink;
use crate::app::status::StatusSnapshot;
use crate::error::SinkError;
use crate::fsm::RideState;
use crate::safety::SafetyFault;

/// Adapter that logs ride status to the console.
pub struct LogStatusSink {
    interval: u64,
    last_state: Option<RideState>,
    last_fault: SafetyFault,
}

impl LogStatusSink {
    /// Emit a telemetry line every `interval` ticks (at least 1).
    pub fn new(interval: u32) -> Self {
        Self {
            interval: u64::from(interval.max(1)),
            last_state: None,
            last_fault: SafetyFault::None,
        }
    }
}

impl StatusSink for LogStatusSink {
    fn publish(&mut self, s: &StatusSnapshot) -> Result<(), SinkError> {
        match self.last_state {
            None => info!("START | initial_state={:?}", s.state),
            Some(prev) if prev != s.state => info!("STATE | {:?} -> {:?}", prev, s.state),
            Some(_) => {}
        }
        self.last_state = Some(s.state);

        if s.fault != self.last_fault {
            if s.fault.is_some() {
                warn!("FAULT | {}", s.fault);
            } else {
                info!("FAULT | cleared");
            }
            self.last_fault = s.fault;
        }

        if let Some(cue) = s.cue {
            info!("CUE | {cue:?}");
        }

        if s.tick % self.interval == 0 {
            info!(
                "TELEM | tick={} state={:?} t={}ms | cmd={:?} {} QPPS | \
                 meas={} QPPS pos={} | comm={} fault={}",
                s.tick,
                s.state,
                s.elapsed_in_state.as_millis(),
                s.command.profile,
                s.command.velocity,
                s.motor.measured_velocity,
                s.motor.position,
                if s.motor.comm_alive { "OK" } else { "LOST" },
                s.fault,
            );
        }
        Ok(())
    }
}
