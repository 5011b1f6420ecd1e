//! Ride configuration parameters
//!
//! All tunable thresholds and timings for the ride control computer.
//! Values come from a TOML file (every field optional, missing ones take
//! the defaults below) and are validated once, before the control loop
//! starts.  The resulting [`RideConfig`] is passed explicitly into the
//! service and timer constructors; nothing reads it as global state.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::safety::{FaultKind, SeverityOrder};

/// Largest accepted `overrun_factor`.
pub const MAX_OVERRUN_FACTOR: f32 = 100.0;

/// A theming cue scheduled at a fixed offset into the `Running` phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowCue {
    /// Offset from entering `Running` (milliseconds).
    pub at_ms: u32,
    /// Cue identifier passed through to the theming controller.
    pub id: u8,
}

/// Core ride configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RideConfig {
    // --- Timing ---
    /// Control loop period (milliseconds)
    pub tick_period_ms: u32,
    /// A tick that wakes later than this many periods past its deadline
    /// is reported as an overrun
    pub overrun_factor: f32,
    /// Treat a reported overrun as a safety fault
    pub fault_on_overrun: bool,
    /// Status log interval (ticks)
    pub telemetry_interval_ticks: u32,

    // --- Ride profile ---
    /// Velocity commanded while dispatching (QPPS)
    pub dispatch_velocity: i32,
    /// Velocity commanded while running (QPPS)
    pub run_velocity: i32,
    /// Acceleration passed with launch/cruise commands (QPPS/s)
    pub acceleration: u32,
    /// Duration of the dispatch profile (milliseconds)
    pub dispatch_ms: u32,
    /// Optional encoder count that completes dispatch early
    pub dispatch_position: Option<i64>,
    /// Duration of the run phase (milliseconds)
    pub run_ms: u32,
    /// Deceleration ramp length while stopping (milliseconds)
    pub stop_ramp_ms: u32,
    /// Timed show cues fired during the run phase
    pub show_cues: Vec<ShowCue>,

    // --- Stopping ---
    /// |measured velocity| at or below this counts as stopped (QPPS)
    pub stop_tolerance: i32,
    /// Consecutive stopped ticks required before returning to Idle
    pub stop_settle_ticks: u32,

    // --- Safety ---
    /// Highest permitted |measured velocity| (QPPS); equal is allowed
    pub overspeed_ceiling: i32,
    /// Consecutive silent motor ticks tolerated before CommTimeout
    pub comm_timeout_ticks: u32,
    /// Longest permitted dispatch + run cycle (milliseconds)
    pub max_cycle_ms: u32,
    /// Fault precedence, most severe first
    pub severity_order: SeverityOrder,
}

impl Default for RideConfig {
    fn default() -> Self {
        Self {
            // Timing
            tick_period_ms: 50, // 20 Hz
            overrun_factor: 3.0,
            fault_on_overrun: true,
            telemetry_interval_ticks: 40, // every 2 s

            // Ride profile
            dispatch_velocity: 800,
            run_velocity: 1500,
            acceleration: 500,
            dispatch_ms: 3_000,
            dispatch_position: None,
            run_ms: 45_000,
            stop_ramp_ms: 2_000,
            show_cues: Vec::new(),

            // Stopping
            stop_tolerance: 10,
            stop_settle_ticks: 5,

            // Safety
            overspeed_ceiling: 2_000,
            comm_timeout_ticks: 3,
            max_cycle_ms: 90_000,
            severity_order: SeverityOrder::default(),
        }
    }
}

impl RideConfig {
    /// Read, parse and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the controller must never run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::invalid("tick_period_ms", "must be greater than zero"));
        }
        if !(1.0..=MAX_OVERRUN_FACTOR).contains(&self.overrun_factor) {
            return Err(ConfigError::invalid("overrun_factor", "must be within 1.0..=100.0"));
        }
        if self.telemetry_interval_ticks == 0 {
            return Err(ConfigError::invalid(
                "telemetry_interval_ticks",
                "must be greater than zero",
            ));
        }
        if self.overspeed_ceiling <= 0 {
            return Err(ConfigError::invalid("overspeed_ceiling", "must be positive"));
        }
        if self.run_velocity == 0 {
            return Err(ConfigError::invalid("run_velocity", "must be nonzero"));
        }
        if self.dispatch_velocity.unsigned_abs() > self.overspeed_ceiling.unsigned_abs() {
            return Err(ConfigError::invalid(
                "dispatch_velocity",
                "exceeds overspeed_ceiling",
            ));
        }
        if self.run_velocity.unsigned_abs() > self.overspeed_ceiling.unsigned_abs() {
            return Err(ConfigError::invalid("run_velocity", "exceeds overspeed_ceiling"));
        }
        if self.run_ms == 0 {
            return Err(ConfigError::invalid("run_ms", "must be greater than zero"));
        }
        if self.comm_timeout_ticks == 0 {
            return Err(ConfigError::invalid("comm_timeout_ticks", "must be at least 1"));
        }
        if self.stop_settle_ticks == 0 {
            return Err(ConfigError::invalid("stop_settle_ticks", "must be at least 1"));
        }
        if self.stop_tolerance < 0 {
            return Err(ConfigError::invalid("stop_tolerance", "must not be negative"));
        }
        if u64::from(self.max_cycle_ms) <= u64::from(self.dispatch_ms) + u64::from(self.run_ms) {
            return Err(ConfigError::invalid(
                "max_cycle_ms",
                "must exceed dispatch_ms + run_ms",
            ));
        }
        if !self.severity_order.is_complete() {
            return Err(ConfigError::invalid(
                "severity_order",
                "must list every fault kind exactly once",
            ));
        }
        if self.show_cues.iter().any(|c| c.at_ms >= self.run_ms) {
            return Err(ConfigError::invalid("show_cues", "cue offset beyond run_ms"));
        }
        if self.show_cues.windows(2).any(|w| w[1].at_ms < w[0].at_ms) {
            return Err(ConfigError::invalid("show_cues", "must be listed in at_ms order"));
        }
        Ok(())
    }

    /// Control loop period.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_period_ms))
    }

    /// Number of whole ticks covering `ms` (rounded up).
    pub fn ticks_for(&self, ms: u32) -> u64 {
        u64::from(ms).div_ceil(u64::from(self.tick_period_ms))
    }

    /// Fault kinds in precedence order.
    pub fn severity(&self) -> &[FaultKind] {
        self.severity_order.as_slice()
    }
}
