//! Application core: ride orchestration behind port traits.
//!
//! Everything here is hardware-agnostic.  Adapters implement the traits in
//! [`ports`]; [`service::RideService`] runs one tick against them and
//! [`runner::ControlLoop`] repeats that at the timer's pace.

pub mod ports;
pub mod runner;
pub mod service;
pub mod status;

pub use ports::{ControlPanel, MotorController, StatusSink, ThemingController};
pub use runner::{ControlLoop, RunReport, StopReason};
pub use service::RideService;
pub use status::{StatusSnapshot, TickOutcome};
