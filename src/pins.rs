//! GPIO line assignments for the ride control cabinet (BCM numbering on the
//! Raspberry Pi header).
//!
//! Single source of truth: the GPIO adapters take their line numbers from
//! here rather than hard-coding them.

// ---------------------------------------------------------------------------
// Operator console inputs (active LOW, internal pull-ups)
// ---------------------------------------------------------------------------

/// Dispatch push button.
pub const DISPATCH_GPIO: u32 = 5;
/// Emergency-stop loop.  Normally closed: LOW = loop intact,
/// HIGH = button pressed or wire broken.
pub const ESTOP_GPIO: u32 = 6;
/// Operator key switch, armed position.
pub const KEY_ARMED_GPIO: u32 = 13;
/// Restraint-check relay: LOW when every lap bar is locked.
pub const RESTRAINTS_GPIO: u32 = 19;
/// Reset push button.
pub const RESET_GPIO: u32 = 26;
/// Cycle-stop push button.
pub const STOP_GPIO: u32 = 16;
/// Maintenance key switch.
pub const MAINTENANCE_GPIO: u32 = 20;

// ---------------------------------------------------------------------------
// Show controller outputs (active HIGH, through opto-isolators)
// ---------------------------------------------------------------------------

/// Show enable: HIGH while the show should run.
pub const SHOW_ENABLE_GPIO: u32 = 23;
/// Effects trigger: toggled once per cue.
pub const SHOW_FX_GPIO: u32 = 24;

// ---------------------------------------------------------------------------
// Motor controller UART
// ---------------------------------------------------------------------------

/// UART TX/RX to the RoboClaw (`/dev/ttyAMA1` with the uart2 overlay).
pub const UART_TX_GPIO: u32 = 0;
pub const UART_RX_GPIO: u32 = 1;
