//! Low-level hardware access: motor controller protocol, serial port setup
//! and GPIO lines.

pub mod roboclaw;
pub mod serial;
pub mod sysfs_gpio;
