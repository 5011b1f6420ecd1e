//! Ride control computer library.
//!
//! Exposes the ride core (state machine, safety monitor, loop timer and
//! service) together with the adapters the `rcc` binary composes.
//! Linux-only hardware access is guarded by the `hardware` feature inside
//! [`drivers::serial`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod safety;
pub mod timer;
