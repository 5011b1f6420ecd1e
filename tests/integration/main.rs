//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises part of the ride control
//! computer against the in-memory adapters.  All tests run on the host
//! with no hardware attached.

mod fault_scenario_tests;
mod loop_tests;
mod ride_cycle_tests;
mod rig;
