//! Simulation driver module.
//!
//! This module provides a software pin bank for rehearsal and testing
//! without physical hardware.

mod bank;
mod driver;

pub use bank::SimPinBank;
pub use driver::SimulationDriver;
