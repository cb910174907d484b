//! Pin driver implementations.
//!
//! - [`raspi_gpio`] - Production driver using the `raspi-gpio` tool
//! - [`simulation`] - Software pin bank for rehearsal and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `PinDriver` trait from `pinguard_common::io`
//! 3. Add a [`DriverKind`] variant and its config name

pub mod raspi_gpio;
pub mod simulation;

use pinguard_common::io::PinDriver;
use std::fmt;
use std::str::FromStr;

use crate::error::SafeguardError;

/// Built-in pin drivers, selected by the `[driver] name` config key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// `raspi-gpio` command line tool.
    RaspiGpio,
    /// In-memory pin bank.
    Simulation,
}

impl DriverKind {
    /// Every built-in driver.
    pub const ALL: [DriverKind; 2] = [DriverKind::RaspiGpio, DriverKind::Simulation];

    /// Name used in configuration and on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::RaspiGpio => "raspi-gpio",
            Self::Simulation => "simulation",
        }
    }

    /// Fresh, uninitialized driver instance.
    pub fn create(self) -> Box<dyn PinDriver> {
        match self {
            Self::RaspiGpio => Box::new(raspi_gpio::RaspiGpioDriver::new()),
            Self::Simulation => Box::new(simulation::SimulationDriver::new()),
        }
    }
}

impl FromStr for DriverKind {
    type Err = SafeguardError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| SafeguardError::DriverNotFound(name.to_string()))
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
