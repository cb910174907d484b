//! Simulation driver implementation.
//!
//! The `SimulationDriver` implements the `PinDriver` trait on top of a
//! [`SimPinBank`]. On `init()` it adds every monitored pin to the bank and
//! applies the `[simulation]` table: initial levels, faults and scripted
//! level changes relative to the init instant.

use super::bank::SimPinBank;
use pinguard_common::prelude::*;
use std::time::Instant;
use tracing::{info, warn};

/// Simulation driver implementing the PinDriver trait.
#[derive(Debug)]
pub struct SimulationDriver {
    /// Simulated hardware
    bank: SimPinBank,
    /// Initialized flag
    initialized: bool,
}

impl SimulationDriver {
    /// Create a driver with an empty bank.
    pub fn new() -> Self {
        Self::with_bank(SimPinBank::default())
    }

    /// Create a driver over an existing bank handle.
    pub fn with_bank(bank: SimPinBank) -> Self {
        Self {
            bank,
            initialized: false,
        }
    }

    /// Handle to the simulated hardware.
    pub fn bank(&self) -> &SimPinBank {
        &self.bank
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PinDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, config: &SafeguardConfig) -> Result<(), IoError> {
        let sim = &config.simulation;
        let start = Instant::now();

        for rule in &config.pins {
            self.bank.add_pin(rule.pin, PinLevel::High);
        }
        for &pin in &sim.initial_low {
            self.bank.set_level(pin, PinLevel::Low);
        }
        for &pin in &sim.stuck {
            self.bank.set_stuck(pin, true);
        }
        for &pin in &sim.reject_writes {
            self.bank.set_reject_writes(pin, true);
        }
        for &pin in &sim.unreadable {
            self.bank.set_unreadable(pin, true);
        }
        for event in &sim.events {
            if !self.bank.contains(event.pin) {
                warn!("Simulation event for unmonitored {} ignored", event.pin);
                continue;
            }
            let due = event
                .offset()
                .and_then(|offset| start.checked_add(offset))
                .ok_or_else(|| {
                    IoError::InitFailed(format!(
                        "simulation event for {} at {}s is out of range",
                        event.pin, event.at_s
                    ))
                })?;
            self.bank.schedule(due, event.pin, event.level);
        }

        info!(
            "Simulation driver initialized: {} pins, {} stuck, {} unreadable, {} scripted events",
            config.pins.len(),
            sim.stuck.len(),
            sim.unreadable.len(),
            self.bank.pending_changes()
        );
        self.initialized = true;
        Ok(())
    }

    fn read_level(&mut self, pin: PinId) -> PinLevel {
        self.bank.apply_due(Instant::now());
        self.bank.read(pin)
    }

    fn write_level(&mut self, pin: PinId, level: DriveLevel) -> Result<(), IoError> {
        self.bank.apply_due(Instant::now());
        self.bank.write(pin, level)
    }

    fn shutdown(&mut self) -> Result<(), IoError> {
        if self.initialized {
            info!("Simulation driver shutdown ({} writes logged)", self.bank.writes().len());
            self.initialized = false;
        }
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        Some(self.bank.diagnostics())
    }
}
