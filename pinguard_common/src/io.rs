//! Pin driver trait and error types.
//!
//! This module defines:
//! - `PinDriver` trait - Interface for pluggable pin access backends
//! - `IoError` enum - Error types for pin access
//! - `DriverDiagnostics` struct - Optional driver counters

use crate::config::SafeguardConfig;
use crate::level::{DriveLevel, PinId, PinLevel};
use thiserror::Error;

/// Error types for pin access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Helper process could not be started
    #[error("Failed to spawn {command}: {reason}")]
    Spawn {
        /// Program that was invoked
        command: String,
        /// OS error text
        reason: String,
    },

    /// Helper process exited unsuccessfully
    #[error("{command} exited with status {status}")]
    CommandFailed {
        /// Program that was invoked
        command: String,
        /// Exit status as reported by the OS
        status: String,
    },

    /// Output did not contain a recognisable level
    #[error("Unparseable output for {pin}: {output:?}")]
    Unparseable {
        /// Pin that was read
        pin: PinId,
        /// Raw output
        output: String,
    },

    /// Pin is not known to the driver
    #[error("Unknown pin: {0}")]
    UnknownPin(PinId),

    /// The driver refused the write
    #[error("Write to {pin} rejected: {reason}")]
    WriteRejected {
        /// Pin that was written
        pin: PinId,
        /// Driver-provided reason
        reason: String,
    },
}

/// Optional driver counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverDiagnostics {
    /// Number of read requests
    pub reads: u64,
    /// Reads that returned `Unknown`
    pub read_failures: u64,
    /// Number of write requests
    pub writes: u64,
    /// Writes that returned an error
    pub write_failures: u64,
}

/// Trait defining the interface for pin access backends.
///
/// The safeguard treats every call as unreliable: a successful write does not
/// imply that a following read will reflect it.
///
/// # Lifecycle
///
/// 1. `init()` - Called once before the first read
/// 2. `read_level()` / `write_level()` - Called from the safety loop
/// 3. `shutdown()` - Called when the safeguard stops
///
/// Calls are blocking. Their latency bounds the tick latency.
pub trait PinDriver: Send {
    /// Returns the driver's unique identifier (e.g., "simulation", "raspi-gpio").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Initialize the driver.
    ///
    /// # Errors
    /// Return `IoError::InitFailed` if the backend cannot be used at all.
    fn init(&mut self, config: &SafeguardConfig) -> Result<(), IoError>;

    /// Read the current level of `pin`.
    ///
    /// Any failure is reported as [`PinLevel::Unknown`]; the driver logs the
    /// cause.
    fn read_level(&mut self, pin: PinId) -> PinLevel;

    /// Drive `pin` to `level`.
    ///
    /// `Ok(())` only means the request was accepted.
    fn write_level(&mut self, pin: PinId, level: DriveLevel) -> Result<(), IoError>;

    /// Release the backend.
    fn shutdown(&mut self) -> Result<(), IoError> {
        Ok(())
    }

    /// Get driver counters.
    /// Default: None
    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        None
    }
}
