//! Safeguard error type.
//!
//! Only startup and internal failures surface as `SafeguardError`. Read and
//! write failures inside the safety loop are handled where they occur.

use pinguard_common::config::ConfigError;
use pinguard_common::io::IoError;
use pinguard_common::level::PinId;
use thiserror::Error;

use crate::core::RunPhase;

/// Exit status for an unreadable pin at startup.
pub const EXIT_STARTUP_FAILURE: i32 = 1;

/// Exit status for configuration and internal errors.
pub const EXIT_INTERNAL_ERROR: i32 = 2;

/// Fatal safeguard errors.
#[derive(Debug, Error)]
pub enum SafeguardError {
    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The driver failed outside the safety loop.
    #[error("driver error: {0}")]
    Driver(#[from] IoError),

    /// No driver registered under the requested name.
    #[error("driver not found: {0}")]
    DriverNotFound(String),

    /// One or more pins could not be read at startup.
    #[error("cannot read {} at startup", format_pins(.pins))]
    StartupReadFailed {
        /// Unreadable pins
        pins: Vec<PinId>,
    },

    /// An operation was requested in the wrong lifecycle phase.
    #[error("cannot {action} while {phase:?}")]
    InvalidPhase {
        /// Requested operation
        action: &'static str,
        /// Phase at the time of the request
        phase: RunPhase,
    },

    /// The interrupt handler could not be installed.
    #[error("failed to install signal handler: {0}")]
    SignalHandler(String),
}

impl SafeguardError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StartupReadFailed { .. } => EXIT_STARTUP_FAILURE,
            _ => EXIT_INTERNAL_ERROR,
        }
    }
}

fn format_pins(pins: &[PinId]) -> String {
    pins.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
