//! # Pinguard Library
//!
//! GPIO safety watchdog. Every monitored pin has a maximum time it may stay at
//! level 0; once exceeded, the pin is driven back to 1 and the write is
//! verified by reading the pin back.
//!
//! # Module Structure
//!
//! - [`core`] - Safeguard struct, run loop management
//! - [`rules`] - Per-pin maximum unsafe durations
//! - [`tracker`] - Per-pin level and unsafe timer
//! - [`corrector`] - Violation detection and verified correction
//! - [`initializer`] - Startup access check and safe-state pass
//! - [`status`] - Status line formatting
//! - [`drivers`] - Pin driver implementations and driver selection
//! - [`error`] - Fatal errors and exit codes
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          pinguard                                 │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐   │
//! │  │  RuleTable  │───►│  Safeguard   │◄───│  DriverKind         │   │
//! │  │             │    │  (tick loop) │    │                     │   │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘   │
//! │                            │                                      │
//! │                            ▼                                      │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐   │
//! │  │  PinState   │◄───│  Corrector   │───►│  PinDriver          │   │
//! │  │  (per pin)  │    │              │    │  (trait object)     │   │
//! │  └─────────────┘    └──────────────┘    └─────────────────────┘   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod core;
pub mod corrector;
pub mod drivers;
pub mod error;
pub mod initializer;
pub mod rules;
pub mod status;
pub mod tracker;

// Re-export key types for convenience
pub use crate::core::{RunPhase, Safeguard};
pub use crate::corrector::{CorrectionOutcome, Corrector, Mode, RetryPolicy, RunStatistics};
pub use crate::drivers::DriverKind;
pub use crate::error::SafeguardError;
pub use crate::rules::{RuleTable, SafetyRule};
