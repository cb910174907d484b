//! Prelude module for common re-exports.
//!
//! ```rust
//! use pinguard_common::prelude::*;
//! ```

// ─── Pins ───────────────────────────────────────────────────────────
pub use crate::level::{DriveLevel, PinId, PinLevel, SAFE_LEVEL};

// ─── Driver boundary ────────────────────────────────────────────────
pub use crate::io::{DriverDiagnostics, IoError, PinDriver};

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, SafeguardConfig};
