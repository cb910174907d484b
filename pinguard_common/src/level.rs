//! Pin identifiers and logic levels.
//!
//! Reads produce a three-valued [`PinLevel`] so that a failed read can never be
//! confused with a safe one. Writes take a two-valued [`DriveLevel`]: there is
//! no way to ask a driver to drive a pin to "unknown".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a monitored GPIO line (BCM numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinId(pub u8);

impl PinId {
    /// Raw pin number.
    #[inline]
    pub const fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

impl From<u8> for PinId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// Level observed on a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinLevel {
    /// Logic 0. Unsafe / asserted.
    Low,
    /// Logic 1. Safe / default.
    High,
    /// The read failed or produced no recognisable level.
    #[default]
    Unknown,
}

impl PinLevel {
    /// Map a raw bit (0 or 1) to a level. Anything else is `Unknown`.
    pub const fn from_bit(bit: u8) -> Self {
        match bit {
            0 => Self::Low,
            1 => Self::High,
            _ => Self::Unknown,
        }
    }

    /// True only for an observed logic 1.
    #[inline]
    pub const fn is_safe(self) -> bool {
        matches!(self, Self::High)
    }

    /// True only for an observed logic 0.
    #[inline]
    pub const fn is_unsafe(self) -> bool {
        matches!(self, Self::Low)
    }

    /// True for `Low` and `High`.
    #[inline]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for PinLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("0"),
            Self::High => f.write_str("1"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Level a pin can be driven to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveLevel {
    /// Drive low (logic 0).
    Low,
    /// Drive high (logic 1).
    High,
}

impl DriveLevel {
    /// Raw bit value.
    pub const fn bit(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }
}

impl From<DriveLevel> for PinLevel {
    fn from(value: DriveLevel) -> Self {
        match value {
            DriveLevel::Low => PinLevel::Low,
            DriveLevel::High => PinLevel::High,
        }
    }
}

impl PartialEq<DriveLevel> for PinLevel {
    fn eq(&self, other: &DriveLevel) -> bool {
        *self == PinLevel::from(*other)
    }
}

impl fmt::Display for DriveLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bit())
    }
}

/// Level every monitored pin must return to.
pub const SAFE_LEVEL: DriveLevel = DriveLevel::High;
