//! Safety rule table.
//!
//! Static mapping from pin to the longest time it may stay at level 0. The set
//! of monitored pins is fixed when the table is built.

use pinguard_common::config::{ConfigError, PinRuleConfig};
use pinguard_common::level::PinId;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Rule for one monitored pin.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyRule {
    /// Monitored pin.
    pub pin: PinId,
    /// Longest allowed time at level 0.
    pub max_unsafe: Duration,
    /// Optional label.
    pub name: Option<String>,
}

impl SafetyRule {
    /// Rule allowing `max_unsafe` at level 0.
    pub fn new(pin: PinId, max_unsafe: Duration) -> Self {
        Self {
            pin,
            max_unsafe,
            name: None,
        }
    }

    /// Build a rule from whole or fractional seconds.
    ///
    /// Negative and NaN values clamp to zero, values too large for a
    /// `Duration` to `Duration::MAX`.
    pub fn from_secs(pin: PinId, max_unsafe_s: f64) -> Self {
        let max_unsafe = if max_unsafe_s.is_nan() || max_unsafe_s <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(max_unsafe_s).unwrap_or(Duration::MAX)
        };
        Self::new(pin, max_unsafe)
    }

    /// True once `elapsed` strictly exceeds the allowance.
    #[inline]
    pub fn is_exceeded_by(&self, elapsed: Duration) -> bool {
        elapsed > self.max_unsafe
    }
}

impl TryFrom<&PinRuleConfig> for SafetyRule {
    type Error = ConfigError;

    fn try_from(config: &PinRuleConfig) -> Result<Self, Self::Error> {
        let max_unsafe = config.max_unsafe().ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "{}: max_unsafe_s {} is not a representable duration",
                config.pin, config.max_unsafe_s
            ))
        })?;
        Ok(Self {
            pin: config.pin,
            max_unsafe,
            name: config.name.clone(),
        })
    }
}

impl fmt::Display for SafetyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: max {:.1}s", self.pin, self.max_unsafe.as_secs_f64())?;
        if let Some(name) = &self.name {
            write!(f, " ({name})")?;
        }
        Ok(())
    }
}

/// Immutable, pin-ordered rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: BTreeMap<PinId, SafetyRule>,
}

impl RuleTable {
    /// Build a table. A later rule for the same pin replaces an earlier one;
    /// configuration validation rejects duplicates before this point.
    pub fn new(rules: impl IntoIterator<Item = SafetyRule>) -> Self {
        Self {
            rules: rules.into_iter().map(|r| (r.pin, r)).collect(),
        }
    }

    /// Build from configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` for an allowance that does not
    /// fit in a `Duration`.
    pub fn from_config(pins: &[PinRuleConfig]) -> Result<Self, ConfigError> {
        let rules = pins
            .iter()
            .map(SafetyRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Monitored pins in ascending order.
    pub fn pins(&self) -> impl Iterator<Item = PinId> + '_ {
        self.rules.keys().copied()
    }

    /// Rules in ascending pin order.
    pub fn iter(&self) -> impl Iterator<Item = &SafetyRule> {
        self.rules.values()
    }

    /// Tightest allowance in the table.
    pub fn tightest(&self) -> Option<Duration> {
        self.rules.values().map(|r| r.max_unsafe).min()
    }
}
