//! Configuration loading traits and types.
//!
//! This module provides the TOML configuration of the safeguard and the
//! generic loader used to read it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use pinguard_common::config::{ConfigError, SafeguardConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = SafeguardConfig::from_file(Path::new("pinguard.toml"))?;
//!     println!("Monitoring {} pins", config.pins.len());
//!     Ok(())
//! }
//! ```
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "info"
//! service_name = "doorpi-safeguard"
//!
//! [timing]
//! tick_interval_ms = 100
//! status_interval_s = 30
//!
//! [[pins]]
//! pin = 4
//! max_unsafe_s = 2.0
//! name = "door relay"
//! ```

use crate::consts::{
    DEFAULT_DRIVER, DEFAULT_MAX_RETRIES, DEFAULT_RASPI_GPIO_PATH, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_RULES, DEFAULT_SETTLE_DELAY_MS, DEFAULT_STATUS_INTERVAL_S, DEFAULT_TICK_INTERVAL_MS,
    DEFAULT_UNREADABLE_AFTER, MAX_PIN_ID, MIN_RULE_TO_TICK_RATIO,
};
use crate::level::{PinId, PinLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

fn default_service_name() -> String {
    "pinguard".to_string()
}

/// Common configuration fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Instance identifier, shown in the startup banner.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_status_interval_s() -> u64 {
    DEFAULT_STATUS_INTERVAL_S
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_unreadable_after() -> u32 {
    DEFAULT_UNREADABLE_AFTER
}

/// Loop cadence and correction retry parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Safety tick period.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Status report period.
    #[serde(default = "default_status_interval_s")]
    pub status_interval_s: u64,

    /// Wait between a corrective write and its read-back.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Wait between failed correction attempts.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Correction attempts per violation per tick.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Consecutive unknown reads before a pin is reported unreadable.
    #[serde(default = "default_unreadable_after")]
    pub unreadable_after: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            status_interval_s: DEFAULT_STATUS_INTERVAL_S,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            unreadable_after: DEFAULT_UNREADABLE_AFTER,
        }
    }
}

impl TimingConfig {
    /// Safety tick period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Status report period.
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_s)
    }

    /// Settle delay before verification.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Backoff between attempts.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// One monitored pin and its rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinRuleConfig {
    /// BCM pin number.
    pub pin: PinId,

    /// Maximum time the pin may stay at level 0, in seconds.
    pub max_unsafe_s: f64,

    /// Optional label used in log lines.
    #[serde(default)]
    pub name: Option<String>,
}

impl PinRuleConfig {
    /// Allowance as a `Duration`, or `None` if it is negative, NaN or too large.
    pub fn max_unsafe(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.max_unsafe_s).ok()
    }
}

fn default_pins() -> Vec<PinRuleConfig> {
    DEFAULT_RULES
        .iter()
        .map(|&(pin, max_unsafe_s)| PinRuleConfig {
            pin: PinId(pin),
            max_unsafe_s,
            name: None,
        })
        .collect()
}

fn default_driver_name() -> String {
    DEFAULT_DRIVER.to_string()
}

fn default_raspi_gpio_path() -> PathBuf {
    PathBuf::from(DEFAULT_RASPI_GPIO_PATH)
}

/// Driver selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    /// Registered driver name.
    #[serde(default = "default_driver_name")]
    pub name: String,

    /// Path of the `raspi-gpio` helper.
    #[serde(default = "default_raspi_gpio_path")]
    pub raspi_gpio_path: PathBuf,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: default_driver_name(),
            raspi_gpio_path: default_raspi_gpio_path(),
        }
    }
}

/// Scripted level change for the simulation driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationEvent {
    /// Pin to change.
    pub pin: PinId,
    /// Offset from driver init, in seconds.
    pub at_s: f64,
    /// New level. `unknown` makes the pin unreadable from then on.
    pub level: PinLevel,
}

impl SimulationEvent {
    /// Offset as a `Duration`, or `None` if it is negative, NaN or too large.
    pub fn offset(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.at_s).ok()
    }
}

/// Behaviour of the simulation driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Pins that start at level 0 (all others start at 1).
    #[serde(default)]
    pub initial_low: Vec<PinId>,

    /// Pins that accept writes without changing level.
    #[serde(default)]
    pub stuck: Vec<PinId>,

    /// Pins whose writes are rejected.
    #[serde(default)]
    pub reject_writes: Vec<PinId>,

    /// Pins that can never be read.
    #[serde(default)]
    pub unreadable: Vec<PinId>,

    /// Scripted level changes.
    #[serde(default)]
    pub events: Vec<SimulationEvent>,
}

/// Complete safeguard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafeguardConfig {
    /// Logging and identification.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Loop cadence and retry parameters.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Driver selection.
    #[serde(default)]
    pub driver: DriverConfig,

    /// Monitored pins. Defaults to the built-in rule table.
    #[serde(default = "default_pins")]
    pub pins: Vec<PinRuleConfig>,

    /// Simulation driver behaviour.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Default for SafeguardConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            timing: TimingConfig::default(),
            driver: DriverConfig::default(),
            pins: default_pins(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl SafeguardConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from {:?}", path);
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Validation Rules
    /// 1. At least one pin
    /// 2. Pin ids unique and <= `MAX_PIN_ID`
    /// 3. `max_unsafe_s` finite and > 0
    /// 4. `tick_interval_ms`, `status_interval_s`, `max_retries` > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.pins.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one pin must be monitored".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for rule in &self.pins {
            if rule.pin.number() > MAX_PIN_ID {
                return Err(ConfigError::ValidationError(format!(
                    "{} is outside the GPIO range 0..={MAX_PIN_ID}",
                    rule.pin
                )));
            }
            if !seen.insert(rule.pin) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate rule for {}",
                    rule.pin
                )));
            }
            if rule.max_unsafe().is_none_or(|d| d.is_zero()) {
                return Err(ConfigError::ValidationError(format!(
                    "{}: max_unsafe_s must be a positive number, got {}",
                    rule.pin, rule.max_unsafe_s
                )));
            }
        }

        if self.timing.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tick_interval_ms must be > 0".to_string(),
            ));
        }
        if self.timing.status_interval_s == 0 {
            return Err(ConfigError::ValidationError(
                "status_interval_s must be > 0".to_string(),
            ));
        }
        if self.timing.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "max_retries must be >= 1".to_string(),
            ));
        }

        for event in &self.simulation.events {
            if event.offset().is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "simulation event for {} has invalid offset {}",
                    event.pin, event.at_s
                )));
            }
        }

        Ok(())
    }

    /// Non-fatal timing problems.
    ///
    /// A rule tighter than `MIN_RULE_TO_TICK_RATIO` ticks is still accepted:
    /// such a pin is corrected on the first tick after it overruns.
    pub fn timing_warnings(&self) -> Vec<String> {
        let tick_s = self.timing.tick_interval().as_secs_f64();
        self.pins
            .iter()
            .filter(|rule| tick_s * f64::from(MIN_RULE_TO_TICK_RATIO) > rule.max_unsafe_s)
            .map(|rule| {
                format!(
                    "{}: rule of {}s is tighter than {} ticks of {}ms",
                    rule.pin, rule.max_unsafe_s, MIN_RULE_TO_TICK_RATIO, self.timing.tick_interval_ms
                )
            })
            .collect()
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
