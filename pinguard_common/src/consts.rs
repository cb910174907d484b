//! System-wide constants for the pinguard workspace.
//!
//! Single source of truth for default cadences, retry limits and paths.

use static_assertions::const_assert;

/// Default safety tick period in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Default status report period in seconds.
pub const DEFAULT_STATUS_INTERVAL_S: u64 = 30;

/// Delay between a corrective write and its verification read.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 10;

/// Delay between two failed correction attempts.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 50;

/// Correction attempts per violation per tick.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Consecutive failed reads after which a pin is reported as unreadable.
pub const DEFAULT_UNREADABLE_AFTER: u32 = 10;

/// Highest BCM GPIO number accepted in configuration.
pub const MAX_PIN_ID: u8 = 53;

/// Minimum ratio between the tightest rule and the tick period.
pub const MIN_RULE_TO_TICK_RATIO: u32 = 10;

/// Built-in rule table: (pin, max seconds at level 0).
pub const DEFAULT_RULES: [(u8, f64); 4] = [(2, 25.0), (3, 20.0), (4, 2.0), (10, 4.0)];

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pinguard/pinguard.toml";

/// Default helper used by the raspi-gpio driver.
pub const DEFAULT_RASPI_GPIO_PATH: &str = "raspi-gpio";

/// Default driver name.
pub const DEFAULT_DRIVER: &str = "raspi-gpio";

const_assert!(DEFAULT_MAX_RETRIES >= 1);
const_assert!(DEFAULT_TICK_INTERVAL_MS > 0);
const_assert!(DEFAULT_SETTLE_DELAY_MS < DEFAULT_TICK_INTERVAL_MS);
