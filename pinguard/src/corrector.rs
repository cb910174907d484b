//! Violation detection and verified correction.
//!
//! The [`Corrector`] owns every [`PinState`] and the run counters. Each call to
//! [`Corrector::tick`] samples all monitored pins once, updates their state,
//! and drives overrunning pins back to the safe level.
//!
//! # Correction
//!
//! ```text
//! attempt 1..=max_attempts:
//!     write(pin, 1) ── rejected ─────────┐
//!     sleep(settle)                      │
//!     read(pin) ── 1 ──────► Verified    │
//!               └─ 0 / unknown ──────────┤
//!                                        ▼
//!                           backoff, next attempt (or Failed)
//! ```
//!
//! A failed correction leaves the pin flagged: it is retried on every later
//! tick until a read shows it at 1.

use pinguard_common::config::TimingConfig;
use pinguard_common::io::{IoError, PinDriver};
use pinguard_common::level::{DriveLevel, PinId, PinLevel, SAFE_LEVEL};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::rules::{RuleTable, SafetyRule};
use crate::tracker::{PinObservation, PinState, Transition};

/// Whether corrections touch the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Writes are issued and verified.
    Live,
    /// Writes are logged and assumed to succeed.
    DryRun,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("ACTIVE MODE"),
            Self::DryRun => f.write_str("DRY-RUN MODE"),
        }
    }
}

/// Bounded retry parameters for a verified write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per correction.
    pub max_attempts: u32,
    /// Wait between write and read-back.
    pub settle_delay: Duration,
    /// Wait after a failed attempt.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Policy from the `[timing]` table.
    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self {
            max_attempts: timing.max_retries.max(1),
            settle_delay: timing.settle_delay(),
            backoff: timing.retry_backoff(),
        }
    }

    /// Policy without delays.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            settle_delay: Duration::ZERO,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_timing(&TimingConfig::default())
    }
}

/// Why a single attempt did not verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The driver refused the write.
    WriteRejected(IoError),
    /// The read-back failed.
    ReadBackUnknown,
    /// The read-back returned the wrong level.
    ReadBackMismatch(PinLevel),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteRejected(e) => write!(f, "write failed: {e}"),
            Self::ReadBackUnknown => f.write_str("could not verify (read failed)"),
            Self::ReadBackMismatch(level) => write!(f, "read back {level}"),
        }
    }
}

/// Result of a verified write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectionOutcome {
    /// Read-back matched.
    Verified {
        /// Attempt that verified (1-based).
        attempts: u32,
    },
    /// Dry-run: nothing was written.
    Simulated,
    /// Every attempt failed.
    Failed {
        /// Attempts made.
        attempts: u32,
        /// Failure of the last attempt.
        last: AttemptFailure,
    },
}

impl CorrectionOutcome {
    /// Verified or simulated.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Drive `pin` to `level` and confirm it by reading back.
///
/// In dry-run mode the driver is not touched and the outcome is
/// [`CorrectionOutcome::Simulated`]. An unknown read-back counts as a failed
/// attempt.
pub fn drive_verified(
    driver: &mut dyn PinDriver,
    pin: PinId,
    level: DriveLevel,
    policy: &RetryPolicy,
    mode: Mode,
) -> CorrectionOutcome {
    if mode == Mode::DryRun {
        info!(pin = pin.number(), "🔧 DRY-RUN: Would set {} to {}", pin, level);
        return CorrectionOutcome::Simulated;
    }

    let max_attempts = policy.max_attempts.max(1);
    let mut last = AttemptFailure::ReadBackUnknown;

    for attempt in 1..=max_attempts {
        let failure = match driver.write_level(pin, level) {
            Err(e) => AttemptFailure::WriteRejected(e),
            Ok(()) => {
                pause(policy.settle_delay);
                match driver.read_level(pin) {
                    actual if actual == level => {
                        if attempt > 1 {
                            info!(
                                pin = pin.number(),
                                attempt,
                                "🔧 CORRECTED: Set {} to {} (verified on attempt {})",
                                pin,
                                level,
                                attempt
                            );
                        } else {
                            info!(pin = pin.number(), "🔧 CORRECTED: Set {} to {} (verified)", pin, level);
                        }
                        return CorrectionOutcome::Verified { attempts: attempt };
                    }
                    PinLevel::Unknown => AttemptFailure::ReadBackUnknown,
                    actual => AttemptFailure::ReadBackMismatch(actual),
                }
            }
        };

        warn!(
            pin = pin.number(),
            attempt,
            "⚠️  Set {} to {} - {} (attempt {}/{})",
            pin,
            level,
            failure,
            attempt,
            max_attempts
        );
        last = failure;

        if attempt < max_attempts {
            pause(policy.backoff);
        }
    }

    CorrectionOutcome::Failed {
        attempts: max_attempts,
        last,
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

/// One detected overrun and what was done about it.
#[derive(Debug, Clone)]
pub struct ViolationEvent {
    /// Offending pin.
    pub pin: PinId,
    /// Time spent at 0 when detected.
    pub elapsed: Duration,
    /// Configured maximum.
    pub max_allowed: Duration,
    /// False for the tick that opened the overrun window.
    pub repeated: bool,
    /// Result of the correction.
    pub outcome: CorrectionOutcome,
}

/// Process-lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Overrun windows detected.
    pub violations_detected: u64,
    /// Corrections verified (or simulated in dry-run).
    pub corrections_succeeded: u64,
    /// Correction sequences that exhausted their attempts.
    pub corrections_failed: u64,
}

/// Summary of one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Pins read this tick.
    pub pins_read: usize,
    /// Reads that returned unknown.
    pub unknown_reads: usize,
    /// Overruns handled this tick.
    pub violations: Vec<ViolationEvent>,
    /// A status line was logged after this tick.
    pub status_reported: bool,
}

/// Owner of all per-pin state.
#[derive(Debug)]
pub struct Corrector {
    rules: RuleTable,
    states: BTreeMap<PinId, PinState>,
    stats: RunStatistics,
    policy: RetryPolicy,
    mode: Mode,
    unreadable_after: u32,
}

impl Corrector {
    /// Create a corrector with every monitored pin in the unknown state.
    pub fn new(rules: RuleTable, policy: RetryPolicy, mode: Mode, unreadable_after: u32) -> Self {
        let states = rules.pins().map(|pin| (pin, PinState::new())).collect();
        Self {
            rules,
            states,
            stats: RunStatistics::default(),
            policy,
            mode,
            unreadable_after: unreadable_after.max(1),
        }
    }

    /// Rule table.
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Operating mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Counters.
    pub fn stats(&self) -> RunStatistics {
        self.stats
    }

    /// Failure streak at which a pin counts as unreadable.
    pub fn unreadable_after(&self) -> u32 {
        self.unreadable_after
    }

    /// State of `pin`, if monitored.
    pub fn state(&self, pin: PinId) -> Option<&PinState> {
        self.states.get(&pin)
    }

    /// All states in pin order.
    pub fn states(&self) -> impl Iterator<Item = (PinId, &PinState)> {
        self.states.iter().map(|(pin, state)| (*pin, state))
    }

    /// Replace the state of `pin` with one seeded from `level`.
    ///
    /// Unmonitored pins are ignored.
    pub fn seed(&mut self, pin: PinId, level: PinLevel, at: Instant) {
        if let Some(state) = self.states.get_mut(&pin) {
            *state = PinState::seeded(level, at);
        }
    }

    /// Sample every pin once and correct overruns.
    pub fn tick(&mut self, driver: &mut dyn PinDriver, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        let Self {
            rules,
            states,
            stats,
            policy,
            mode,
            unreadable_after,
        } = self;

        for rule in rules.iter() {
            let Some(state) = states.get_mut(&rule.pin) else {
                continue;
            };

            let observation = PinObservation {
                pin: rule.pin,
                level: driver.read_level(rule.pin),
                at: now,
            };
            report.pins_read += 1;

            let prior_failures = state.read_failures();
            if let Some(transition) = state.observe(&observation) {
                log_transition(rule, state, transition, *unreadable_after);
            }

            if !observation.level.is_known() {
                report.unknown_reads += 1;
                continue;
            }
            if prior_failures >= *unreadable_after {
                info!(
                    pin = rule.pin.number(),
                    "✅ {} readable again after {} failed reads", rule.pin, prior_failures
                );
            }

            let Some(elapsed) = state.elapsed_unsafe(now) else {
                continue;
            };
            if !rule.is_exceeded_by(elapsed) {
                continue;
            }

            let event = correct_overrun(driver, rule, state, stats, policy, *mode, elapsed, now);
            report.violations.push(event);
        }

        report
    }
}

#[allow(clippy::too_many_arguments)]
fn correct_overrun(
    driver: &mut dyn PinDriver,
    rule: &SafetyRule,
    state: &mut PinState,
    stats: &mut RunStatistics,
    policy: &RetryPolicy,
    mode: Mode,
    elapsed: Duration,
    now: Instant,
) -> ViolationEvent {
    let pin = rule.pin;
    let repeated = state.overrun_reported();
    let elapsed_s = elapsed.as_secs_f64();
    let max_s = rule.max_unsafe.as_secs_f64();

    if repeated {
        warn!(
            pin = pin.number(),
            elapsed_ms = elapsed.as_millis() as u64,
            max_ms = rule.max_unsafe.as_millis() as u64,
            "🚨 UNRESOLVED VIOLATION: {} still at 0 for {:.3}s (max {:.1}s) - retrying correction",
            pin,
            elapsed_s,
            max_s
        );
    } else {
        stats.violations_detected += 1;
        state.mark_overrun_reported();
        warn!(
            pin = pin.number(),
            elapsed_ms = elapsed.as_millis() as u64,
            max_ms = rule.max_unsafe.as_millis() as u64,
            "🚨 SAFETY VIOLATION: {} at 0 for {:.3}s (max {:.1}s) - FORCING TO SAFE STATE",
            pin,
            elapsed_s,
            max_s
        );
    }

    let outcome = drive_verified(driver, pin, SAFE_LEVEL, policy, mode);
    match &outcome {
        CorrectionOutcome::Failed { attempts, last } => {
            stats.corrections_failed += 1;
            error!(
                pin = pin.number(),
                attempts = *attempts,
                "❌ CRITICAL: Failed to correct {} after {} attempts ({}) - manual intervention may be required!",
                pin,
                attempts,
                last
            );
        }
        _ => {
            state.force_safe(now);
            stats.corrections_succeeded += 1;
            warn!(
                pin = pin.number(),
                "🛡️  SAFETY: {} forced to safe state ({}) - {}",
                pin,
                SAFE_LEVEL,
                if mode == Mode::DryRun {
                    "simulated"
                } else {
                    "correction verified"
                }
            );
        }
    }

    ViolationEvent {
        pin,
        elapsed,
        max_allowed: rule.max_unsafe,
        repeated,
        outcome,
    }
}

fn log_transition(rule: &SafetyRule, state: &PinState, transition: Transition, unreadable_after: u32) {
    let pin = rule.pin;
    match transition {
        Transition::EnteredUnsafe { from } => {
            info!(pin = pin.number(), "📊 {}: {} -> 0", pin, from);
            info!(
                pin = pin.number(),
                "⏱️  {} timer started (max {:.1}s allowed)",
                pin,
                rule.max_unsafe.as_secs_f64()
            );
        }
        Transition::ReturnedSafe { from, unsafe_for } => {
            info!(pin = pin.number(), "📊 {}: {} -> 1", pin, from);
            if let Some(held) = unsafe_for {
                info!(
                    pin = pin.number(),
                    "✅ {} returned to safe state after {:.3}s",
                    pin,
                    held.as_secs_f64()
                );
            }
        }
        Transition::UnknownRead { consecutive } => {
            if consecutive == 1 {
                warn!(
                    pin = pin.number(),
                    "⚠️  Failed to read {} (tracked level {} kept)",
                    pin,
                    state.last_level()
                );
            } else if consecutive == unreadable_after {
                error!(
                    pin = pin.number(),
                    "❌ {} UNREADABLE: {} consecutive failed reads", pin, consecutive
                );
            } else {
                debug!(pin = pin.number(), consecutive, "Read of {} failed again", pin);
            }
        }
    }
}
