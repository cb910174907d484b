//! Startup pass.
//!
//! Reads every monitored pin once. An unreadable pin aborts startup. In live
//! mode every pin not at 1 is driven there with the same verified write used
//! for violations; in dry-run mode the observed levels only seed the tracker.

use pinguard_common::io::PinDriver;
use pinguard_common::level::{PinId, PinLevel, SAFE_LEVEL};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::corrector::{CorrectionOutcome, Corrector, Mode, drive_verified};
use crate::error::SafeguardError;

/// What the startup pass did for one pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// Pin already read 1.
    AlreadySafe,
    /// Pin was driven towards 1.
    Forced(CorrectionOutcome),
    /// Dry-run: level recorded, nothing driven.
    Observed(PinLevel),
}

/// Result of the startup pass, in pin order.
#[derive(Debug, Clone, Default)]
pub struct InitReport {
    /// Per-pin outcome.
    pub outcomes: Vec<(PinId, InitOutcome)>,
}

impl InitReport {
    /// Pins left at 0 because forcing them failed.
    pub fn unresolved(&self) -> Vec<PinId> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| {
                matches!(outcome, InitOutcome::Forced(o) if !o.is_success())
            })
            .map(|(pin, _)| *pin)
            .collect()
    }
}

/// Read every pin and fail if any cannot be read.
pub fn check_access(
    corrector: &Corrector,
    driver: &mut dyn PinDriver,
) -> Result<Vec<(PinId, PinLevel)>, SafeguardError> {
    let levels: Vec<(PinId, PinLevel)> = corrector
        .rules()
        .pins()
        .map(|pin| (pin, driver.read_level(pin)))
        .collect();

    let unreadable: Vec<PinId> = levels
        .iter()
        .filter(|(_, level)| !level.is_known())
        .map(|(pin, _)| *pin)
        .collect();

    if unreadable.is_empty() {
        return Ok(levels);
    }
    for pin in &unreadable {
        error!(pin = pin.number(), "❌ Cannot access {}", pin);
    }
    error!("❌ GPIO access failed. Check permissions and hardware.");
    Err(SafeguardError::StartupReadFailed { pins: unreadable })
}

/// Seed every pin state, forcing pins to 1 in live mode.
pub fn initialize(
    corrector: &mut Corrector,
    driver: &mut dyn PinDriver,
    now: Instant,
) -> Result<InitReport, SafeguardError> {
    let levels = check_access(corrector, driver)?;
    let mut report = InitReport::default();

    if corrector.mode() == Mode::DryRun {
        for (pin, level) in levels {
            info!(pin = pin.number(), "📊 {} current state: {}", pin, level);
            corrector.seed(pin, level, now);
            report.outcomes.push((pin, InitOutcome::Observed(level)));
        }
        return Ok(report);
    }

    info!("🔄 Initializing GPIOs to safe state...");
    let policy = *corrector.policy();
    for (pin, level) in levels {
        if level.is_safe() {
            info!(pin = pin.number(), "✅ {} already in safe state ({})", pin, SAFE_LEVEL);
            corrector.seed(pin, level, now);
            report.outcomes.push((pin, InitOutcome::AlreadySafe));
            continue;
        }

        warn!(
            pin = pin.number(),
            "⚠️  {} is not in safe state (currently {})", pin, level
        );
        let outcome = drive_verified(driver, pin, SAFE_LEVEL, &policy, Mode::Live);
        if outcome.is_success() {
            info!(pin = pin.number(), "✅ {} initialized to safe state ({})", pin, SAFE_LEVEL);
            corrector.seed(pin, PinLevel::High, now);
        } else {
            error!(
                pin = pin.number(),
                "❌ Failed to initialize {} - tracking it as unsafe", pin
            );
            corrector.seed(pin, level, now);
        }
        report.outcomes.push((pin, InitOutcome::Forced(outcome)));
    }

    Ok(report)
}
