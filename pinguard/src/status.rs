//! Status line formatting.
//!
//! Read-only view of the corrector: one line with every pin and the lifetime
//! counters, e.g.
//!
//! ```text
//! GPIO2=1 | GPIO3=1 | GPIO4=0(1.3s/2.0s) | GPIO10=unknown(UNREADABLE x12) | Violations: 1 | Corrections: 1
//! ```

use std::fmt::Write;
use std::time::Instant;

use crate::corrector::Corrector;
use crate::rules::SafetyRule;
use crate::tracker::PinState;

/// Status of one pin.
pub fn pin_status(rule: &SafetyRule, state: &PinState, unreadable_after: u32, now: Instant) -> String {
    let mut out = format!("{}={}", rule.pin, state.last_level());

    let unsafe_for = state
        .elapsed_unsafe(now)
        .filter(|_| state.last_level().is_unsafe());
    if let Some(elapsed) = unsafe_for {
        let _ = write!(
            out,
            "({:.1}s/{:.1}s{})",
            elapsed.as_secs_f64(),
            rule.max_unsafe.as_secs_f64(),
            if state.overrun_reported() {
                " VIOLATION"
            } else {
                ""
            }
        );
    }

    if state.read_failures() >= unreadable_after {
        let _ = write!(out, "(UNREADABLE x{})", state.read_failures());
    }
    out
}

/// Full status line.
pub fn status_line(corrector: &Corrector, now: Instant) -> String {
    let mut parts: Vec<String> = corrector
        .rules()
        .iter()
        .filter_map(|rule| {
            corrector
                .state(rule.pin)
                .map(|state| pin_status(rule, state, corrector.unreadable_after(), now))
        })
        .collect();

    let stats = corrector.stats();
    parts.push(format!("Violations: {}", stats.violations_detected));
    parts.push(format!("Corrections: {}", stats.corrections_succeeded));
    parts.join(" | ")
}
