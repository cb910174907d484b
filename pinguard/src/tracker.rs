//! Pin state tracking.
//!
//! One [`PinState`] per monitored pin. The state only moves on a *known*
//! observation or on a verified correction; an unknown read bumps the failure
//! streak and nothing else.
//!
//! Invariant: `unsafe_since` is `Some` exactly when `last_level` is `Low`.

use pinguard_common::level::{PinId, PinLevel};
use std::time::{Duration, Instant};

/// One sample of one pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinObservation {
    /// Sampled pin.
    pub pin: PinId,
    /// Level read.
    pub level: PinLevel,
    /// When the read completed.
    pub at: Instant,
}

/// Change reported by [`PinState::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The pin went to 0.
    EnteredUnsafe {
        /// Previous level.
        from: PinLevel,
    },
    /// The pin went to 1.
    ReturnedSafe {
        /// Previous level.
        from: PinLevel,
        /// Time spent at 0, if the pin was tracked as unsafe.
        unsafe_for: Option<Duration>,
    },
    /// The read failed. Tracked level is unchanged.
    UnknownRead {
        /// Length of the current failure streak.
        consecutive: u32,
    },
}

/// Tracked state of one pin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinState {
    last_level: PinLevel,
    unsafe_since: Option<Instant>,
    read_failures: u32,
    overrun_reported: bool,
}

impl PinState {
    /// State for a pin whose level is not yet known.
    pub fn new() -> Self {
        Self::default()
    }

    /// State seeded from a startup observation.
    pub fn seeded(level: PinLevel, at: Instant) -> Self {
        let mut state = Self::new();
        match level {
            PinLevel::Low => {
                state.last_level = PinLevel::Low;
                state.unsafe_since = Some(at);
            }
            PinLevel::High => state.last_level = PinLevel::High,
            PinLevel::Unknown => state.read_failures = 1,
        }
        state
    }

    /// Last known level.
    #[inline]
    pub fn last_level(&self) -> PinLevel {
        self.last_level
    }

    /// When the pin entered level 0, while it is still there.
    #[inline]
    pub fn unsafe_since(&self) -> Option<Instant> {
        self.unsafe_since
    }

    /// Length of the current unknown-read streak.
    #[inline]
    pub fn read_failures(&self) -> u32 {
        self.read_failures
    }

    /// Whether the current overrun window was already counted.
    #[inline]
    pub fn overrun_reported(&self) -> bool {
        self.overrun_reported
    }

    /// Mark the current overrun window as counted.
    pub(crate) fn mark_overrun_reported(&mut self) {
        self.overrun_reported = true;
    }

    /// Time spent at 0 as of `now`.
    pub fn elapsed_unsafe(&self, now: Instant) -> Option<Duration> {
        self.unsafe_since
            .map(|since| now.saturating_duration_since(since))
    }

    /// Apply an observation.
    pub fn observe(&mut self, observation: &PinObservation) -> Option<Transition> {
        let level = observation.level;
        if !level.is_known() {
            self.read_failures = self.read_failures.saturating_add(1);
            return Some(Transition::UnknownRead {
                consecutive: self.read_failures,
            });
        }

        self.read_failures = 0;
        if level == self.last_level {
            return None;
        }

        let from = self.last_level;
        self.last_level = level;
        match level {
            PinLevel::Low => {
                self.unsafe_since = Some(observation.at);
                self.overrun_reported = false;
                Some(Transition::EnteredUnsafe { from })
            }
            _ => {
                let unsafe_for = self.clear_unsafe(observation.at);
                Some(Transition::ReturnedSafe { from, unsafe_for })
            }
        }
    }

    /// Record a verified (or simulated) correction to 1.
    ///
    /// Returns how long the pin had been at 0.
    pub fn force_safe(&mut self, at: Instant) -> Option<Duration> {
        self.last_level = PinLevel::High;
        self.clear_unsafe(at)
    }

    fn clear_unsafe(&mut self, at: Instant) -> Option<Duration> {
        self.overrun_reported = false;
        self.unsafe_since
            .take()
            .map(|since| at.saturating_duration_since(since))
    }
}
