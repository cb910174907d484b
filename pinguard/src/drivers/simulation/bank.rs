//! Simulated pin bank.
//!
//! The `SimPinBank` holds:
//! - The level of every simulated pin
//! - Fault injection: stuck pins, rejected writes, unreadable pins
//! - Scripted level changes applied once their time has arrived
//! - A bounded log of accepted writes
//!
//! The bank is a cheap handle over shared state so a test can keep one clone
//! while the driver owns another.

use pinguard_common::io::{DriverDiagnostics, IoError};
use pinguard_common::level::{DriveLevel, PinId, PinLevel};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, trace};

/// Maximum number of writes kept in the log.
const WRITE_LOG_CAPACITY: usize = 1024;

/// Scripted level change waiting for its time.
#[derive(Debug, Clone)]
struct PendingChange {
    /// When this change should be applied
    due: Instant,
    /// Pin to change
    pin: PinId,
    /// New level (`Unknown` makes the pin unreadable)
    level: PinLevel,
}

/// Per-pin simulation state.
#[derive(Debug, Clone)]
struct SimPin {
    level: PinLevel,
    stuck: bool,
    unreadable: bool,
    reject_all: bool,
    reject_next: u32,
}

impl SimPin {
    fn new(level: PinLevel) -> Self {
        Self {
            level,
            stuck: false,
            unreadable: false,
            reject_all: false,
            reject_next: 0,
        }
    }
}

#[derive(Debug, Default)]
struct BankInner {
    pins: BTreeMap<PinId, SimPin>,
    pending: VecDeque<PendingChange>,
    writes: VecDeque<(PinId, DriveLevel)>,
    diagnostics: DriverDiagnostics,
}

/// Shared handle to a simulated pin bank.
#[derive(Debug, Clone, Default)]
pub struct SimPinBank {
    inner: Arc<Mutex<BankInner>>,
}

impl SimPinBank {
    /// Bank with `pins` at level 1.
    pub fn new(pins: impl IntoIterator<Item = PinId>) -> Self {
        let bank = Self::default();
        for pin in pins {
            bank.add_pin(pin, PinLevel::High);
        }
        bank
    }

    fn lock(&self) -> MutexGuard<'_, BankInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `pin` if absent. Existing pins keep their state.
    pub fn add_pin(&self, pin: PinId, level: PinLevel) {
        self.lock()
            .pins
            .entry(pin)
            .or_insert_with(|| SimPin::new(level));
    }

    /// True if `pin` is simulated.
    pub fn contains(&self, pin: PinId) -> bool {
        self.lock().pins.contains_key(&pin)
    }

    /// Force the physical level of `pin`.
    pub fn set_level(&self, pin: PinId, level: PinLevel) {
        let mut inner = self.lock();
        let sim = inner
            .pins
            .entry(pin)
            .or_insert_with(|| SimPin::new(level));
        sim.level = level;
    }

    /// Physical level of `pin`, ignoring read faults.
    pub fn level(&self, pin: PinId) -> PinLevel {
        self.lock()
            .pins
            .get(&pin)
            .map_or(PinLevel::Unknown, |sim| sim.level)
    }

    /// Accept writes to `pin` without changing its level.
    pub fn set_stuck(&self, pin: PinId, stuck: bool) {
        if let Some(sim) = self.lock().pins.get_mut(&pin) {
            sim.stuck = stuck;
        }
    }

    /// Make every read of `pin` fail.
    pub fn set_unreadable(&self, pin: PinId, unreadable: bool) {
        if let Some(sim) = self.lock().pins.get_mut(&pin) {
            sim.unreadable = unreadable;
        }
    }

    /// Reject every write to `pin`.
    pub fn set_reject_writes(&self, pin: PinId, reject: bool) {
        if let Some(sim) = self.lock().pins.get_mut(&pin) {
            sim.reject_all = reject;
        }
    }

    /// Reject the next `count` writes to `pin`.
    pub fn reject_next_writes(&self, pin: PinId, count: u32) {
        if let Some(sim) = self.lock().pins.get_mut(&pin) {
            sim.reject_next = count;
        }
    }

    /// Queue a level change for `due`.
    pub fn schedule(&self, due: Instant, pin: PinId, level: PinLevel) {
        let mut inner = self.lock();
        let idx = inner.pending.partition_point(|p| p.due <= due);
        inner.pending.insert(idx, PendingChange { due, pin, level });
    }

    /// Number of scripted changes not yet applied.
    pub fn pending_changes(&self) -> usize {
        self.lock().pending.len()
    }

    /// Accepted writes, oldest first.
    pub fn writes(&self) -> Vec<(PinId, DriveLevel)> {
        self.lock().writes.iter().copied().collect()
    }

    /// Driver counters.
    pub fn diagnostics(&self) -> DriverDiagnostics {
        self.lock().diagnostics.clone()
    }

    /// Apply every scripted change due at or before `now`.
    pub fn apply_due(&self, now: Instant) {
        let mut inner = self.lock();
        while inner.pending.front().is_some_and(|p| p.due <= now) {
            let Some(change) = inner.pending.pop_front() else {
                break;
            };
            if let Some(sim) = inner.pins.get_mut(&change.pin) {
                match change.level {
                    PinLevel::Unknown => sim.unreadable = true,
                    level => {
                        sim.unreadable = false;
                        sim.level = level;
                    }
                }
                debug!("Simulated {} -> {}", change.pin, change.level);
            }
        }
    }

    /// Read `pin` honouring read faults.
    pub(crate) fn read(&self, pin: PinId) -> PinLevel {
        let mut inner = self.lock();
        inner.diagnostics.reads += 1;
        let level = match inner.pins.get(&pin) {
            Some(sim) if !sim.unreadable => sim.level,
            _ => PinLevel::Unknown,
        };
        if level == PinLevel::Unknown {
            inner.diagnostics.read_failures += 1;
        }
        trace!("read {} = {}", pin, level);
        level
    }

    /// Write `pin` honouring write faults.
    pub(crate) fn write(&self, pin: PinId, level: DriveLevel) -> Result<(), IoError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.diagnostics.writes += 1;

        let Some(sim) = inner.pins.get_mut(&pin) else {
            inner.diagnostics.write_failures += 1;
            return Err(IoError::UnknownPin(pin));
        };

        if sim.reject_all || sim.reject_next > 0 {
            sim.reject_next = sim.reject_next.saturating_sub(1);
            inner.diagnostics.write_failures += 1;
            return Err(IoError::WriteRejected {
                pin,
                reason: "simulated write fault".to_string(),
            });
        }

        if !sim.stuck {
            sim.level = level.into();
        }

        if inner.writes.len() == WRITE_LOG_CAPACITY {
            inner.writes.pop_front();
        }
        inner.writes.push_back((pin, level));
        trace!("write {} = {}", pin, level);
        Ok(())
    }
}
