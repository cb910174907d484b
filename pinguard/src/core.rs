//! Safeguard struct and run loop management.
//!
//! The `Safeguard` struct is the main entry point. It owns the driver and the
//! [`Corrector`], runs the startup pass, and drives the fixed-period safety
//! tick with an independent, slower status report.
//!
//! ```text
//! Uninitialized ──init()──► Initializing ──ok──► Running ──stop flag──► Stopped
//!                                 │                                      ▲
//!                                 └──────────── startup failure ─────────┘
//! ```

use pinguard_common::config::SafeguardConfig;
use pinguard_common::io::{DriverDiagnostics, PinDriver};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::corrector::{Corrector, Mode, RetryPolicy, RunStatistics, TickReport};
use crate::drivers::DriverKind;
use crate::error::SafeguardError;
use crate::initializer::{InitReport, initialize};
use crate::rules::RuleTable;
use crate::status::status_line;

/// Lifecycle phase of the safeguard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Created, driver not yet loaded.
    Uninitialized,
    /// Startup pass in progress.
    Initializing,
    /// Safety loop active.
    Running,
    /// Terminal.
    Stopped,
}

/// Timing statistics for loop monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Number of ticks executed
    pub tick_count: u64,
    /// Ticks that took longer than the tick period
    pub overruns: u64,
    /// Longest observed tick
    pub max_tick_us: u64,
    /// Sum of tick durations for average calculation
    pub total_tick_us: u64,
}

/// Safeguard manages the driver and the safety loop.
pub struct Safeguard {
    /// Validated configuration
    config: SafeguardConfig,
    /// Owner of all pin state
    corrector: Corrector,
    /// Active driver instance
    driver: Option<Box<dyn PinDriver>>,
    /// Cleared to request a stop at the next tick boundary
    running: Arc<AtomicBool>,
    /// Lifecycle phase
    phase: RunPhase,
    /// Safety tick period
    tick_interval: Duration,
    /// Status report period
    status_interval: Duration,
    /// Last status report
    last_status: Option<Instant>,
    /// Timing statistics
    stats: TickStats,
}

impl Safeguard {
    /// Create a new Safeguard with the given configuration.
    ///
    /// # Errors
    /// Returns error if configuration validation fails.
    pub fn new(config: SafeguardConfig, mode: Mode) -> Result<Self, SafeguardError> {
        config.validate()?;
        for warning in config.timing_warnings() {
            warn!("{warning}");
        }

        let rules = RuleTable::from_config(&config.pins)?;
        let tightest = rules.tightest().unwrap_or_default();
        let corrector = Corrector::new(
            rules,
            RetryPolicy::from_timing(&config.timing),
            mode,
            config.timing.unreadable_after,
        );

        debug!(
            "Safeguard created with {} pins (tightest rule {:.1}s), tick={}ms, status={}s",
            config.pins.len(),
            tightest.as_secs_f64(),
            config.timing.tick_interval_ms,
            config.timing.status_interval_s
        );

        Ok(Self {
            tick_interval: config.timing.tick_interval(),
            status_interval: config.timing.status_interval(),
            config,
            corrector,
            driver: None,
            running: Arc::new(AtomicBool::new(true)),
            phase: RunPhase::Uninitialized,
            last_status: None,
            stats: TickStats::default(),
        })
    }

    /// Create a built-in driver and run the startup pass.
    pub fn init(&mut self, kind: DriverKind) -> Result<InitReport, SafeguardError> {
        self.init_with_driver(kind.create())
    }

    /// Run the startup pass with an already constructed driver.
    ///
    /// # Errors
    /// Returns `StartupReadFailed` if any pin cannot be read; the safeguard is
    /// then `Stopped` and never enters the loop.
    pub fn init_with_driver(
        &mut self,
        mut driver: Box<dyn PinDriver>,
    ) -> Result<InitReport, SafeguardError> {
        if self.phase != RunPhase::Uninitialized {
            return Err(SafeguardError::InvalidPhase {
                action: "initialize",
                phase: self.phase,
            });
        }
        self.phase = RunPhase::Initializing;

        info!(
            "🚀 STARTING GPIO SAFEGUARD SYSTEM - {} ({})",
            self.corrector.mode(),
            self.config.shared.service_name
        );
        info!("Created driver: {} v{}", driver.name(), driver.version());
        let pins: Vec<String> = self.corrector.rules().pins().map(|p| p.to_string()).collect();
        info!("📋 Monitoring pins: [{}]", pins.join(", "));
        for rule in self.corrector.rules().iter() {
            info!("⚡ Safety rule {}", rule);
        }

        let result = driver
            .init(&self.config)
            .map_err(SafeguardError::from)
            .and_then(|()| initialize(&mut self.corrector, driver.as_mut(), Instant::now()));

        match result {
            Ok(report) => {
                self.driver = Some(driver);
                self.phase = RunPhase::Running;
                self.last_status = Some(Instant::now());
                info!("Safeguard initialized, entering safety loop");
                Ok(report)
            }
            Err(e) => {
                self.phase = RunPhase::Stopped;
                if let Err(shutdown_err) = driver.shutdown() {
                    warn!("Driver shutdown after failed init: {}", shutdown_err);
                }
                Err(e)
            }
        }
    }

    /// Execute one safety tick at `now`, then report status if due.
    pub fn tick(&mut self, now: Instant) -> Result<TickReport, SafeguardError> {
        if self.phase != RunPhase::Running {
            return Err(SafeguardError::InvalidPhase {
                action: "tick",
                phase: self.phase,
            });
        }
        let Some(driver) = self.driver.as_deref_mut() else {
            return Err(SafeguardError::InvalidPhase {
                action: "tick without a driver",
                phase: self.phase,
            });
        };

        let mut report = self.corrector.tick(driver, now);
        report.status_reported = self.maybe_report_status(now);
        Ok(report)
    }

    /// Run the safety loop until the running flag is cleared.
    ///
    /// The flag is checked between ticks only, so a correction in progress
    /// always completes its retry sequence.
    pub fn run(&mut self) -> Result<(), SafeguardError> {
        info!(
            "Starting safety loop (tick={}ms, status every {}s)",
            self.tick_interval.as_millis(),
            self.status_interval.as_secs()
        );

        while self.running.load(Ordering::SeqCst) {
            let tick_start = Instant::now();
            self.tick(tick_start)?;

            let elapsed = tick_start.elapsed();
            self.record_tick_time(elapsed);

            if elapsed < self.tick_interval {
                std::thread::sleep(self.tick_interval - elapsed);
            }
        }

        info!("⏹️  Safeguard system stopped after {} ticks", self.stats.tick_count);
        Ok(())
    }

    /// Stop the loop, log final statistics and release the driver.
    pub fn shutdown(&mut self) -> Result<RunStatistics, SafeguardError> {
        self.running.store(false, Ordering::SeqCst);
        self.phase = RunPhase::Stopped;

        let stats = self.corrector.stats();
        info!("📊 Final statistics:");
        info!("   Total violations detected: {}", stats.violations_detected);
        info!("   Total corrections made: {}", stats.corrections_succeeded);
        info!("   Failed correction sequences: {}", stats.corrections_failed);
        info!(
            "   Ticks: {} (overruns: {}, max {}us)",
            self.stats.tick_count, self.stats.overruns, self.stats.max_tick_us
        );
        if let Some(diag) = self.driver_diagnostics() {
            info!(
                "   Driver: {} reads ({} failed), {} writes ({} failed)",
                diag.reads, diag.read_failures, diag.writes, diag.write_failures
            );
        }

        if let Some(mut driver) = self.driver.take() {
            driver.shutdown()?;
        }
        info!("===== GPIO SAFEGUARD STOPPED =====");
        Ok(stats)
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Pin state owner.
    pub fn corrector(&self) -> &Corrector {
        &self.corrector
    }

    /// Lifetime counters.
    pub fn statistics(&self) -> RunStatistics {
        self.corrector.stats()
    }

    /// Loop timing statistics.
    pub fn tick_stats(&self) -> TickStats {
        self.stats
    }

    /// Driver counters, if the driver keeps any.
    pub fn driver_diagnostics(&self) -> Option<DriverDiagnostics> {
        self.driver.as_ref().and_then(|d| d.diagnostics())
    }

    /// When the last status line was logged (init time before the first).
    pub fn last_status(&self) -> Option<Instant> {
        self.last_status
    }

    /// Current status line.
    pub fn status_line(&self, now: Instant) -> String {
        status_line(&self.corrector, now)
    }

    fn maybe_report_status(&mut self, now: Instant) -> bool {
        let last = *self.last_status.get_or_insert(now);
        if now.saturating_duration_since(last) < self.status_interval {
            return false;
        }
        info!("📊 Status: {}", status_line(&self.corrector, now));
        self.last_status = Some(now);
        true
    }

    fn record_tick_time(&mut self, elapsed: Duration) {
        let tick_us = elapsed.as_micros() as u64;
        self.stats.tick_count += 1;
        self.stats.total_tick_us += tick_us;
        self.stats.max_tick_us = self.stats.max_tick_us.max(tick_us);

        if elapsed > self.tick_interval {
            self.stats.overruns += 1;
            if self.stats.overruns <= 10 || self.stats.overruns % 1000 == 0 {
                warn!(
                    "Tick overrun #{}: tick took {}us (period {}us)",
                    self.stats.overruns,
                    tick_us,
                    self.tick_interval.as_micros()
                );
            }
        }

        if self.stats.tick_count % 1000 == 0 {
            debug!(
                "Safety loop: {} ticks, avg={}us, max={}us, overruns={}",
                self.stats.tick_count,
                self.stats.total_tick_us / self.stats.tick_count,
                self.stats.max_tick_us,
                self.stats.overruns
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::{SimPinBank, SimulationDriver};
    use pinguard_common::level::{PinId, PinLevel};

    fn quiet_config() -> SafeguardConfig {
        let mut config = SafeguardConfig::default();
        config.timing.settle_delay_ms = 0;
        config.timing.retry_backoff_ms = 0;
        config.timing.tick_interval_ms = 1;
        config
    }

    #[test]
    fn phases_follow_lifecycle() {
        let mut safeguard = Safeguard::new(quiet_config(), Mode::Live).unwrap();
        assert_eq!(safeguard.phase(), RunPhase::Uninitialized);
        assert!(safeguard.tick(Instant::now()).is_err());

        safeguard
            .init_with_driver(Box::new(SimulationDriver::new()))
            .unwrap();
        assert_eq!(safeguard.phase(), RunPhase::Running);

        safeguard.shutdown().unwrap();
        assert_eq!(safeguard.phase(), RunPhase::Stopped);
        assert!(safeguard.tick(Instant::now()).is_err());
    }

    #[test]
    fn double_init_is_rejected() {
        let mut safeguard = Safeguard::new(quiet_config(), Mode::Live).unwrap();
        safeguard
            .init_with_driver(Box::new(SimulationDriver::new()))
            .unwrap();
        let err = safeguard
            .init_with_driver(Box::new(SimulationDriver::new()))
            .unwrap_err();
        assert!(matches!(err, SafeguardError::InvalidPhase { .. }));
    }

    #[test]
    fn failed_startup_stops() {
        let bank = SimPinBank::new([PinId(2)]);
        bank.set_unreadable(PinId(2), true);

        let mut safeguard = Safeguard::new(quiet_config(), Mode::Live).unwrap();
        let err = safeguard
            .init_with_driver(Box::new(SimulationDriver::with_bank(bank)))
            .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_STARTUP_FAILURE);
        assert_eq!(safeguard.phase(), RunPhase::Stopped);
    }

    #[test]
    fn run_before_init_is_an_internal_error() {
        let mut safeguard = Safeguard::new(quiet_config(), Mode::Live).unwrap();
        let err = safeguard.run().unwrap_err();
        assert!(matches!(err, SafeguardError::InvalidPhase { action: "tick", .. }));
        assert_eq!(err.exit_code(), crate::error::EXIT_INTERNAL_ERROR);
    }

    #[test]
    fn run_returns_once_flag_is_cleared() {
        let mut safeguard = Safeguard::new(quiet_config(), Mode::Live).unwrap();
        safeguard
            .init_with_driver(Box::new(SimulationDriver::new()))
            .unwrap();

        let flag = safeguard.running_flag();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            flag.store(false, Ordering::SeqCst);
        });

        safeguard.run().unwrap();
        stopper.join().unwrap();
        assert!(safeguard.tick_stats().tick_count > 0);
    }

    #[test]
    fn status_line_reflects_state() {
        let bank = SimPinBank::default();
        let mut safeguard = Safeguard::new(quiet_config(), Mode::Live).unwrap();
        safeguard
            .init_with_driver(Box::new(SimulationDriver::with_bank(bank.clone())))
            .unwrap();
        bank.set_level(PinId(4), PinLevel::Low);

        let now = Instant::now();
        safeguard.tick(now).unwrap();
        assert!(safeguard.status_line(now).contains("GPIO4=0(0.0s/2.0s)"));
    }

    #[test]
    fn status_runs_on_its_own_cadence() {
        let mut config = quiet_config();
        config.timing.status_interval_s = 5;
        let mut safeguard = Safeguard::new(config, Mode::Live).unwrap();
        safeguard
            .init_with_driver(Box::new(SimulationDriver::new()))
            .unwrap();

        let start = safeguard.last_status().unwrap();
        for ms in [1, 100, 2_500, 4_999] {
            let report = safeguard.tick(start + Duration::from_millis(ms)).unwrap();
            assert!(!report.status_reported);
        }
        assert_eq!(safeguard.last_status(), Some(start));

        let due = start + Duration::from_secs(5);
        assert!(safeguard.tick(due).unwrap().status_reported);
        assert_eq!(safeguard.last_status(), Some(due));

        let report = safeguard.tick(due + Duration::from_millis(100)).unwrap();
        assert!(!report.status_reported);
    }
}
