//! End-to-end safeguard scenarios.
//!
//! Every test drives a `Safeguard` against the simulation driver with
//! synthetic tick instants and zero settle/backoff delays, so nothing here
//! depends on wall-clock timing.

use pinguard::core::{RunPhase, Safeguard};
use pinguard::corrector::{CorrectionOutcome, Mode};
use pinguard::drivers::DriverKind;
use pinguard::drivers::simulation::{SimPinBank, SimulationDriver};
use pinguard::error::{EXIT_STARTUP_FAILURE, SafeguardError};
use pinguard::initializer::InitOutcome;
use pinguard_common::config::SafeguardConfig;
use pinguard_common::level::{DriveLevel, PinId, PinLevel};
use std::time::{Duration, Instant};

const PIN_4: PinId = PinId(4);
const PIN_10: PinId = PinId(10);

fn instant_config() -> SafeguardConfig {
    let mut config = SafeguardConfig::default();
    config.timing.settle_delay_ms = 0;
    config.timing.retry_backoff_ms = 0;
    config
}

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

/// Safeguard in `mode` running over a shared bank, plus the tick origin.
fn start(mode: Mode) -> (Safeguard, SimPinBank, Instant) {
    let bank = SimPinBank::default();
    let mut safeguard = Safeguard::new(instant_config(), mode).unwrap();
    safeguard
        .init_with_driver(Box::new(SimulationDriver::with_bank(bank.clone())))
        .unwrap();
    (safeguard, bank, Instant::now())
}

#[test]
fn short_rule_pin_is_forced_back_once() {
    let (mut safeguard, bank, t0) = start(Mode::Live);

    safeguard.tick(t0).unwrap();
    bank.set_level(PIN_4, PinLevel::Low);
    let report = safeguard.tick(t0 + secs(0.5)).unwrap();
    assert!(report.violations.is_empty());
    assert_eq!(
        safeguard.corrector().state(PIN_4).unwrap().unsafe_since(),
        Some(t0 + secs(0.5))
    );

    let report = safeguard.tick(t0 + secs(3.0)).unwrap();
    assert_eq!(report.violations.len(), 1);
    let event = &report.violations[0];
    assert_eq!(event.pin, PIN_4);
    assert_eq!(event.elapsed, secs(2.5));
    assert!(matches!(
        event.outcome,
        CorrectionOutcome::Verified { attempts: 1 }
    ));

    assert_eq!(bank.writes(), vec![(PIN_4, DriveLevel::High)]);
    assert_eq!(bank.level(PIN_4), PinLevel::High);

    let stats = safeguard.statistics();
    assert_eq!(stats.violations_detected, 1);
    assert_eq!(stats.corrections_succeeded, 1);

    let state = safeguard.corrector().state(PIN_4).unwrap();
    assert_eq!(state.last_level(), PinLevel::High);
    assert!(state.unsafe_since().is_none());

    // Quiet afterwards.
    let report = safeguard.tick(t0 + secs(3.1)).unwrap();
    assert!(report.violations.is_empty());
    assert_eq!(bank.writes().len(), 1);
}

#[test]
fn pin_at_limit_exactly_is_not_a_violation() {
    let (mut safeguard, bank, t0) = start(Mode::Live);

    bank.set_level(PIN_4, PinLevel::Low);
    safeguard.tick(t0).unwrap();
    let report = safeguard.tick(t0 + secs(2.0)).unwrap();
    assert!(report.violations.is_empty());
    assert!(bank.writes().is_empty());
}

#[test]
fn unreadable_pin_is_never_judged() {
    let (mut safeguard, bank, t0) = start(Mode::Live);
    bank.set_unreadable(PIN_10, true);

    for step in 0..=60 {
        let report = safeguard.tick(t0 + secs(f64::from(step) * 0.1)).unwrap();
        assert!(report.violations.is_empty());
        assert_eq!(report.unknown_reads, 1);
    }

    let state = safeguard.corrector().state(PIN_10).unwrap();
    assert_eq!(state.last_level(), PinLevel::High);
    assert!(state.unsafe_since().is_none());
    assert_eq!(state.read_failures(), 61);
    assert!(bank.writes().is_empty());
    assert_eq!(safeguard.statistics().violations_detected, 0);
    assert!(
        safeguard
            .status_line(t0 + secs(6.0))
            .contains("GPIO10=1(UNREADABLE x61)")
    );
}

#[test]
fn unknown_reads_keep_the_unsafe_timer_running() {
    let (mut safeguard, bank, t0) = start(Mode::Live);

    bank.set_level(PIN_10, PinLevel::Low);
    safeguard.tick(t0).unwrap();
    bank.set_unreadable(PIN_10, true);

    let report = safeguard.tick(t0 + secs(10.0)).unwrap();
    assert!(report.violations.is_empty());
    assert_eq!(
        safeguard.corrector().state(PIN_10).unwrap().unsafe_since(),
        Some(t0)
    );

    // First good read judges the whole span since t0.
    bank.set_unreadable(PIN_10, false);
    let report = safeguard.tick(t0 + secs(11.0)).unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].elapsed, secs(11.0));
    assert_eq!(bank.writes(), vec![(PIN_10, DriveLevel::High)]);
}

#[test]
fn dry_run_never_writes() {
    let bank = SimPinBank::default();
    let mut config = instant_config();
    config.simulation.initial_low = vec![PIN_4];

    let mut safeguard = Safeguard::new(config, Mode::DryRun).unwrap();
    let report = safeguard
        .init_with_driver(Box::new(SimulationDriver::with_bank(bank.clone())))
        .unwrap();
    assert!(
        report
            .outcomes
            .contains(&(PIN_4, InitOutcome::Observed(PinLevel::Low)))
    );
    let t0 = Instant::now();

    let report = safeguard.tick(t0 + secs(3.0)).unwrap();
    assert_eq!(report.violations.len(), 1);
    assert!(matches!(
        report.violations[0].outcome,
        CorrectionOutcome::Simulated
    ));
    assert_eq!(safeguard.statistics().corrections_succeeded, 1);

    // Still 0 on the hardware, so a new window opens.
    safeguard.tick(t0 + secs(3.1)).unwrap();
    assert_eq!(
        safeguard.corrector().state(PIN_4).unwrap().unsafe_since(),
        Some(t0 + secs(3.1))
    );

    assert!(bank.writes().is_empty());
    assert_eq!(bank.diagnostics().writes, 0);
    assert_eq!(bank.level(PIN_4), PinLevel::Low);
}

#[test]
fn stuck_pin_stays_flagged_and_is_counted_once() {
    let (mut safeguard, bank, t0) = start(Mode::Live);

    bank.set_level(PIN_4, PinLevel::Low);
    bank.set_stuck(PIN_4, true);
    safeguard.tick(t0).unwrap();

    let report = safeguard.tick(t0 + secs(2.5)).unwrap();
    assert!(matches!(
        report.violations[0].outcome,
        CorrectionOutcome::Failed { attempts: 3, .. }
    ));
    assert_eq!(bank.writes().len(), 3);

    let report = safeguard.tick(t0 + secs(2.6)).unwrap();
    assert!(report.violations[0].repeated);
    assert_eq!(bank.writes().len(), 6);

    let stats = safeguard.statistics();
    assert_eq!(stats.violations_detected, 1);
    assert_eq!(stats.corrections_succeeded, 0);
    assert_eq!(stats.corrections_failed, 2);

    let state = safeguard.corrector().state(PIN_4).unwrap();
    assert_eq!(state.unsafe_since(), Some(t0));
    assert!(
        safeguard
            .status_line(t0 + secs(2.6))
            .contains("GPIO4=0(2.6s/2.0s VIOLATION)")
    );

    // Released: the next correction sticks and closes the window.
    bank.set_stuck(PIN_4, false);
    let report = safeguard.tick(t0 + secs(2.7)).unwrap();
    assert!(report.violations[0].outcome.is_success());
    assert!(
        safeguard
            .corrector()
            .state(PIN_4)
            .unwrap()
            .unsafe_since()
            .is_none()
    );
}

#[test]
fn transient_write_fault_is_retried() {
    let (mut safeguard, bank, t0) = start(Mode::Live);

    bank.set_level(PIN_4, PinLevel::Low);
    bank.reject_next_writes(PIN_4, 2);
    safeguard.tick(t0).unwrap();

    let report = safeguard.tick(t0 + secs(2.5)).unwrap();
    assert!(matches!(
        report.violations[0].outcome,
        CorrectionOutcome::Verified { attempts: 3 }
    ));
    assert_eq!(safeguard.statistics().corrections_succeeded, 1);
}

#[test]
fn pin_returning_on_its_own_needs_no_correction() {
    let (mut safeguard, bank, t0) = start(Mode::Live);

    bank.set_level(PIN_4, PinLevel::Low);
    safeguard.tick(t0).unwrap();
    bank.set_level(PIN_4, PinLevel::High);
    safeguard.tick(t0 + secs(1.5)).unwrap();
    bank.set_level(PIN_4, PinLevel::Low);
    safeguard.tick(t0 + secs(2.5)).unwrap();

    let report = safeguard.tick(t0 + secs(4.0)).unwrap();
    assert!(report.violations.is_empty());
    assert!(bank.writes().is_empty());
}

#[test]
fn unreadable_pin_at_startup_is_fatal() {
    let mut config = instant_config();
    config.simulation.unreadable = vec![PIN_10];

    let mut safeguard = Safeguard::new(config, Mode::Live).unwrap();
    let err = safeguard
        .init_with_driver(Box::new(SimulationDriver::new()))
        .unwrap_err();

    match &err {
        SafeguardError::StartupReadFailed { pins } => assert_eq!(pins, &vec![PIN_10]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), EXIT_STARTUP_FAILURE);
    assert_eq!(safeguard.phase(), RunPhase::Stopped);
}

#[test]
fn startup_forces_unsafe_pins_through_registry_driver() {
    let mut config = instant_config();
    config.simulation.initial_low = vec![PIN_4];

    let mut safeguard = Safeguard::new(config, Mode::Live).unwrap();
    let report = safeguard.init(DriverKind::Simulation).unwrap();

    assert!(report.outcomes.contains(&(
        PIN_4,
        InitOutcome::Forced(CorrectionOutcome::Verified { attempts: 1 })
    )));
    assert!(report.unresolved().is_empty());
    assert_eq!(safeguard.statistics().corrections_succeeded, 0);

    let diag = safeguard.driver_diagnostics().unwrap();
    assert_eq!(diag.writes, 1);

    let stats = safeguard.shutdown().unwrap();
    assert_eq!(stats.violations_detected, 0);
    assert_eq!(safeguard.phase(), RunPhase::Stopped);
}

#[test]
fn driver_selection_errors_are_internal() {
    let safeguard = Safeguard::new(instant_config(), Mode::Live).unwrap();
    let err = "gpiod".parse::<DriverKind>().unwrap_err();
    assert!(matches!(err, SafeguardError::DriverNotFound(_)));
    assert_eq!(safeguard.phase(), RunPhase::Uninitialized);

    // A missing helper binary is a driver error, not a startup read failure.
    let mut config = instant_config();
    config.driver.raspi_gpio_path = "/nonexistent/raspi-gpio".into();
    let mut safeguard = Safeguard::new(config, Mode::Live).unwrap();
    let err = safeguard.init(DriverKind::RaspiGpio).unwrap_err();
    assert!(matches!(err, SafeguardError::Driver(_)));
    assert_eq!(err.exit_code(), pinguard::error::EXIT_INTERNAL_ERROR);
    assert_eq!(safeguard.phase(), RunPhase::Stopped);
}

#[test]
fn config_file_drives_the_simulation() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[timing]
settle_delay_ms = 0
retry_backoff_ms = 0

[driver]
name = "simulation"

[[pins]]
pin = 17
max_unsafe_s = 1.0

[simulation]
stuck = [17]
initial_low = [17]
"#
    )
    .unwrap();
    file.flush().unwrap();

    let config = SafeguardConfig::from_file(file.path()).unwrap();
    let driver: DriverKind = config.driver.name.parse().unwrap();
    let mut safeguard = Safeguard::new(config, Mode::Live).unwrap();
    let report = safeguard.init(driver).unwrap();

    assert_eq!(report.unresolved(), vec![PinId(17)]);
    let state = safeguard.corrector().state(PinId(17)).unwrap();
    assert_eq!(state.last_level(), PinLevel::Low);
    assert!(state.unsafe_since().is_some());
}

#[test]
fn unrepresentable_durations_are_config_errors() {
    let mut config = instant_config();
    config.pins[0].max_unsafe_s = 1e20;
    let err = Safeguard::new(config, Mode::Live).err().unwrap();
    assert!(matches!(err, SafeguardError::Config(_)));
    assert_eq!(err.exit_code(), pinguard::error::EXIT_INTERNAL_ERROR);

    let mut config = instant_config();
    config.simulation.events.push(pinguard_common::config::SimulationEvent {
        pin: PIN_4,
        at_s: 1e20,
        level: PinLevel::Low,
    });
    let err = Safeguard::new(config, Mode::Live).err().unwrap();
    assert!(matches!(err, SafeguardError::Config(_)));
}
