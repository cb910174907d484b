//! # Pinguard Binary
//!
//! GPIO safety watchdog with pluggable pin drivers.
//!
//! # Usage
//!
//! ```bash
//! # Run against the hardware with the built-in rule table
//! pinguard
//!
//! # Observe only, never write
//! pinguard --dry-run
//!
//! # Rehearse a configuration without hardware
//! pinguard --config config/pinguard.toml --simulate -v
//!
//! # Show the effective configuration
//! pinguard --config config/pinguard.toml --print-config
//! ```

use clap::Parser;
use pinguard::core::Safeguard;
use pinguard::corrector::Mode;
use pinguard::drivers::DriverKind;
use pinguard::error::{EXIT_INTERNAL_ERROR, SafeguardError};
use pinguard_common::config::{LogLevel, SafeguardConfig};
use pinguard_common::consts::DEFAULT_CONFIG_PATH;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Pinguard - bounds the time GPIO pins may spend at level 0
#[derive(Parser, Debug)]
#[command(name = "pinguard")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "GPIO safety watchdog: forces pins back to 1 after their unsafe time limit")]
#[command(long_about = None)]
struct Args {
    /// Path to configuration file. Defaults to /etc/pinguard/pinguard.toml
    /// if present, otherwise the built-in rules are used.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Observe and report only; never write to any pin
    #[arg(long)]
    dry_run: bool,

    /// Seconds between status lines (overrides the config file)
    #[arg(long, value_name = "SECS")]
    status_interval: Option<u64>,

    /// Force simulation driver
    #[arg(short = 's', long)]
    simulate: bool,

    /// Load a specific driver by name
    #[arg(short, long)]
    driver: Option<String>,

    /// Path of the raspi-gpio helper
    #[arg(long, value_name = "PATH")]
    raspi_gpio: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Also append logs to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    let config = load_config(&args);
    let log_level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();

    if let Err(e) = setup_tracing(&args, log_level) {
        eprintln!("cannot open log file: {e}");
        std::process::exit(EXIT_INTERNAL_ERROR);
    }

    let result = config.and_then(|config| {
        if args.print_config {
            print_config(&config);
            return Ok(());
        }
        run(&args, config)
    });

    if let Err(e) = result {
        error!("Pinguard failed: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(args: &Args, config: SafeguardConfig) -> Result<(), SafeguardError> {
    info!("Pinguard v{} starting...", env!("CARGO_PKG_VERSION"));

    let driver = if args.simulate {
        info!("Simulation mode enabled (exclusive)");
        DriverKind::Simulation
    } else {
        config.driver.name.parse::<DriverKind>()?
    };
    let mode = if args.dry_run {
        Mode::DryRun
    } else {
        Mode::Live
    };

    let mut safeguard = Safeguard::new(config, mode)?;

    let running = safeguard.running_flag();
    ctrlc::set_handler(move || {
        info!("🛑 Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|e| SafeguardError::SignalHandler(e.to_string()))?;

    let report = safeguard.init(driver)?;
    let unresolved = report.unresolved();
    if !unresolved.is_empty() {
        warn!(
            "Running degraded: {} pin(s) could not be forced safe at startup",
            unresolved.len()
        );
    }

    let loop_result = safeguard.run();
    if let Err(e) = &loop_result {
        error!("Safety loop error: {}", e);
    }

    safeguard.shutdown()?;
    loop_result
}

/// Load the configuration file and apply command line overrides.
fn load_config(args: &Args) -> Result<SafeguardConfig, SafeguardError> {
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    let mut config = match &args.config {
        Some(path) => SafeguardConfig::from_file(path)?,
        None if default_path.is_file() => SafeguardConfig::from_file(default_path)?,
        None => SafeguardConfig::default(),
    };

    if let Some(secs) = args.status_interval {
        config.timing.status_interval_s = secs;
    }
    if let Some(name) = &args.driver {
        config.driver.name = name.clone();
    }
    if let Some(path) = &args.raspi_gpio {
        config.driver.raspi_gpio_path = path.clone();
    }

    config.validate()?;
    Ok(config)
}

fn print_config(config: &SafeguardConfig) {
    match toml::to_string_pretty(config) {
        Ok(text) => print!("{text}"),
        Err(e) => error!("Cannot serialize configuration: {}", e),
    }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args, level: LogLevel) -> std::io::Result<()> {
    let directive = if args.verbose {
        "debug"
    } else {
        level.as_directive()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if args.json {
        layers.push(fmt::layer().json().boxed());
    } else {
        layers.push(fmt::layer().with_target(false).boxed());
    }
    if let Some(path) = &args.log_file {
        layers.push(file_layer(path)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .init();
    Ok(())
}

fn file_layer(path: &Path) -> std::io::Result<Box<dyn Layer<Registry> + Send + Sync>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .boxed())
}
