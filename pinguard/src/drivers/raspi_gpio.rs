//! `raspi-gpio` driver.
//!
//! Reads and drives pins through the `raspi-gpio` command line tool:
//!
//! ```text
//! $ raspi-gpio get 4
//! GPIO 4: level=1 fsel=1 func=OUTPUT pull=DOWN
//! $ raspi-gpio set 4 op dh
//! ```
//!
//! Every call spawns one process, so a read costs a few milliseconds.

use pinguard_common::prelude::*;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Driver shelling out to `raspi-gpio`.
#[derive(Debug)]
pub struct RaspiGpioDriver {
    program: PathBuf,
    diagnostics: DriverDiagnostics,
}

impl RaspiGpioDriver {
    /// Driver using the default program name (resolved through `PATH`).
    pub fn new() -> Self {
        Self::with_program(pinguard_common::consts::DEFAULT_RASPI_GPIO_PATH)
    }

    /// Driver invoking `program` as given, without resolving it.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            diagnostics: DriverDiagnostics::default(),
        }
    }

    fn command_name(&self) -> String {
        self.program.display().to_string()
    }

    fn get(&self, pin: PinId) -> Result<PinLevel, IoError> {
        let output = Command::new(&self.program)
            .arg("get")
            .arg(pin.number().to_string())
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| IoError::Spawn {
                command: self.command_name(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(IoError::CommandFailed {
                command: self.command_name(),
                status: output.status.to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        match parse_level(&text) {
            PinLevel::Unknown => Err(IoError::Unparseable {
                pin,
                output: text.trim().to_string(),
            }),
            level => Ok(level),
        }
    }

    fn set(&self, pin: PinId, level: DriveLevel) -> Result<(), IoError> {
        let drive = match level {
            DriveLevel::High => "dh",
            DriveLevel::Low => "dl",
        };
        let status = Command::new(&self.program)
            .arg("set")
            .arg(pin.number().to_string())
            .args(["op", drive])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| IoError::Spawn {
                command: self.command_name(),
                reason: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(IoError::CommandFailed {
                command: self.command_name(),
                status: status.to_string(),
            })
        }
    }
}

impl Default for RaspiGpioDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate `program`: a bare name is searched in `PATH`, anything with a
/// directory part must name an existing file.
pub fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Extract the level from one line of `raspi-gpio get` output.
pub fn parse_level(output: &str) -> PinLevel {
    output
        .split_whitespace()
        .find_map(|field| field.strip_prefix("level="))
        .and_then(|value| value.parse::<u8>().ok())
        .map_or(PinLevel::Unknown, PinLevel::from_bit)
}

impl PinDriver for RaspiGpioDriver {
    fn name(&self) -> &'static str {
        "raspi-gpio"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, config: &SafeguardConfig) -> Result<(), IoError> {
        let requested = &config.driver.raspi_gpio_path;
        self.program = resolve_program(requested).ok_or_else(|| {
            IoError::InitFailed(format!("{} not found", requested.display()))
        })?;
        info!("raspi-gpio driver using {:?}", self.program);
        Ok(())
    }

    fn read_level(&mut self, pin: PinId) -> PinLevel {
        self.diagnostics.reads += 1;
        match self.get(pin) {
            Ok(level) => level,
            Err(e) => {
                self.diagnostics.read_failures += 1;
                debug!(pin = pin.number(), "read failed: {e}");
                PinLevel::Unknown
            }
        }
    }

    fn write_level(&mut self, pin: PinId, level: DriveLevel) -> Result<(), IoError> {
        self.diagnostics.writes += 1;
        self.set(pin, level).inspect_err(|_| {
            self.diagnostics.write_failures += 1;
        })
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        Some(self.diagnostics.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels() {
        assert_eq!(
            parse_level("GPIO 2: level=1 fsel=1 func=OUTPUT pull=DOWN"),
            PinLevel::High
        );
        assert_eq!(
            parse_level("GPIO 4: level=0 fsel=0 func=INPUT pull=UP\n"),
            PinLevel::Low
        );
    }

    #[test]
    fn garbage_is_unknown() {
        assert_eq!(parse_level(""), PinLevel::Unknown);
        assert_eq!(parse_level("GPIO 4: fsel=0 func=INPUT"), PinLevel::Unknown);
        assert_eq!(parse_level("GPIO 4: level=x"), PinLevel::Unknown);
        assert_eq!(parse_level("GPIO 4: level=7"), PinLevel::Unknown);
    }

    #[test]
    fn missing_program_reads_unknown_and_fails_writes() {
        let mut driver = RaspiGpioDriver::with_program("/nonexistent/raspi-gpio");

        assert_eq!(driver.read_level(PinId(4)), PinLevel::Unknown);
        assert!(matches!(
            driver.write_level(PinId(4), DriveLevel::High),
            Err(IoError::Spawn { .. })
        ));

        let diag = driver.diagnostics().unwrap();
        assert_eq!(diag.read_failures, 1);
        assert_eq!(diag.write_failures, 1);
    }

    #[test]
    fn init_rejects_missing_program() {
        let mut config = SafeguardConfig::default();
        config.driver.raspi_gpio_path = PathBuf::from("/nonexistent/raspi-gpio");

        let mut driver = RaspiGpioDriver::new();
        assert!(matches!(driver.init(&config), Err(IoError::InitFailed(_))));
    }

    #[test]
    fn init_accepts_existing_program() {
        let helper = tempfile::NamedTempFile::new().unwrap();
        let mut config = SafeguardConfig::default();
        config.driver.raspi_gpio_path = helper.path().to_path_buf();

        let mut driver = RaspiGpioDriver::new();
        driver.init(&config).unwrap();
        assert_eq!(driver.program, helper.path());
    }

    #[test]
    fn bare_name_is_searched_in_path() {
        assert!(resolve_program(Path::new("definitely-not-a-raspi-gpio-binary")).is_none());
        assert!(resolve_program(Path::new("/nonexistent/raspi-gpio")).is_none());
    }
}
