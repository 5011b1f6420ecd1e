//! GPIO line over the Linux sysfs interface (`/sys/class/gpio`).
//!
//! Implements the `embedded-hal` 1.0 digital traits so the panel and
//! theming adapters stay generic over the pin type.  Every read and write
//! goes straight to the `value` file; nothing is cached.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};
use log::debug;

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Time for udev to fix permissions on a freshly exported line.
const EXPORT_SETTLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// Failure on one sysfs line.
#[derive(Debug, thiserror::Error)]
pub enum SysfsGpioError {
    #[error("gpio{line}: {source}")]
    Io {
        line: u32,
        #[source]
        source: io::Error,
    },
    #[error("gpio{line}: unexpected value {value:?}")]
    BadValue { line: u32, value: String },
}

impl digital::Error for SysfsGpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// One exported GPIO line.
#[derive(Debug)]
pub struct SysfsPin {
    line: u32,
    value: PathBuf,
}

impl SysfsPin {
    /// Export `line` under the default root and set its direction.
    pub fn open(line: u32, direction: Direction) -> Result<Self, SysfsGpioError> {
        Self::open_at(Path::new(SYSFS_GPIO_ROOT), line, direction)
    }

    /// As [`open`](Self::open) with an explicit sysfs root.
    pub fn open_at(root: &Path, line: u32, direction: Direction) -> Result<Self, SysfsGpioError> {
        let io_err = |source| SysfsGpioError::Io { line, source };
        let dir = root.join(format!("gpio{line}"));

        if !dir.exists() {
            fs::write(root.join("export"), line.to_string()).map_err(io_err)?;
            thread::sleep(EXPORT_SETTLE);
            debug!("gpio{line} exported");
        }
        fs::write(dir.join("direction"), direction.as_str()).map_err(io_err)?;

        Ok(Self {
            line,
            value: dir.join("value"),
        })
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn read_level(&self) -> Result<bool, SysfsGpioError> {
        let raw = fs::read_to_string(&self.value).map_err(|source| SysfsGpioError::Io {
            line: self.line,
            source,
        })?;
        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(SysfsGpioError::BadValue {
                line: self.line,
                value: other.to_owned(),
            }),
        }
    }

    fn write_level(&self, high: bool) -> Result<(), SysfsGpioError> {
        fs::write(&self.value, if high { "1" } else { "0" }).map_err(|source| {
            SysfsGpioError::Io {
                line: self.line,
                source,
            }
        })
    }
}

impl ErrorType for SysfsPin {
    type Error = SysfsGpioError;
}

impl InputPin for SysfsPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.read_level()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.read_level().map(|high| !high)
    }
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_level(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_level(true)
    }
}
