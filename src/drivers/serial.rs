//! Serial TTY setup for the motor controllers.
//!
//! ## Dual-target design
//!
//! On Linux with the `hardware` feature: opens the device with
//! `O_NOCTTY`, puts it in raw mode at the requested baud rate and sets a
//! read timeout via `VMIN = 0` / `VTIME`, so a silent controller makes
//! `read` return 0 instead of blocking the loop.
//! Elsewhere: [`open`] returns `Unsupported`.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

/// Ports tried in order when none is given on the command line.
pub const DEFAULT_PORTS: [&str; 3] = ["/dev/ttyAMA1", "/dev/ttyACM0", "/dev/ttyACM1"];

/// Read timeout applied to the TTY.  Must stay below one tick.
pub const READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Open `path` as a raw serial port.
#[cfg(all(target_os = "linux", feature = "hardware"))]
pub fn open(path: &Path, baud: u32, timeout: Duration) -> io::Result<File> {
    use nix::fcntl::OFlag;
    use nix::sys::termios::{
        FlushArg, SetArg, SpecialCharacterIndices, cfmakeraw, cfsetspeed, tcflush, tcgetattr,
        tcsetattr,
    };
    use std::os::unix::fs::OpenOptionsExt;

    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(OFlag::O_NOCTTY.bits())
        .open(path)?;

    let mut tio = tcgetattr(&file)?;
    cfmakeraw(&mut tio);
    cfsetspeed(&mut tio, baud_rate(baud)?)?;
    // VTIME counts tenths of a second.
    let deciseconds = timeout.as_millis().div_ceil(100).clamp(1, 255) as u8;
    tio.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    tio.control_chars[SpecialCharacterIndices::VTIME as usize] = deciseconds;
    tcsetattr(&file, SetArg::TCSANOW, &tio)?;
    tcflush(&file, FlushArg::TCIOFLUSH)?;

    Ok(file)
}

#[cfg(not(all(target_os = "linux", feature = "hardware")))]
pub fn open(path: &Path, _baud: u32, _timeout: Duration) -> io::Result<File> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("serial port {} needs Linux and the `hardware` feature", path.display()),
    ))
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
fn baud_rate(baud: u32) -> io::Result<nix::sys::termios::BaudRate> {
    use nix::sys::termios::BaudRate;
    Ok(match baud {
        9_600 => BaudRate::B9600,
        19_200 => BaudRate::B19200,
        38_400 => BaudRate::B38400,
        57_600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        230_400 => BaudRate::B230400,
        460_800 => BaudRate::B460800,
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported baud rate {other}"),
            ));
        }
    })
}

/// Try each candidate in order and return the first that opens.
pub fn open_first(candidates: &[PathBuf], baud: u32) -> io::Result<(PathBuf, File)> {
    let mut last = io::Error::new(io::ErrorKind::NotFound, "no serial port candidates");
    for path in candidates {
        match open(path, baud, READ_TIMEOUT) {
            Ok(file) => {
                info!("Serial port {} open at {baud} baud", path.display());
                return Ok((path.clone(), file));
            }
            Err(e) => {
                warn!("Serial port {} unavailable: {e}", path.display());
                last = e;
            }
        }
    }
    Err(last)
}

/// [`DEFAULT_PORTS`] as paths.
pub fn default_candidates() -> Vec<PathBuf> {
    DEFAULT_PORTS.iter().map(PathBuf::from).collect()
}
