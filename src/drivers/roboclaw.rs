//! RoboClaw packet-serial protocol driver.
//!
//! ## Framing
//!
//! Every packet starts with the controller address and a command byte.
//! Multi-byte fields are big-endian.  The checksum is CRC16/XMODEM
//! (CCITT polynomial 0x1021, init 0) and is sent big-endian.
//!
//! ```text
//! write:  addr cmd payload.. crc_hi crc_lo   →   0xFF        (ack)
//! read:   addr cmd                           →   payload.. crc_hi crc_lo
//! ```
//!
//! For reads the CRC covers `addr cmd payload`.  The driver never retries;
//! any framing error is returned to the caller.
//!
//! ## Status word (`GETERROR`)
//!
//! Bits below `0x1_0000` are errors, bits at or above are warnings.

use std::io::{ErrorKind, Read, Write};

use crc::{CRC_16_XMODEM, Crc};

use crate::error::MotorError;

/// Factory default packet-serial address.
pub const DEFAULT_ADDRESS: u8 = 0x80;

/// Baud rate the controllers are configured for.
pub const BAUD_RATE: u32 = 115_200;

/// Acknowledgement byte returned after a write.
pub const ACK: u8 = 0xFF;

/// Status bits at or above this value are warnings.
pub const WARNING_MASK: u32 = 0xFFFF_0000;

/// Longest write frame: addr + cmd + 8 payload bytes + CRC.
const MAX_WRITE_FRAME: usize = 12;

/// Longest version string the controller returns.
const MAX_VERSION_LEN: usize = 48;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Command numbers used by this driver.
pub mod cmd {
    pub const GETM1ENC: u8 = 16;
    pub const GETM2ENC: u8 = 17;
    pub const GETM1SPEED: u8 = 18;
    pub const GETM2SPEED: u8 = 19;
    pub const GETVERSION: u8 = 21;
    pub const SETM1ENCCOUNT: u8 = 22;
    pub const SETM2ENCCOUNT: u8 = 23;
    pub const GETMBATT: u8 = 24;
    pub const M1SPEEDACCEL: u8 = 38;
    pub const M2SPEEDACCEL: u8 = 39;
    pub const GETCURRENTS: u8 = 49;
    pub const GETTEMP: u8 = 82;
    pub const GETERROR: u8 = 90;
}

/// Names of the documented status bits.
const STATUS_BITS: [(u32, &str); 24] = [
    (0x0000_0001, "E-Stop"),
    (0x0000_0002, "Temperature Error"),
    (0x0000_0004, "Temperature 2 Error"),
    (0x0000_0008, "Main Voltage High Error"),
    (0x0000_0010, "Logic Voltage High Error"),
    (0x0000_0020, "Logic Voltage Low Error"),
    (0x0000_0040, "M1 Driver Fault Error"),
    (0x0000_0080, "M2 Driver Fault Error"),
    (0x0000_0100, "M1 Speed Error"),
    (0x0000_0200, "M2 Speed Error"),
    (0x0000_0400, "M1 Position Error"),
    (0x0000_0800, "M2 Position Error"),
    (0x0000_1000, "M1 Current Error"),
    (0x0000_2000, "M2 Current Error"),
    (0x0001_0000, "M1 Over Current Warning"),
    (0x0002_0000, "M2 Over Current Warning"),
    (0x0004_0000, "Main Voltage High Warning"),
    (0x0008_0000, "Main Voltage Low Warning"),
    (0x0010_0000, "Temperature Warning"),
    (0x0020_0000, "Temperature 2 Warning"),
    (0x0040_0000, "S4 Signal Triggered"),
    (0x0080_0000, "S5 Signal Triggered"),
    (0x0100_0000, "Speed Error Limit Warning"),
    (0x0200_0000, "Position Error Limit Warning"),
];

/// Names of every set bit in a status word.
pub fn status_flags(status: u32) -> impl Iterator<Item = &'static str> {
    STATUS_BITS
        .iter()
        .filter(move |(bit, _)| status & bit != 0)
        .map(|(_, name)| *name)
}

/// Split a status word into (errors, warnings).
pub fn split_status(status: u32) -> (u32, u32) {
    (status & !WARNING_MASK, status & WARNING_MASK)
}

// ---------------------------------------------------------------------------
// Frame encoding / decoding
// ---------------------------------------------------------------------------

/// CRC16/XMODEM over `bytes`.
pub fn checksum(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}

/// Build a write frame: `addr cmd payload crc`.
pub fn encode_write(
    address: u8,
    command: u8,
    payload: &[u8],
) -> Result<heapless::Vec<u8, MAX_WRITE_FRAME>, MotorError> {
    let mut frame: heapless::Vec<u8, MAX_WRITE_FRAME> = heapless::Vec::new();
    frame
        .extend_from_slice(&[address, command])
        .and_then(|()| frame.extend_from_slice(payload))
        .map_err(|()| MotorError::Rejected("payload too long"))?;
    let crc = checksum(&frame);
    frame
        .extend_from_slice(&crc.to_be_bytes())
        .map_err(|()| MotorError::Rejected("payload too long"))?;
    Ok(frame)
}

/// Check a read response (`payload crc`) against the request header and
/// return the payload.
pub fn decode_read(address: u8, command: u8, response: &[u8]) -> Result<&[u8], MotorError> {
    if response.len() < 2 {
        return Err(MotorError::ShortResponse {
            expected: 2,
            got: response.len(),
        });
    }
    let (payload, crc_bytes) = response.split_at(response.len() - 2);
    let received = u16::from_be_bytes([crc_bytes[0], crc_bytes[1]]);

    let mut digest = CRC16.digest();
    digest.update(&[address, command]);
    digest.update(payload);
    let computed = digest.finalize();

    if computed != received {
        return Err(MotorError::Crc { computed, received });
    }
    Ok(payload)
}

// ---------------------------------------------------------------------------
// Telemetry records
// ---------------------------------------------------------------------------

/// Motor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    M1,
    M2,
}

impl Channel {
    fn pick(self, m1: u8, m2: u8) -> u8 {
        match self {
            Self::M1 => m1,
            Self::M2 => m2,
        }
    }
}

/// Encoder count and its status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoder {
    pub count: i32,
    pub underflow: bool,
    pub backward: bool,
    pub overflow: bool,
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// One RoboClaw on a byte stream.  The stream must time out reads so a
/// dead controller cannot stall the loop.
#[derive(Debug)]
pub struct RoboClaw<T> {
    port: T,
    address: u8,
}

impl<T: Read + Write> RoboClaw<T> {
    pub fn new(port: T, address: u8) -> Self {
        Self { port, address }
    }

    pub fn port(&self) -> &T {
        &self.port
    }

    // ── Write commands ─────────────────────────────────────────

    /// Drive a channel to `speed` (QPPS, signed) at `accel` (QPPS/s).
    pub fn speed_accel(&mut self, channel: Channel, accel: u32, speed: i32) -> Result<(), MotorError> {
        let mut payload = [0u8; 8];
        payload[..4].copy_from_slice(&accel.to_be_bytes());
        payload[4..].copy_from_slice(&speed.to_be_bytes());
        self.write(channel.pick(cmd::M1SPEEDACCEL, cmd::M2SPEEDACCEL), &payload)
    }

    /// Preset an encoder count.
    pub fn set_encoder(&mut self, channel: Channel, count: i32) -> Result<(), MotorError> {
        self.write(
            channel.pick(cmd::SETM1ENCCOUNT, cmd::SETM2ENCCOUNT),
            &count.to_be_bytes(),
        )
    }

    // ── Read commands ──────────────────────────────────────────

    pub fn read_encoder(&mut self, channel: Channel) -> Result<Encoder, MotorError> {
        let p: [u8; 5] = self.read(channel.pick(cmd::GETM1ENC, cmd::GETM2ENC))?;
        Ok(Encoder {
            count: i32::from_be_bytes([p[0], p[1], p[2], p[3]]),
            underflow: p[4] & 0x01 != 0,
            backward: p[4] & 0x02 != 0,
            overflow: p[4] & 0x04 != 0,
        })
    }

    /// Signed encoder speed (QPPS); negative when the direction byte
    /// reports backward.
    pub fn read_speed(&mut self, channel: Channel) -> Result<i32, MotorError> {
        let p: [u8; 5] = self.read(channel.pick(cmd::GETM1SPEED, cmd::GETM2SPEED))?;
        let magnitude = u32::from_be_bytes([p[0], p[1], p[2], p[3]]);
        let magnitude = i32::try_from(magnitude).unwrap_or(i32::MAX);
        Ok(if p[4] != 0 { -magnitude } else { magnitude })
    }

    /// Raw status word.
    pub fn read_status(&mut self) -> Result<u32, MotorError> {
        let p: [u8; 4] = self.read(cmd::GETERROR)?;
        Ok(u32::from_be_bytes(p))
    }

    /// Main battery voltage (V).
    pub fn read_main_battery(&mut self) -> Result<f32, MotorError> {
        let p: [u8; 2] = self.read(cmd::GETMBATT)?;
        Ok(f32::from(u16::from_be_bytes(p)) / 10.0)
    }

    /// Motor currents (A).
    pub fn read_currents(&mut self) -> Result<(f32, f32), MotorError> {
        let p: [u8; 4] = self.read(cmd::GETCURRENTS)?;
        Ok((
            f32::from(i16::from_be_bytes([p[0], p[1]])) / 100.0,
            f32::from(i16::from_be_bytes([p[2], p[3]])) / 100.0,
        ))
    }

    /// Board temperature (°C).
    pub fn read_temperature(&mut self) -> Result<f32, MotorError> {
        let p: [u8; 2] = self.read(cmd::GETTEMP)?;
        Ok(f32::from(u16::from_be_bytes(p)) / 10.0)
    }

    /// Firmware version string.  Variable length, NUL-terminated.
    pub fn read_version(&mut self) -> Result<String, MotorError> {
        self.send(&[self.address, cmd::GETVERSION])?;

        let mut text: heapless::Vec<u8, MAX_VERSION_LEN> = heapless::Vec::new();
        loop {
            let [b] = self.receive::<1>()?;
            if b == 0 {
                break;
            }
            text.push(b)
                .map_err(|_| MotorError::Rejected("version string too long"))?;
        }
        let crc = self.receive::<2>()?;

        let mut response: heapless::Vec<u8, { MAX_VERSION_LEN + 3 }> = heapless::Vec::new();
        // Capacity covers text + NUL + CRC.
        let _ = response.extend_from_slice(&text);
        let _ = response.push(0);
        let _ = response.extend_from_slice(&crc);
        decode_read(self.address, cmd::GETVERSION, &response)?;

        Ok(String::from_utf8_lossy(&text).trim_end().to_owned())
    }

    // ── Internal ───────────────────────────────────────────────

    fn write(&mut self, command: u8, payload: &[u8]) -> Result<(), MotorError> {
        let frame = encode_write(self.address, command, payload)?;
        self.send(&frame)?;
        match self.receive::<1>()? {
            [ACK] => Ok(()),
            [other] => Err(MotorError::Nack(other)),
        }
    }

    fn read<const N: usize>(&mut self, command: u8) -> Result<[u8; N], MotorError> {
        self.send(&[self.address, command])?;
        let mut payload = self.receive::<N>()?;
        let crc = self.receive::<2>()?;

        let mut response: heapless::Vec<u8, 32> = heapless::Vec::new();
        response
            .extend_from_slice(&payload)
            .and_then(|()| response.extend_from_slice(&crc))
            .map_err(|()| MotorError::Rejected("response too long"))?;
        let checked = decode_read(self.address, command, &response)?;
        payload.copy_from_slice(checked);
        Ok(payload)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MotorError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn receive<const N: usize>(&mut self) -> Result<[u8; N], MotorError> {
        let mut buf = [0u8; N];
        let mut got = 0;
        while got < N {
            match self.port.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => break,
                Err(e) => return Err(e.into()),
            }
        }
        if got < N {
            return Err(MotorError::ShortResponse { expected: N, got });
        }
        Ok(buf)
    }
}
