//! Fuzz target: RoboClaw response decoding
//!
//! Treats the input as a controller reply to a read command and checks
//! that the decoder never panics, and that anything it accepts is a
//! strict prefix of the input whose CRC re-encodes to the trailing bytes.
//!
//! cargo fuzz run fuzz_roboclaw_response

#![no_main]

use libfuzzer_sys::fuzz_target;
use rcc::drivers::roboclaw::{DEFAULT_ADDRESS, checksum, cmd, decode_read, encode_write};

fuzz_target!(|data: &[u8]| {
    let Some((&command, response)) = data.split_first() else {
        return;
    };

    if let Ok(payload) = decode_read(DEFAULT_ADDRESS, command, response) {
        assert_eq!(payload.len() + 2, response.len());
        let mut header = vec![DEFAULT_ADDRESS, command];
        header.extend_from_slice(payload);
        let crc = checksum(&header).to_be_bytes();
        assert_eq!(&response[payload.len()..], &crc);
    }

    // Write frames either fit or are rejected; never panic.
    if let Ok(frame) = encode_write(DEFAULT_ADDRESS, cmd::M1SPEEDACCEL, response) {
        assert_eq!(frame.len(), response.len() + 4);
    }
});
