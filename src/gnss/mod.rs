// src/gnss/mod.rs

pub mod fix;
pub mod framer;

pub use fix::{FixError, PositionFix, UtcTime, POSITION_RECORD_LEN};
pub use framer::{FrameSlot, LineFramer, SentenceFrame};

/// MTK receiver command: emit GGA once per fix, nothing else.
pub const GGA_ONLY_COMMAND: &[u8] = b"$PMTK314,0,0,0,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0*29\r\n";

/// NMEA checksum: XOR of every byte between `$` and `*`.
pub fn nmea_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, b| acc ^ b)
}

/// Checks the `*hh` checksum of a full sentence.
pub fn checksum_matches(sentence: &[u8]) -> bool {
    let Some(star) = sentence.iter().rposition(|&b| b == b'*') else {
        return false;
    };
    let (Some(body), Some(hex)) = (sentence.get(1..star), sentence.get(star + 1..star + 3)) else {
        return false;
    };
    if !hex.iter().all(u8::is_ascii_hexdigit) {
        return false;
    }
    let Ok(hex) = core::str::from_utf8(hex) else {
        return false;
    };
    match u8::from_str_radix(hex, 16) {
        Ok(expected) => sentence.first() == Some(&b'$') && nmea_checksum(body) == expected,
        Err(_) => false,
    }
}
