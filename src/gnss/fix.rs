// src/gnss/fix.rs

use nmea0183::{ParseResult, Parser};

/// Time of fix, UTC. Fractional seconds are dropped.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct UtcTime {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

/// The fields of a GGA sentence that go into telemetry.
///
/// Latitude and longitude keep the NMEA `ddmm.mmm` / `dddmm.mmm` form, scaled
/// by 1000 and signed (north and east positive): `3307.380,S` is `-3_307_380`.
/// Extra fraction digits are truncated toward zero. A default fix is all zeros,
/// which is what gets sent before the receiver has produced anything.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PositionFix {
    pub utc: UtcTime,
    pub latitude: i32,
    pub longitude: i32,
    pub satellites: u8,
}

/// Why a published sentence did not yield a fix.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixError {
    /// Bad checksum, bad field, or a sentence type the parser does not know.
    #[error("Malformed NMEA sentence")]
    Malformed,

    /// A valid sentence, but not GGA.
    #[error("Sentence is not GGA")]
    NotGga,

    /// A GGA sentence with empty position fields (receiver has no fix yet).
    #[error("GGA sentence carries no fix")]
    NoFix,

    /// No terminator reached.
    #[error("Incomplete sentence")]
    Incomplete,
}

impl PositionFix {
    /// Parses one complete sentence, `$` through `\r\n`.
    pub fn from_sentence(sentence: &[u8]) -> Result<Self, FixError> {
        let mut parser = Parser::new();
        for &byte in sentence {
            if let Some(result) = parser.parse_from_byte(byte) {
                return match result {
                    Ok(ParseResult::GGA(Some(gga))) => Ok(PositionFix {
                        utc: UtcTime {
                            hours: gga.time.hours,
                            minutes: gga.time.minutes,
                            seconds: gga.time.seconds as u8,
                        },
                        // The parser only hands out decimal degrees, so the
                        // coordinates come from the raw fields it has validated.
                        latitude: coordinate(sentence, LAT_FIELD)?,
                        longitude: coordinate(sentence, LNG_FIELD)?,
                        satellites: gga.sat_in_use,
                    }),
                    Ok(ParseResult::GGA(None)) => Err(FixError::NoFix),
                    Ok(_) => Err(FixError::NotGga),
                    Err(e) => {
                        log::debug!("NMEA parse error: {:?}", e);
                        Err(FixError::Malformed)
                    }
                };
            }
        }
        Err(FixError::Incomplete)
    }

    /// Compact little-endian log record:
    /// `time_ms:u32, lat:i32, lng:i32, satellites:u8, utc:[u8; 3]`.
    pub fn to_record(&self, time_ms: u32) -> [u8; POSITION_RECORD_LEN] {
        let mut record = [0u8; POSITION_RECORD_LEN];
        record[0..4].copy_from_slice(&time_ms.to_le_bytes());
        record[4..8].copy_from_slice(&self.latitude.to_le_bytes());
        record[8..12].copy_from_slice(&self.longitude.to_le_bytes());
        record[12] = self.satellites;
        record[13] = self.utc.hours;
        record[14] = self.utc.minutes;
        record[15] = self.utc.seconds;
        record
    }
}

/// Length of [`PositionFix::to_record`] output.
pub const POSITION_RECORD_LEN: usize = 16;

/// Comma-separated field index of the latitude value in GGA; its hemisphere follows.
const LAT_FIELD: usize = 2;
/// Field index of the longitude value; its hemisphere follows.
const LNG_FIELD: usize = 4;

/// Fraction digits kept by the fixed-point coordinate.
const COORD_FRACTION_DIGITS: u32 = 3;

/// `n`th comma-separated field between `$` and `*`.
fn field(sentence: &[u8], n: usize) -> Option<&[u8]> {
    let body = sentence.strip_prefix(b"$")?;
    let end = body.iter().position(|&b| b == b'*').unwrap_or(body.len());
    body[..end].split(|&b| b == b',').nth(n)
}

/// Signed raw coordinate at `index`, hemisphere taken from the next field.
fn coordinate(sentence: &[u8], index: usize) -> Result<i32, FixError> {
    let value = field(sentence, index)
        .and_then(scale_fixed)
        .ok_or(FixError::Malformed)?;
    match field(sentence, index + 1) {
        Some(b"N") | Some(b"E") => Ok(value),
        Some(b"S") | Some(b"W") => Ok(-value),
        _ => Err(FixError::Malformed),
    }
}

/// Parses an unsigned decimal such as `3307.380` into thousandths, truncating
/// any further digits.
fn scale_fixed(text: &[u8]) -> Option<i32> {
    let (whole, fraction) = match text.iter().position(|&b| b == b'.') {
        Some(dot) => (&text[..dot], &text[dot + 1..]),
        None => (text, &b""[..]),
    };
    if whole.is_empty() || !whole.iter().chain(fraction).all(u8::is_ascii_digit) {
        return None;
    }

    let mut value: i32 = 0;
    for &digit in whole {
        value = value.checked_mul(10)?.checked_add(i32::from(digit - b'0'))?;
    }
    for i in 0..COORD_FRACTION_DIGITS as usize {
        let digit = fraction.get(i).map_or(0, |&d| i32::from(d - b'0'));
        value = value.checked_mul(10)?.checked_add(digit)?;
    }
    Some(value)
}
