// src/common/timing.rs

use core::time::Duration;

// === Bus addresses (7-bit) ===

/// HP203B barometer, CSB pin low.
pub const HP203B_ADDRESS: u8 = 0x76;
/// QMC5883L magnetometer.
pub const QMC5883L_ADDRESS: u8 = 0x0D;

// === Bus timing ===

/// Default per-byte timeout for every bus transfer.
pub const BUS_BYTE_TIMEOUT: Duration = Duration::from_millis(1);

// === HP203B timing ===

/// Time the barometer needs after a soft reset before `INT_SRC` is meaningful.
pub const HP203B_RESET_SETTLE: Duration = Duration::from_millis(10);

/// Conversion time of a pressure+temperature measurement, indexed by
/// oversample setting (4096, 2048, 1024, 512, 256, 128).
/// Temperature-only conversions take half as long.
pub const HP203B_CONVERSION_US: [u32; 6] = [131_100, 65_600, 32_800, 16_400, 8_200, 4_100];

// === GNSS ===

/// Longest NMEA sentence kept by the line framer, `$` and `\r\n` included.
pub const SENTENCE_CAPACITY: usize = 80;
