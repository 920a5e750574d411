// src/telemetry/packet.rs

use crate::gnss::fix::UtcTime;

/// Encoded size of a [`TelemetryPacket`]. Packed, no padding.
pub const PACKET_LEN: usize = 40;

/// Error decoding a packet from raw bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("Packet length {got} does not match {expected}")]
    WrongLength { expected: usize, got: usize },
}

/// One radio telemetry record.
///
/// Wire layout, all multi-byte fields little-endian:
///
/// | offset | field          | type       |
/// |--------|----------------|------------|
/// | 0      | `seq_no`       | `u32`      |
/// | 4      | `vehicle_id`   | `u8`       |
/// | 5      | `state`        | ASCII `u8` |
/// | 6      | `time_ms`      | `u32`      |
/// | 10     | `utc` h/m/s    | `[u8; 3]`  |
/// | 13     | `latitude`     | `i32`      |
/// | 17     | `longitude`    | `i32`      |
/// | 21     | `satellites`   | `u8`       |
/// | 22     | `pressure`     | `u32`      |
/// | 26     | `temperature`  | `i16`      |
/// | 28     | `accel`        | `[i16; 3]` |
/// | 34     | `gyro`         | `[i16; 3]` |
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetryPacket {
    pub seq_no: u32,
    pub vehicle_id: u8,
    /// System state code, one ASCII character.
    pub state: u8,
    /// Milliseconds since boot.
    pub time_ms: u32,
    pub utc: UtcTime,
    /// NMEA `ddmm.mmm` × 1000, see [`PositionFix`](crate::gnss::PositionFix).
    pub latitude: i32,
    /// NMEA `ddmm.mmm` × 1000, see [`PositionFix`](crate::gnss::PositionFix).
    pub longitude: i32,
    pub satellites: u8,
    /// Pascals.
    pub pressure: u32,
    /// Centidegrees Celsius.
    pub temperature: i16,
    /// Raw accelerometer counts.
    pub accel: [i16; 3],
    /// Raw gyroscope counts.
    pub gyro: [i16; 3],
}

impl TelemetryPacket {
    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut out = [0u8; PACKET_LEN];
        let mut w = Writer { buf: &mut out, pos: 0 };
        w.put(&self.seq_no.to_le_bytes());
        w.put(&[self.vehicle_id, self.state]);
        w.put(&self.time_ms.to_le_bytes());
        w.put(&[self.utc.hours, self.utc.minutes, self.utc.seconds]);
        w.put(&self.latitude.to_le_bytes());
        w.put(&self.longitude.to_le_bytes());
        w.put(&[self.satellites]);
        w.put(&self.pressure.to_le_bytes());
        w.put(&self.temperature.to_le_bytes());
        for v in self.accel.iter().chain(self.gyro.iter()) {
            w.put(&v.to_le_bytes());
        }
        debug_assert_eq!(w.pos, PACKET_LEN);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let bytes: &[u8; PACKET_LEN] = bytes.try_into().map_err(|_| PacketError::WrongLength {
            expected: PACKET_LEN,
            got: bytes.len(),
        })?;
        let mut r = Reader { buf: bytes, pos: 0 };
        Ok(TelemetryPacket {
            seq_no: u32::from_le_bytes(r.take()),
            vehicle_id: r.byte(),
            state: r.byte(),
            time_ms: u32::from_le_bytes(r.take()),
            utc: UtcTime { hours: r.byte(), minutes: r.byte(), seconds: r.byte() },
            latitude: i32::from_le_bytes(r.take()),
            longitude: i32::from_le_bytes(r.take()),
            satellites: r.byte(),
            pressure: u32::from_le_bytes(r.take()),
            temperature: i16::from_le_bytes(r.take()),
            accel: [
                i16::from_le_bytes(r.take()),
                i16::from_le_bytes(r.take()),
                i16::from_le_bytes(r.take()),
            ],
            gyro: [
                i16::from_le_bytes(r.take()),
                i16::from_le_bytes(r.take()),
                i16::from_le_bytes(r.take()),
            ],
        })
    }
}

struct Writer<'b> {
    buf: &'b mut [u8; PACKET_LEN],
    pos: usize,
}

impl Writer<'_> {
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

/// Fixed-size reader. Callers read exactly `PACKET_LEN` bytes in total.
struct Reader<'b> {
    buf: &'b [u8; PACKET_LEN],
    pos: usize,
}

impl Reader<'_> {
    fn take<const W: usize>(&mut self) -> [u8; W] {
        let mut field = [0u8; W];
        field.copy_from_slice(&self.buf[self.pos..self.pos + W]);
        self.pos += W;
        field
    }

    fn byte(&mut self) -> u8 {
        let [b] = self.take::<1>();
        b
    }
}
