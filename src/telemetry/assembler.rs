// src/telemetry/assembler.rs

use super::packet::{TelemetryPacket, PACKET_LEN};
use crate::common::{
    hal_traits::{RadioLink, RecordKind, RecordLog, TaskQueue, Uptime},
    timing::SENTENCE_CAPACITY,
};
use crate::gnss::{fix::PositionFix, framer::FrameSlot};
use crate::sensor::{barometer::BaroMeasurement, reading::LatestReading};
use core::fmt::Debug;

/// Radio failure during one tick. The packet is dropped, never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TxError<E: Debug> {
    #[error("Radio refused to open a packet: {0:?}")]
    Begin(E),

    #[error("Radio write failed: {0:?}")]
    Write(E),

    #[error("Radio accepted {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Radio failed to close the packet: {0:?}")]
    End(E),
}

/// Token the tick interrupt puts on the scheduler's queue.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TelemetryTask;

/// Interrupt side of the periodic tick: only enqueues, never assembles.
///
/// Returns `false` if the queue was full; that tick is skipped.
pub fn request_tick<Q: TaskQueue<TelemetryTask>>(queue: &mut Q) -> bool {
    queue.enqueue(TelemetryTask)
}

/// Latest inertial sample, raw counts.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ImuSample {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
}

/// Everything the assembler takes from outside the GNSS path for one tick.
///
/// Sensor values are the caches the sampling tasks keep up to date; a read that
/// failed since the last tick leaves the previous value in place.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TickInputs {
    /// System state code, one ASCII character.
    pub state: u8,
    pub baro: LatestReading<BaroMeasurement>,
    pub imu: LatestReading<ImuSample>,
}

/// Open radio packet. Closing is guaranteed: either [`finish`](Self::finish)
/// is called or the packet is closed on drop.
struct PacketScope<'r, R: RadioLink> {
    radio: &'r mut R,
    open: bool,
}

impl<'r, R: RadioLink> PacketScope<'r, R> {
    fn begin(radio: &'r mut R) -> Result<Self, TxError<R::Error>> {
        radio.begin_packet().map_err(TxError::Begin)?;
        Ok(PacketScope { radio, open: true })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TxError<R::Error>> {
        let written = self.radio.write(bytes).map_err(TxError::Write)?;
        if written != bytes.len() {
            return Err(TxError::ShortWrite { written, expected: bytes.len() });
        }
        Ok(())
    }

    fn finish(mut self) -> Result<(), TxError<R::Error>> {
        self.open = false;
        self.radio.end_packet().map_err(TxError::End)
    }
}

impl<R: RadioLink> Drop for PacketScope<'_, R> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.radio.end_packet() {
                log::warn!("radio end_packet failed while unwinding: {:?}", e);
            }
        }
    }
}

/// Builds and sends one telemetry packet per scheduler tick.
///
/// Delivery is at most once, latest wins: a packet the radio rejects is simply
/// superseded by the next tick's.
pub struct TelemetryAssembler<'a, const N: usize = SENTENCE_CAPACITY> {
    frames: &'a FrameSlot<N>,
    vehicle_id: u8,
    seq_no: u32,
    seen_generation: u32,
    fix: PositionFix,
}

impl<'a, const N: usize> TelemetryAssembler<'a, N> {
    pub fn new(frames: &'a FrameSlot<N>, vehicle_id: u8) -> Self {
        TelemetryAssembler {
            frames,
            vehicle_id,
            seq_no: 0,
            seen_generation: 0,
            fix: PositionFix::default(),
        }
    }

    /// Sequence number the next packet will carry.
    pub fn next_seq_no(&self) -> u32 {
        self.seq_no
    }

    /// Position carried by the most recent packet.
    pub fn last_fix(&self) -> PositionFix {
        self.fix
    }

    /// Runs one tick: refresh the fix, encode, transmit, log.
    ///
    /// The packet and a position record go to `log` whether or not the radio
    /// accepted the packet. The encoded packet is returned on success.
    pub fn run_tick<C, R, L>(
        &mut self,
        inputs: &TickInputs,
        clock: &C,
        radio: &mut R,
        log: &mut L,
    ) -> Result<TelemetryPacket, TxError<R::Error>>
    where
        C: Uptime,
        R: RadioLink,
        L: RecordLog,
    {
        self.refresh_fix();

        let time_ms = clock.uptime_ms();
        let packet = self.assemble(inputs, time_ms);
        let bytes = packet.encode();
        self.seq_no = self.seq_no.wrapping_add(1);

        let sent = Self::transmit(radio, &bytes);
        if let Err(e) = &sent {
            log::warn!("telemetry packet {} dropped: {}", packet.seq_no, e);
        } else {
            log::trace!(
                "telemetry packet {} sent, {} sats, {} Pa",
                packet.seq_no,
                packet.satellites,
                packet.pressure
            );
        }

        log.append(&bytes, RecordKind::Telemetry);
        log.append(&self.fix.to_record(time_ms), RecordKind::Position);

        sent.map(|()| packet)
    }

    fn assemble(&self, inputs: &TickInputs, time_ms: u32) -> TelemetryPacket {
        if !inputs.baro.is_fresh() {
            log::debug!(
                "barometer stale for {} reads, resending last value",
                inputs.baro.consecutive_failures()
            );
        }
        let baro = inputs.baro.value();
        let imu = inputs.imu.value();
        TelemetryPacket {
            seq_no: self.seq_no,
            vehicle_id: self.vehicle_id,
            state: inputs.state,
            time_ms,
            utc: self.fix.utc,
            latitude: self.fix.latitude,
            longitude: self.fix.longitude,
            satellites: self.fix.satellites,
            pressure: baro.pressure,
            temperature: saturate_i16(baro.temperature),
            accel: imu.accel,
            gyro: imu.gyro,
        }
    }

    /// Parses the published sentence if it is new. Keeps the last good fix
    /// when there is nothing new or the new sentence does not parse.
    fn refresh_fix(&mut self) {
        let Some((generation, frame)) = self.frames.latest() else {
            return;
        };
        if generation == self.seen_generation {
            log::debug!("no new GGA sentence, reusing last fix");
            return;
        }
        self.seen_generation = generation;

        match PositionFix::from_sentence(frame.as_bytes()) {
            Ok(fix) => self.fix = fix,
            Err(e) => log::debug!("GGA sentence rejected ({}), reusing last fix", e),
        }
    }

    fn transmit<R: RadioLink>(
        radio: &mut R,
        bytes: &[u8; PACKET_LEN],
    ) -> Result<(), TxError<R::Error>> {
        let mut scope = PacketScope::begin(radio)?;
        scope.write(bytes)?;
        scope.finish()
    }
}

fn saturate_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::DriverError;
    use crate::gnss::framer::LineFramer;
    use heapless::Vec;

    const SYDNEY: &[u8] = b"$GPGGA,010203,3307.380,S,15127.360,E,1,06,0.9,45.0,M,20.0,M,,*6A\r\n";
    const MUNICH: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Call {
        Begin,
        Write(usize),
        End,
    }

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    struct RadioFault;

    #[derive(Default)]
    struct MockRadio {
        calls: Vec<Call, 16>,
        fail_begin: bool,
        fail_write: bool,
        short_write: bool,
        last: Vec<u8, 64>,
    }

    impl RadioLink for MockRadio {
        type Error = RadioFault;

        fn begin_packet(&mut self) -> Result<(), RadioFault> {
            let _ = self.calls.push(Call::Begin);
            if self.fail_begin { Err(RadioFault) } else { Ok(()) }
        }

        fn write(&mut self, bytes: &[u8]) -> Result<usize, RadioFault> {
            let _ = self.calls.push(Call::Write(bytes.len()));
            if self.fail_write {
                return Err(RadioFault);
            }
            self.last.clear();
            let _ = self.last.extend_from_slice(bytes);
            Ok(if self.short_write { bytes.len() - 1 } else { bytes.len() })
        }

        fn end_packet(&mut self) -> Result<(), RadioFault> {
            let _ = self.calls.push(Call::End);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockLog {
        records: Vec<(RecordKind, usize), 16>,
    }

    impl RecordLog for MockLog {
        fn append(&mut self, bytes: &[u8], kind: RecordKind) {
            let _ = self.records.push((kind, bytes.len()));
        }
    }

    struct FixedClock(u32);

    impl Uptime for FixedClock {
        fn uptime_ms(&self) -> u32 {
            self.0
        }
    }

    fn inputs() -> TickInputs {
        let mut inputs = TickInputs { state: b'R', ..Default::default() };
        inputs.baro.update(Ok(BaroMeasurement { pressure: 101_325, temperature: 2150 }));
        inputs.imu.update(Ok(ImuSample { accel: [1, 2, 3], gyro: [4, 5, 6] }));
        inputs
    }

    #[test]
    fn test_tick_sends_fused_packet() {
        let slot: FrameSlot = FrameSlot::new();
        let mut framer = LineFramer::new(&slot);
        framer.feed(SYDNEY);

        let mut assembler = TelemetryAssembler::new(&slot, 3);
        let mut radio = MockRadio::default();
        let mut log = MockLog::default();

        let packet = assembler
            .run_tick(&inputs(), &FixedClock(5_000), &mut radio, &mut log)
            .unwrap();

        assert_eq!(packet.seq_no, 0);
        assert_eq!(packet.vehicle_id, 3);
        assert_eq!(packet.state, b'R');
        assert_eq!(packet.time_ms, 5_000);
        assert_eq!(packet.latitude, -3_307_380);
        assert_eq!(packet.longitude, 15_127_360);
        assert_eq!(packet.satellites, 6);
        assert_eq!(packet.pressure, 101_325);
        assert_eq!(packet.temperature, 2150);
        assert_eq!(packet.gyro, [4, 5, 6]);

        assert_eq!(radio.calls.as_slice(), &[Call::Begin, Call::Write(PACKET_LEN), Call::End]);
        assert_eq!(TelemetryPacket::decode(&radio.last), Ok(packet));
        assert_eq!(
            log.records.as_slice(),
            &[(RecordKind::Telemetry, PACKET_LEN), (RecordKind::Position, 16)]
        );
        assert_eq!(assembler.next_seq_no(), 1);
    }

    #[test]
    fn test_stale_fix_reused_until_new_sentence() {
        let slot: FrameSlot = FrameSlot::new();
        let mut framer = LineFramer::new(&slot);
        let mut assembler = TelemetryAssembler::new(&slot, 1);
        let mut radio = MockRadio::default();
        let mut log = MockLog::default();
        let clock = FixedClock(0);

        // Nothing received yet: zeros.
        let p0 = assembler.run_tick(&inputs(), &clock, &mut radio, &mut log).unwrap();
        assert_eq!(p0.latitude, 0);
        assert_eq!(p0.satellites, 0);

        framer.feed(SYDNEY);
        let p1 = assembler.run_tick(&inputs(), &clock, &mut radio, &mut log).unwrap();
        let p2 = assembler.run_tick(&inputs(), &clock, &mut radio, &mut log).unwrap();
        assert_eq!(p1.latitude, -3_307_380);
        assert_eq!(p2.latitude, -3_307_380);
        assert_eq!((p1.seq_no, p2.seq_no), (1, 2));

        framer.feed(MUNICH);
        let p3 = assembler.run_tick(&inputs(), &clock, &mut radio, &mut log).unwrap();
        assert_eq!(p3.latitude, 4_807_038);
        assert_eq!(assembler.last_fix().satellites, 8);
    }

    #[test]
    fn test_unparseable_sentence_keeps_last_fix() {
        let slot: FrameSlot = FrameSlot::new();
        let mut framer = LineFramer::new(&slot);
        let mut assembler = TelemetryAssembler::new(&slot, 1);
        let mut radio = MockRadio::default();
        let mut log = MockLog::default();

        framer.feed(SYDNEY);
        assembler.run_tick(&inputs(), &FixedClock(0), &mut radio, &mut log).unwrap();

        // Bad checksum.
        framer.feed(b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*00\r\n");
        let packet = assembler.run_tick(&inputs(), &FixedClock(0), &mut radio, &mut log).unwrap();
        assert_eq!(packet.latitude, -3_307_380);
    }

    #[test]
    fn test_write_failure_still_ends_packet() {
        let slot: FrameSlot = FrameSlot::new();
        let mut assembler = TelemetryAssembler::new(&slot, 1);
        let mut radio = MockRadio { fail_write: true, ..Default::default() };
        let mut log = MockLog::default();

        let result = assembler.run_tick(&inputs(), &FixedClock(0), &mut radio, &mut log);
        assert_eq!(result, Err(TxError::Write(RadioFault)));
        assert_eq!(radio.calls.as_slice(), &[Call::Begin, Call::Write(PACKET_LEN), Call::End]);
        // Logged anyway, and the next packet moves on.
        assert_eq!(log.records.len(), 2);
        assert_eq!(assembler.next_seq_no(), 1);
    }

    #[test]
    fn test_short_write_is_an_error_and_ends_packet() {
        let slot: FrameSlot = FrameSlot::new();
        let mut assembler = TelemetryAssembler::new(&slot, 1);
        let mut radio = MockRadio { short_write: true, ..Default::default() };
        let mut log = MockLog::default();

        let result = assembler.run_tick(&inputs(), &FixedClock(0), &mut radio, &mut log);
        assert_eq!(result, Err(TxError::ShortWrite { written: 39, expected: 40 }));
        assert_eq!(radio.calls.last(), Some(&Call::End));
    }

    #[test]
    fn test_begin_failure_opens_nothing() {
        let slot: FrameSlot = FrameSlot::new();
        let mut assembler = TelemetryAssembler::new(&slot, 1);
        let mut radio = MockRadio { fail_begin: true, ..Default::default() };
        let mut log = MockLog::default();

        let result = assembler.run_tick(&inputs(), &FixedClock(0), &mut radio, &mut log);
        assert_eq!(result, Err(TxError::Begin(RadioFault)));
        assert_eq!(radio.calls.as_slice(), &[Call::Begin]);
    }

    #[test]
    fn test_failed_sensor_read_carries_last_value() {
        let slot: FrameSlot = FrameSlot::new();
        let mut assembler = TelemetryAssembler::new(&slot, 1);
        let mut radio = MockRadio::default();
        let mut log = MockLog::default();
        let mut inputs = inputs();

        inputs.baro.update(Err(DriverError::Timeout));
        inputs.imu.update(Err(DriverError::Generic));
        let packet = assembler.run_tick(&inputs, &FixedClock(0), &mut radio, &mut log).unwrap();
        assert_eq!(packet.pressure, 101_325);
        assert_eq!(packet.temperature, 2150);
        assert_eq!(packet.accel, [1, 2, 3]);

        inputs.baro.update(Ok(BaroMeasurement { pressure: 99_000, temperature: -500 }));
        let packet = assembler.run_tick(&inputs, &FixedClock(0), &mut radio, &mut log).unwrap();
        assert_eq!(packet.pressure, 99_000);
        assert_eq!(packet.temperature, -500);
        assert_eq!(packet.gyro, [4, 5, 6]);
    }

    #[test]
    fn test_temperature_saturates() {
        assert_eq!(saturate_i16(40_000), i16::MAX);
        assert_eq!(saturate_i16(-40_000), i16::MIN);
        assert_eq!(saturate_i16(-1050), -1050);
    }

    struct Queue {
        tasks: Vec<TelemetryTask, 2>,
    }

    impl TaskQueue<TelemetryTask> for Queue {
        fn enqueue(&mut self, task: TelemetryTask) -> bool {
            self.tasks.push(task).is_ok()
        }
    }

    #[test]
    fn test_request_tick_only_enqueues() {
        let mut queue = Queue { tasks: Vec::new() };
        assert!(request_tick(&mut queue));
        assert!(request_tick(&mut queue));
        // Full: the tick is skipped, not queued.
        assert!(!request_tick(&mut queue));
        assert_eq!(queue.tasks.len(), 2);
    }
}
