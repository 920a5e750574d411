// src/common/hal_traits.rs

use super::error::BusError;
use core::fmt::Debug;
use core::time::Duration;

/// Synchronous read/write primitives over a shared two-wire bus.
///
/// Both sensor drivers sit on top of this trait, so a single mock covers all
/// driver tests. `timeout` bounds the wait for *each byte*; a transfer that
/// stalls part way through reports [`BusError::Timeout`].
///
/// A bus with several chips on it is handed to each session as a
/// `&critical_section::Mutex<RefCell<T>>` (see [`crate::common::bus`]).
pub trait BusTransport {
    /// Associated error type for non-timeout bus faults.
    type Error: Debug;

    /// Writes `bytes` to the device at `address`.
    ///
    /// Returns the number of bytes the device acknowledged.
    fn write_bytes(
        &mut self,
        address: u8,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<usize, BusError<Self::Error>>;

    /// Selects `register` on the device at `address`, then reads into `buffer`.
    ///
    /// The chips on this bus cannot be read without first writing a register
    /// selector, so the selector write is part of every read. Returns the number
    /// of bytes read.
    fn read_bytes(
        &mut self,
        address: u8,
        register: u8,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, BusError<Self::Error>>;
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    type Error = T::Error;

    #[inline]
    fn write_bytes(
        &mut self,
        address: u8,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<usize, BusError<Self::Error>> {
        T::write_bytes(self, address, bytes, timeout)
    }

    #[inline]
    fn read_bytes(
        &mut self,
        address: u8,
        register: u8,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, BusError<Self::Error>> {
        T::read_bytes(self, address, register, buffer, timeout)
    }
}

/// Packet-oriented radio transport. Exactly one begin/end pair per packet.
pub trait RadioLink {
    type Error: Debug;

    fn begin_packet(&mut self) -> Result<(), Self::Error>;

    /// Queues `bytes` into the open packet, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Self::Error>;

    /// Closes the open packet and hands it to the modem.
    fn end_packet(&mut self) -> Result<(), Self::Error>;
}

/// Kind tag attached to every record appended to persistent storage.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum RecordKind {
    /// A full telemetry packet, byte-identical to what went over the radio.
    Telemetry = 0,
    /// A compact position record.
    Position = 1,
}

/// Persistent record log (flash). Fire-and-forget: nothing is acknowledged.
pub trait RecordLog {
    fn append(&mut self, bytes: &[u8], kind: RecordKind);
}

/// Deferred work queue of the cooperative scheduler.
///
/// Interrupt handlers only ever enqueue; the work itself runs in task context.
pub trait TaskQueue<T> {
    /// Queues `task`. Returns `false` if the queue had no room.
    fn enqueue(&mut self, task: T) -> bool;
}

/// Monotonic time since boot.
pub trait Uptime {
    fn uptime_ms(&self) -> u32;
}

/// Non-blocking receive side of a serial port, as seen from its RX interrupt.
pub trait ByteSource {
    type Error: Debug;

    /// Returns `Err(nb::Error::WouldBlock)` when the receive FIFO is empty.
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;
}
