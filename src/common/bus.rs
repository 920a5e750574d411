// src/common/bus.rs

use super::error::{BusError, DriverError};
use super::hal_traits::BusTransport;
use core::cell::RefCell;
use core::time::Duration;
use critical_section::Mutex;
use embedded_hal::i2c::I2c;

/// A [`BusTransport`] bound to one chip: address and per-byte timeout.
///
/// This is the `write(register, bytes)` / `read(register, len)` capability both
/// drivers are written against. Every call checks the transferred byte count;
/// a short transfer is reported as [`DriverError::Generic`].
#[derive(Debug)]
pub struct RegisterBus<B> {
    bus: B,
    address: u8,
    timeout: Duration,
}

impl<B: BusTransport> RegisterBus<B> {
    pub const fn new(bus: B, address: u8, timeout: Duration) -> Self {
        RegisterBus { bus, address, timeout }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Gives the bus handle back.
    pub fn release(self) -> B {
        self.bus
    }

    /// Sends a single command byte.
    pub fn command(&mut self, command: u8) -> Result<(), DriverError> {
        self.write_exact(&[command])
    }

    /// Writes one 8-bit register as an addressed `[register, value]` write.
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), DriverError> {
        self.write_exact(&[register, value])
    }

    /// Selects `register` (or issues a read command) and fills `buffer` completely.
    pub fn read_register(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), DriverError> {
        let read = self
            .bus
            .read_bytes(self.address, register, buffer, self.timeout)?;
        if read == buffer.len() {
            Ok(())
        } else {
            Err(DriverError::Generic)
        }
    }

    /// Reads a single register byte.
    pub fn read_byte(&mut self, register: u8) -> Result<u8, DriverError> {
        let mut byte = [0u8; 1];
        self.read_register(register, &mut byte)?;
        Ok(byte[0])
    }

    fn write_exact(&mut self, bytes: &[u8]) -> Result<(), DriverError> {
        let written = self.bus.write_bytes(self.address, bytes, self.timeout)?;
        if written == bytes.len() {
            Ok(())
        } else {
            Err(DriverError::Generic)
        }
    }
}

/// Adapts an `embedded-hal` 1.0 blocking I2C peripheral to [`BusTransport`].
///
/// `embedded-hal` has no per-call timeout, so the `timeout` argument is not
/// forwarded; the HAL's own bus timeout applies and any HAL error (a timeout
/// included) is reported as [`BusError::Io`]. Reads use a repeated-start
/// write-read so the selector and the data phase cannot be split by another
/// bus master.
#[derive(Debug)]
pub struct HalBus<I> {
    i2c: I,
}

impl<I: I2c> HalBus<I> {
    pub fn new(i2c: I) -> Self {
        HalBus { i2c }
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> BusTransport for HalBus<I> {
    type Error = I::Error;

    fn write_bytes(
        &mut self,
        address: u8,
        bytes: &[u8],
        _timeout: Duration,
    ) -> Result<usize, BusError<Self::Error>> {
        self.i2c.write(address, bytes).map_err(BusError::Io)?;
        Ok(bytes.len())
    }

    fn read_bytes(
        &mut self,
        address: u8,
        register: u8,
        buffer: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, BusError<Self::Error>> {
        self.i2c
            .write_read(address, &[register], buffer)
            .map_err(BusError::Io)?;
        Ok(buffer.len())
    }
}

/// One physical bus shared by several driver sessions.
///
/// Each session holds a `&Mutex<RefCell<T>>` and borrows the bus only for the
/// duration of one transfer, inside a critical section, so at most one
/// transaction is in flight. Interrupts stay masked for that transfer.
///
/// ```ignore
/// let shared = Mutex::new(RefCell::new(HalBus::new(i2c)));
/// let mut baro = Hp203b::new(&shared);
/// let mut mag = Qmc5883l::new(&shared);
/// ```
impl<T: BusTransport> BusTransport for &Mutex<RefCell<T>> {
    type Error = T::Error;

    fn write_bytes(
        &mut self,
        address: u8,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<usize, BusError<Self::Error>> {
        critical_section::with(|cs| {
            self.borrow_ref_mut(cs)
                .write_bytes(address, bytes, timeout)
        })
    }

    fn read_bytes(
        &mut self,
        address: u8,
        register: u8,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, BusError<Self::Error>> {
        critical_section::with(|cs| {
            self.borrow_ref_mut(cs)
                .read_bytes(address, register, buffer, timeout)
        })
    }
}

/// Scripted register-file bus shared by every driver test.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use heapless::Vec;

    /// Injected failure.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum Fault {
        Timeout,
        Io,
        /// Transfer one byte less than asked.
        Short,
    }

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct MockIoError;

    /// Reads return consecutive bytes of `registers` starting at the selector, so
    /// burst reads see auto-increment and command reads see whatever was staged
    /// at the command byte. Writes of `[reg, values..]` store into the file.
    pub struct MockBus {
        pub registers: [u8; 256],
        pub writes: Vec<(u8, Vec<u8, 8>), 32>,
        pub reads: Vec<(u8, u8, usize), 32>,
        pub always: Option<Fault>,
        pub on_call: Option<(usize, Fault)>,
        pub calls: usize,
        pub last_timeout: Option<Duration>,
    }

    impl MockBus {
        pub fn new() -> Self {
            MockBus {
                registers: [0; 256],
                writes: Vec::new(),
                reads: Vec::new(),
                always: None,
                on_call: None,
                calls: 0,
                last_timeout: None,
            }
        }

        pub fn failing(fault: Fault) -> Self {
            let mut bus = Self::new();
            bus.always = Some(fault);
            bus
        }

        pub fn stage(&mut self, register: u8, bytes: &[u8]) {
            let start = register as usize;
            self.registers[start..start + bytes.len()].copy_from_slice(bytes);
        }

        /// Payload of every write, in order.
        pub fn written(&self) -> impl Iterator<Item = &[u8]> {
            self.writes.iter().map(|(_, bytes)| bytes.as_slice())
        }

        fn next_fault(&mut self) -> Option<Fault> {
            let call = self.calls;
            self.calls += 1;
            match self.on_call {
                Some((n, fault)) if n == call => Some(fault),
                _ => self.always,
            }
        }
    }

    impl BusTransport for MockBus {
        type Error = MockIoError;

        fn write_bytes(
            &mut self,
            address: u8,
            bytes: &[u8],
            timeout: Duration,
        ) -> Result<usize, BusError<Self::Error>> {
            self.last_timeout = Some(timeout);
            match self.next_fault() {
                Some(Fault::Timeout) => return Err(BusError::Timeout),
                Some(Fault::Io) => return Err(BusError::Io(MockIoError)),
                Some(Fault::Short) => return Ok(bytes.len().saturating_sub(1)),
                None => {}
            }
            let _ = self
                .writes
                .push((address, Vec::from_slice(bytes).unwrap_or_default()));
            if let Some((register, values)) = bytes.split_first() {
                let start = *register as usize;
                for (i, v) in values.iter().enumerate() {
                    if let Some(slot) = self.registers.get_mut(start + i) {
                        *slot = *v;
                    }
                }
            }
            Ok(bytes.len())
        }

        fn read_bytes(
            &mut self,
            address: u8,
            register: u8,
            buffer: &mut [u8],
            timeout: Duration,
        ) -> Result<usize, BusError<Self::Error>> {
            self.last_timeout = Some(timeout);
            let _ = self.reads.push((address, register, buffer.len()));
            match self.next_fault() {
                Some(Fault::Timeout) => return Err(BusError::Timeout),
                Some(Fault::Io) => return Err(BusError::Io(MockIoError)),
                Some(Fault::Short) => return Ok(buffer.len().saturating_sub(1)),
                None => {}
            }
            let start = register as usize;
            for (i, b) in buffer.iter_mut().enumerate() {
                *b = self.registers.get(start + i).copied().unwrap_or(0);
            }
            Ok(buffer.len())
        }
    }
}
