// src/sensor/barometer.rs

//! HP203B barometric pressure/temperature/altitude sensor.
//!
//! The chip is driven by single-byte commands. A conversion is started with
//! `ADC_CVT`, then results are fetched with one of the `READ_*` commands, each
//! of which returns 20-bit big-endian values in three bytes. Values are kept as
//! integers: pascals, centidegrees and centimetres.

use crate::common::{
    bus::RegisterBus,
    error::DriverError,
    hal_traits::BusTransport,
    timing::{BUS_BYTE_TIMEOUT, HP203B_ADDRESS, HP203B_CONVERSION_US, HP203B_RESET_SETTLE},
};
use core::time::Duration;
use embedded_hal::delay::DelayNs;

// --- Commands ---
pub const CMD_RESET: u8 = 0x06;
pub const CMD_READ_PT: u8 = 0x10;
pub const CMD_READ_AT: u8 = 0x11;
pub const CMD_READ_P: u8 = 0x30;
pub const CMD_READ_A: u8 = 0x31;
pub const CMD_READ_T: u8 = 0x32;
pub const CMD_ADC_CVT: u8 = 0x40;
pub const CMD_READ_REG: u8 = 0x80;
pub const CMD_WRITE_REG: u8 = 0xC0;

// --- Registers ---
pub const REG_INT_SRC: u8 = 0x0D;

/// `INT_SRC` bit set once the chip has finished its power-on/reset sequence.
const INT_SRC_DEV_RDY: u8 = 1 << 6;

/// Bit position of the oversample rate within `ADC_CVT`.
const OSR_SHIFT: u8 = 2;

/// Register addresses are 6 bits wide.
const REG_ADDR_MASK: u8 = 0x3F;

/// Which quantities a conversion produces.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum Channel {
    PressureAndTemperature = 0x00,
    TemperatureOnly = 0x01,
}

/// Oversample rate. Higher rates are quieter and slower.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum Oversample {
    Osr4096 = 0x00,
    Osr2048 = 0x01,
    Osr1024 = 0x02,
    Osr512 = 0x03,
    Osr256 = 0x04,
    Osr128 = 0x05,
}

impl Oversample {
    /// Conversion time for `channel` at this rate.
    pub fn conversion_time(self, channel: Channel) -> Duration {
        let full = HP203B_CONVERSION_US[self as usize];
        let us = match channel {
            Channel::PressureAndTemperature => full,
            Channel::TemperatureOnly => full / 2,
        };
        Duration::from_micros(us as u64)
    }
}

/// Builds the `ADC_CVT` command byte.
pub const fn adc_command(channel: Channel, osr: Oversample) -> u8 {
    CMD_ADC_CVT | ((osr as u8) << OSR_SHIFT) | channel as u8
}

/// Pressure and temperature from one conversion.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BaroMeasurement {
    /// Pascals.
    pub pressure: u32,
    /// Centidegrees Celsius.
    pub temperature: i32,
}

/// A session with one HP203B on a bus.
#[derive(Debug)]
pub struct Hp203b<B> {
    regs: RegisterBus<B>,
}

impl<B: BusTransport> Hp203b<B> {
    /// Binds the driver to `bus` at the default address. No I/O is performed.
    pub fn new(bus: B) -> Self {
        Self::with_address(bus, HP203B_ADDRESS)
    }

    pub fn with_address(bus: B, address: u8) -> Self {
        Hp203b {
            regs: RegisterBus::new(bus, address, BUS_BYTE_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.regs.set_timeout(timeout);
        self
    }

    pub fn release(self) -> B {
        self.regs.release()
    }

    /// Soft-resets the chip. Registers return to their power-on values.
    pub fn reset(&mut self) -> Result<(), DriverError> {
        self.regs.command(CMD_RESET)
    }

    /// Checks the chip is present and behaves like an HP203B.
    ///
    /// Resets the chip, waits for it to settle (about 10 ms) and expects
    /// `DEV_RDY` in `INT_SRC`. A chip that answers but never reports ready is
    /// [`DriverError::BadChip`].
    pub fn self_test<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), DriverError> {
        self.reset()?;
        delay.delay_ms(HP203B_RESET_SETTLE.as_millis() as u32);

        let int_src = self.read_register(REG_INT_SRC)?;
        if int_src & INT_SRC_DEV_RDY == 0 {
            log::warn!("HP203B not ready after reset, INT_SRC={:#04x}", int_src);
            return Err(DriverError::BadChip);
        }
        Ok(())
    }

    /// Starts a conversion and returns how long to wait before reading results.
    pub fn start_measurement(
        &mut self,
        channel: Channel,
        osr: Oversample,
    ) -> Result<Duration, DriverError> {
        self.regs.command(adc_command(channel, osr))?;
        Ok(osr.conversion_time(channel))
    }

    /// Pressure in pascals from the last conversion.
    pub fn get_pressure(&mut self) -> Result<u32, DriverError> {
        let raw = self.read_triplet(CMD_READ_P)?;
        Ok(unsigned_20(raw))
    }

    /// Temperature in centidegrees from the last conversion.
    pub fn get_temperature(&mut self) -> Result<i32, DriverError> {
        let raw = self.read_triplet(CMD_READ_T)?;
        Ok(signed_20(raw))
    }

    /// Altitude in centimetres, computed by the chip from the last conversion.
    pub fn get_altitude(&mut self) -> Result<i32, DriverError> {
        let raw = self.read_triplet(CMD_READ_A)?;
        Ok(signed_20(raw))
    }

    /// Temperature and pressure in a single transfer.
    pub fn get_both(&mut self) -> Result<BaroMeasurement, DriverError> {
        let mut buf = [0u8; 6];
        self.regs.read_register(CMD_READ_PT, &mut buf)?;
        // Temperature comes first.
        Ok(BaroMeasurement {
            temperature: signed_20([buf[0], buf[1], buf[2]]),
            pressure: unsigned_20([buf[3], buf[4], buf[5]]),
        })
    }

    /// Altitude (cm) and temperature (centidegrees) in a single transfer.
    pub fn get_altitude_and_temperature(&mut self) -> Result<(i32, i32), DriverError> {
        let mut buf = [0u8; 6];
        self.regs.read_register(CMD_READ_AT, &mut buf)?;
        Ok((signed_20([buf[3], buf[4], buf[5]]), signed_20([buf[0], buf[1], buf[2]])))
    }

    /// Reads one of the chip's 6-bit-addressed configuration registers.
    pub fn read_register(&mut self, register: u8) -> Result<u8, DriverError> {
        self.regs.read_byte(CMD_READ_REG | (register & REG_ADDR_MASK))
    }

    /// Writes one of the chip's 6-bit-addressed configuration registers.
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), DriverError> {
        self.regs
            .write_register(CMD_WRITE_REG | (register & REG_ADDR_MASK), value)
    }

    fn read_triplet(&mut self, command: u8) -> Result<[u8; 3], DriverError> {
        let mut buf = [0u8; 3];
        self.regs.read_register(command, &mut buf)?;
        Ok(buf)
    }
}

fn raw_20(bytes: [u8; 3]) -> u32 {
    (u32::from(bytes[0] & 0x0F) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2])
}

fn unsigned_20(bytes: [u8; 3]) -> u32 {
    raw_20(bytes)
}

/// Sign-extends a 20-bit two's complement value.
fn signed_20(bytes: [u8; 3]) -> i32 {
    ((raw_20(bytes) << 12) as i32) >> 12
}
