// src/sensor/magnetometer.rs

//! QMC5883L three-axis magnetometer.
//!
//! The chip only auto-increments its register pointer across the X/Y/Z output
//! block. Control registers and the two temperature bytes each need their own
//! addressed transfer.

use crate::common::{
    bus::RegisterBus,
    error::{worst_of, DriverError},
    hal_traits::BusTransport,
    timing::{BUS_BYTE_TIMEOUT, QMC5883L_ADDRESS},
};
use core::time::Duration;

// --- Registers ---
pub const REG_X_LSB: u8 = 0x00;
pub const REG_STATUS: u8 = 0x06;
pub const REG_TEMP_LSB: u8 = 0x07;
pub const REG_TEMP_MSB: u8 = 0x08;
pub const REG_CONTROL1: u8 = 0x09;
pub const REG_CONTROL2: u8 = 0x0A;
pub const REG_SET_RESET: u8 = 0x0B;

// --- Control 1 layout ---
const MODE_SHIFT: u8 = 0;
const ODR_SHIFT: u8 = 2;
const SCALE_SHIFT: u8 = 4;
const OSR_SHIFT: u8 = 6;
/// Upper bit of the 2-bit mode and scale fields; no valid setting uses them.
pub const CONTROL1_RESERVED: u8 = 0x22;

// --- Control 2 layout ---
const INT_ENB_BIT: u8 = 0;
const ROL_PNT_BIT: u8 = 6;
const SOFT_RST_BIT: u8 = 7;

// --- Status layout ---
const DRDY_BIT: u8 = 0;
const DOVL_BIT: u8 = 1;
const DSKIP_BIT: u8 = 2;

/// Recommended SET/RESET period.
const SET_RESET_PERIOD: u8 = 0x01;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum Mode {
    Standby = 0,
    Continuous = 1,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum OutputDataRate {
    Hz10 = 0,
    Hz50 = 1,
    Hz100 = 2,
    Hz200 = 3,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum OversampleRatio {
    Osr512 = 0,
    Osr256 = 1,
    Osr128 = 2,
    Osr64 = 3,
}

/// Full-scale field range.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum Scale {
    Gauss2 = 0,
    Gauss8 = 1,
}

/// Complete chip configuration, spread over control registers 1 and 2.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MagConfig {
    pub mode: Mode,
    pub output_data_rate: OutputDataRate,
    pub oversample: OversampleRatio,
    pub scale: Scale,
    pub pointer_rollover: bool,
    pub interrupt_enable: bool,
}

impl Default for MagConfig {
    fn default() -> Self {
        MagConfig {
            mode: Mode::Continuous,
            output_data_rate: OutputDataRate::Hz50,
            oversample: OversampleRatio::Osr512,
            scale: Scale::Gauss8,
            pointer_rollover: false,
            interrupt_enable: false,
        }
    }
}

impl MagConfig {
    /// Packs the configuration into `[control1, control2]`.
    pub fn to_registers(&self) -> [u8; 2] {
        let control1 = (self.mode as u8) << MODE_SHIFT
            | (self.output_data_rate as u8) << ODR_SHIFT
            | (self.scale as u8) << SCALE_SHIFT
            | (self.oversample as u8) << OSR_SHIFT;
        let control2 = u8::from(self.pointer_rollover) << ROL_PNT_BIT
            | u8::from(self.interrupt_enable) << INT_ENB_BIT;
        [control1, control2]
    }

    /// Decodes `[control1, control2]`.
    ///
    /// Fails with [`DriverError::InvalidConfig`] if any reserved bit of
    /// control 1 is set, whatever the other bits hold.
    pub fn from_registers(registers: [u8; 2]) -> Result<Self, DriverError> {
        let [control1, control2] = registers;
        if control1 & CONTROL1_RESERVED != 0 {
            return Err(DriverError::InvalidConfig);
        }

        let mode = match (control1 >> MODE_SHIFT) & 1 {
            0 => Mode::Standby,
            _ => Mode::Continuous,
        };
        let output_data_rate = match (control1 >> ODR_SHIFT) & 3 {
            0 => OutputDataRate::Hz10,
            1 => OutputDataRate::Hz50,
            2 => OutputDataRate::Hz100,
            _ => OutputDataRate::Hz200,
        };
        let scale = match (control1 >> SCALE_SHIFT) & 1 {
            0 => Scale::Gauss2,
            _ => Scale::Gauss8,
        };
        let oversample = match (control1 >> OSR_SHIFT) & 3 {
            0 => OversampleRatio::Osr512,
            1 => OversampleRatio::Osr256,
            2 => OversampleRatio::Osr128,
            _ => OversampleRatio::Osr64,
        };

        Ok(MagConfig {
            mode,
            output_data_rate,
            oversample,
            scale,
            pointer_rollover: control2 & (1 << ROL_PNT_BIT) != 0,
            interrupt_enable: control2 & (1 << INT_ENB_BIT) != 0,
        })
    }
}

/// Decoded status register.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct StatusFlags {
    pub data_ready: bool,
    pub data_overflow: bool,
    /// Set when a sample was skipped because the output was not read in time.
    pub data_skip: bool,
}

impl StatusFlags {
    pub fn from_bits(status: u8) -> Self {
        StatusFlags {
            data_ready: status & (1 << DRDY_BIT) != 0,
            data_overflow: status & (1 << DOVL_BIT) != 0,
            data_skip: status & (1 << DSKIP_BIT) != 0,
        }
    }
}

/// A session with one QMC5883L on a bus.
///
/// Caches the last configuration that was confirmed written in full.
#[derive(Debug)]
pub struct Qmc5883l<B> {
    regs: RegisterBus<B>,
    config: Option<MagConfig>,
}

impl<B: BusTransport> Qmc5883l<B> {
    /// Binds the driver to `bus` at the default address. No I/O is performed.
    pub fn new(bus: B) -> Self {
        Self::with_address(bus, QMC5883L_ADDRESS)
    }

    pub fn with_address(bus: B, address: u8) -> Self {
        Qmc5883l {
            regs: RegisterBus::new(bus, address, BUS_BYTE_TIMEOUT),
            config: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.regs.set_timeout(timeout);
        self
    }

    pub fn release(self) -> B {
        self.regs.release()
    }

    /// Last configuration successfully applied by [`set_config`](Self::set_config).
    pub fn config(&self) -> Option<MagConfig> {
        self.config
    }

    /// Programs the SET/RESET period register, as the datasheet asks for after power-up.
    pub fn init(&mut self) -> Result<(), DriverError> {
        self.regs.write_register(REG_SET_RESET, SET_RESET_PERIOD)
    }

    /// Soft reset. All registers, including the cached configuration, go back to defaults.
    pub fn soft_reset(&mut self) -> Result<(), DriverError> {
        self.regs.write_register(REG_CONTROL2, 1 << SOFT_RST_BIT)?;
        self.config = None;
        Ok(())
    }

    /// Writes both control registers.
    ///
    /// The cache is updated only if both writes transferred every byte;
    /// otherwise the worse of the two errors is returned.
    pub fn set_config(&mut self, config: MagConfig) -> Result<(), DriverError> {
        let [control1, control2] = config.to_registers();
        let first = self.regs.write_register(REG_CONTROL1, control1);
        let second = self.regs.write_register(REG_CONTROL2, control2);
        worst_of(first, second)?;
        self.config = Some(config);
        Ok(())
    }

    /// Reads and decodes the live configuration from the chip.
    pub fn get_config(&mut self) -> Result<MagConfig, DriverError> {
        let first = self.regs.read_byte(REG_CONTROL1);
        let second = self.regs.read_byte(REG_CONTROL2);
        let (control1, control2) = worst_of(first, second)?;
        MagConfig::from_registers([control1, control2])
    }

    /// The chip has no real self-test; this checks it answers and is sampling.
    pub fn self_test(&mut self) -> Result<(), DriverError> {
        match self.get_config()?.mode {
            Mode::Continuous => Ok(()),
            Mode::Standby => Err(DriverError::Standby),
        }
    }

    pub fn get_status(&mut self) -> Result<StatusFlags, DriverError> {
        Ok(StatusFlags::from_bits(self.regs.read_byte(REG_STATUS)?))
    }

    /// Raw field vector `[x, y, z]`, read as one 6-byte burst.
    pub fn get_vector(&mut self) -> Result<[i16; 3], DriverError> {
        let mut buf = [0u8; 6];
        self.regs.read_register(REG_X_LSB, &mut buf)?;
        Ok([
            i16::from_le_bytes([buf[0], buf[1]]),
            i16::from_le_bytes([buf[2], buf[3]]),
            i16::from_le_bytes([buf[4], buf[5]]),
        ])
    }

    /// Raw die temperature. Only the relative value is meaningful.
    pub fn get_temperature(&mut self) -> Result<i16, DriverError> {
        let lsb = self.regs.read_byte(REG_TEMP_LSB);
        let msb = self.regs.read_byte(REG_TEMP_MSB);
        let (lsb, msb) = worst_of(lsb, msb)?;
        Ok(i16::from_le_bytes([lsb, msb]))
    }
}
