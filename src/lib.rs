// src/lib.rs

//! Sensor-and-telemetry core of a small flight/ground instrument.
//!
//! - [`sensor`]: HP203B barometer and QMC5883L magnetometer drivers over a
//!   shared two-wire bus ([`common::BusTransport`]).
//! - [`gnss`]: interrupt-driven NMEA line framer and GGA fix parsing.
//! - [`telemetry`]: the fixed 40-byte radio packet and the per-tick assembler
//!   that fuses sensor, position and system state into it.

#![no_std] // Specify no_std at the crate root

pub mod common;
pub mod gnss;
pub mod sensor;
pub mod telemetry;

// Re-export key types for convenience
pub use common::{BusTransport, DriverError};
pub use telemetry::{TelemetryAssembler, TelemetryPacket};
