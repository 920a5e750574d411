// src/telemetry/mod.rs

pub mod assembler;
pub mod packet;

pub use assembler::{request_tick, ImuSample, TelemetryAssembler, TelemetryTask, TickInputs, TxError};
pub use packet::{PacketError, TelemetryPacket, PACKET_LEN};

/// Folds the 8-byte flash unique id into the one-byte vehicle id.
pub fn vehicle_id_from_unique_id(unique_id: &[u8; 8]) -> u8 {
    unique_id.iter().fold(0, |acc, b| acc ^ b)
}
