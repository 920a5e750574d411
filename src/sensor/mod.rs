// src/sensor/mod.rs

// Chip drivers. Both sit on `common::bus::RegisterBus`.
pub mod barometer;
pub mod magnetometer;

// Carry-forward cache used by the telemetry tick.
pub mod reading;

// --- Public Re-exports ---
pub use barometer::{BaroMeasurement, Channel, Hp203b, Oversample};
pub use magnetometer::{
    MagConfig, Mode, OutputDataRate, OversampleRatio, Qmc5883l, Scale, StatusFlags,
};
pub use reading::LatestReading;
