// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod bus;
pub mod error;
pub mod hal_traits;
pub mod timing;

// --- Re-export key types/traits/functions for easier access ---

// From bus.rs
pub use bus::{HalBus, RegisterBus};

// From error.rs
pub use error::{worst_of, BusError, DriverError};

// From hal_traits.rs
pub use hal_traits::{
    BusTransport, ByteSource, RadioLink, RecordKind, RecordLog, TaskQueue, Uptime,
};
