// src/sensor/reading.rs

use crate::common::error::DriverError;

/// Last good value of a sensor, carried forward across failed reads.
///
/// A failed read for one tick never blanks the value: the telemetry packet
/// simply carries the previous sample again.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LatestReading<T> {
    value: T,
    fresh: bool,
    failures: u32,
}

impl<T: Copy> LatestReading<T> {
    pub const fn new(initial: T) -> Self {
        LatestReading { value: initial, fresh: false, failures: 0 }
    }

    /// Takes the outcome of a read. Only `Ok` replaces the stored value.
    pub fn update(&mut self, result: Result<T, DriverError>) {
        match result {
            Ok(value) => {
                self.value = value;
                self.fresh = true;
                self.failures = 0;
            }
            Err(e) => {
                self.fresh = false;
                self.failures = self.failures.saturating_add(1);
                log::warn!("sensor read failed ({}), keeping last value", e);
            }
        }
    }

    pub fn value(&self) -> T {
        self.value
    }

    /// `true` if the most recent update succeeded.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Failed reads since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }
}
