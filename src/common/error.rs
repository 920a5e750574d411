// src/common/error.rs

use core::fmt::Debug;

/// Failure reported by a [`BusTransport`](super::hal_traits::BusTransport).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BusError<E = ()>
where
    E: Debug,
{
    /// A byte was not clocked within the per-byte timeout.
    #[error("Bus transfer timed out")]
    Timeout,

    /// Underlying I/O error from the HAL implementation (NACK, arbitration loss, ...).
    #[error("Bus I/O error: {0:?}")]
    Io(E),
}

/// Error taxonomy shared by both sensor drivers.
///
/// Drivers never retry. Every bus fault that is not a timeout collapses to
/// [`DriverError::Generic`], including transfers that moved fewer bytes than asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// A bus operation exceeded its timeout.
    #[error("Bus operation timed out")]
    Timeout,

    /// Any other communication anomaly, including byte-count mismatches.
    #[error("Bus communication failed")]
    Generic,

    /// The barometer answered, but not the way the expected chip does.
    #[error("Chip response inconsistent with the expected device")]
    BadChip,

    /// The magnetometer reports reserved control bits set.
    #[error("Sensor configuration register holds an invalid value")]
    InvalidConfig,

    /// The magnetometer is reachable and configured but not sampling.
    #[error("Sensor is in standby")]
    Standby,
}

impl DriverError {
    /// Stable numeric code. More negative means more severe.
    pub const fn code(&self) -> i8 {
        match self {
            DriverError::Timeout => -1,
            DriverError::Generic => -2,
            DriverError::BadChip => -3,
            DriverError::InvalidConfig => -4,
            DriverError::Standby => -5,
        }
    }

    /// Picks the more severe of two errors (numerically smaller code wins).
    pub fn worst(self, other: DriverError) -> DriverError {
        if other.code() < self.code() {
            other
        } else {
            self
        }
    }
}

/// Combines the results of a two-part operation.
///
/// Returns both values if both parts succeeded, otherwise the worst of the
/// errors that occurred.
pub fn worst_of<A, B>(
    first: Result<A, DriverError>,
    second: Result<B, DriverError>,
) -> Result<(A, B), DriverError> {
    match (first, second) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Err(a), Err(b)) => Err(a.worst(b)),
    }
}

impl<E: Debug> From<BusError<E>> for DriverError {
    fn from(e: BusError<E>) -> Self {
        match e {
            BusError::Timeout => DriverError::Timeout,
            BusError::Io(inner) => {
                log::debug!("bus fault collapsed to generic error: {:?}", inner);
                DriverError::Generic
            }
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_mapping() {
        assert_eq!(DriverError::from(BusError::<()>::Timeout), DriverError::Timeout);
        assert_eq!(DriverError::from(BusError::Io(42u8)), DriverError::Generic);
    }

    #[test]
    fn test_worst_prefers_generic_over_timeout() {
        assert_eq!(DriverError::Timeout.worst(DriverError::Generic), DriverError::Generic);
        assert_eq!(DriverError::Generic.worst(DriverError::Timeout), DriverError::Generic);
        assert_eq!(DriverError::Timeout.worst(DriverError::Timeout), DriverError::Timeout);
    }

    #[test]
    fn test_worst_of_results() {
        assert_eq!(worst_of::<u8, u8>(Ok(1), Ok(2)), Ok((1, 2)));
        assert_eq!(worst_of::<u8, u8>(Err(DriverError::Timeout), Ok(2)), Err(DriverError::Timeout));
        assert_eq!(worst_of::<u8, u8>(Ok(1), Err(DriverError::Generic)), Err(DriverError::Generic));
        assert_eq!(
            worst_of::<u8, u8>(Err(DriverError::Timeout), Err(DriverError::Generic)),
            Err(DriverError::Generic)
        );
    }

    #[test]
    fn test_codes_are_distinct() {
        let all = [
            DriverError::Timeout,
            DriverError::Generic,
            DriverError::BadChip,
            DriverError::InvalidConfig,
            DriverError::Standby,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }
}
