//! Unified error types for the BrewGuard controller.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform.  None of these are fatal to the
//! process: the loop degrades to actuators-off and keeps running, and every
//! variant ends up in the human-readable status string and the event log.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The authoritative sensor has not reported within the freshness window.
    /// Drives `SafetyShutdown`; recovers on its own when the sensor returns.
    SensorStale {
        sensor_id: Option<String>,
        age_secs: Option<u64>,
    },
    /// A device command failed or timed out.  Retried every tick.
    DeviceCommand(DeviceError),
    /// Limits are inconsistent.  Fatal for the current tick only.
    InvalidConfiguration(String),
    /// An actuator appears to move temperature the wrong way.  Advisory.
    AnomalyDetected { actuator_id: String, delta_f: f64 },
    /// Persisted config was corrupted or partially written.  Absorbed by the
    /// merge guard in favour of the in-memory values.
    PersistenceCorruption(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorStale { sensor_id, age_secs } => {
                match sensor_id {
                    Some(id) => write!(f, "sensor '{id}' is stale")?,
                    None => write!(f, "no fresh sensor available")?,
                }
                if let Some(age) = age_secs {
                    write!(f, " (last reading {age}s ago)")?;
                }
                Ok(())
            }
            Self::DeviceCommand(e) => write!(f, "device: {e}"),
            Self::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::AnomalyDetected {
                actuator_id,
                delta_f,
            } => write!(
                f,
                "actuator '{actuator_id}' moved temperature {delta_f:+.1}\u{00b0}F the wrong way"
            ),
            Self::PersistenceCorruption(msg) => write!(f, "persisted config corrupted: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Device errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`PlugPort`](crate::app::ports::PlugPort) or
/// synthesized by the dispatcher worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device did not answer within the round-trip timeout.
    Timeout,
    /// The device could not be reached (wake probe failed, connection refused).
    Unreachable(String),
    /// The device answered but rejected the request.
    Rejected(String),
    /// The verification read disagrees with the requested state.
    VerifyMismatch { requested: bool, observed: bool },
    /// The command never reached the worker (queue full or worker gone).
    NotDispatched(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "device round trip timed out"),
            Self::Unreachable(msg) => write!(f, "device unreachable: {msg}"),
            Self::Rejected(msg) => write!(f, "device rejected command: {msg}"),
            Self::VerifyMismatch {
                requested,
                observed,
            } => write!(
                f,
                "verify mismatch: requested {} but device reports {}",
                on_off(*requested),
                on_off(*observed)
            ),
            Self::NotDispatched(msg) => write!(f, "command not dispatched: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        Self::DeviceCommand(e)
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

// ---------------------------------------------------------------------------
// Sensor ingestion errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Sensor id was empty.
    EmptyId,
    /// Sensor id exceeds the registry's fixed id capacity.
    IdTooLong,
    /// Reading is NaN or infinite.
    NonFiniteValue,
    /// Sample is stamped further ahead of the receiving clock than the
    /// allowed skew.
    FutureTimestamp { timestamp: u64, now: u64 },
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "sensor id is empty"),
            Self::IdTooLong => write!(f, "sensor id too long"),
            Self::NonFiniteValue => write!(f, "reading is not a finite number"),
            Self::FutureTimestamp { timestamp, now } => {
                write!(f, "sample stamped {}s in the future", timestamp.saturating_sub(*now))
            }
        }
    }
}

impl std::error::Error for SensorError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
