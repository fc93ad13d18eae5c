//! Sensor subsystem: the shared [`SensorRegistry`] and authoritative-sensor
//! [`Selection`].
//!
//! The registry is written by the feed thread and read by the control loop
//! once per tick.  Wrap it in an `Arc` to share it.

pub mod registry;
pub mod selection;

pub use registry::{Ingested, SensorRegistry, SensorSample, MAX_ID_LEN, MAX_SENSORS};
pub use selection::{FreshnessPolicy, MAX_CLOCK_SKEW_SECS, Selection};
