//! Application core: pure domain logic, zero I/O.
//!
//! This module holds the orchestration for the BrewGuard controller: the
//! per-tick control cycle, result application, config reloads and
//! telemetry.  All interaction with sensors, plugs, storage and
//! notification transports happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable with mock adapters.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
