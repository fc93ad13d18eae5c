//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlService (domain)
//! ```
//!
//! Driven adapters (smart plugs, mail transport, event sinks, config
//! storage, clocks) implement these traits.  The
//! [`ControlService`](super::service::ControlService) and the worker threads
//! consume them via generics, so the domain core never touches a socket or a
//! file directly.
//!
//! ## Contract notes
//!
//! - **PlugPort** calls may block for as long as they like; the dispatcher
//!   worker wraps each one in the device timeout.
//! - **ConfigPort::save** MUST be atomic.  A reader may load the file at any
//!   moment and a torn write is indistinguishable from corruption.
//! - All port errors are typed; callers must handle every variant explicitly.

use core::fmt;

use crate::app::commands::{ActuatorCommand, CommandResult};
use crate::app::events::ControlEvent;
use crate::config::{ControlConfig, RuntimeSnapshot, UnixSecs};
use crate::error::DeviceError;
use crate::notify::{IncidentKey, Notification};

/// A flat JSON object as read from the persisted config file.
pub type RawConfig = serde_json::Map<String, serde_json::Value>;

// ───────────────────────────────────────────────────────────────
// Plug port (driven adapter: dispatcher worker → smart plug)
// ───────────────────────────────────────────────────────────────

/// The three device steps the dispatcher performs per command.
///
/// Only the wake / set / verify semantics are modelled; the wire protocol
/// lives entirely in the adapter.
#[allow(async_fn_in_trait)]
pub trait PlugPort {
    /// Probe the device so it is ready to accept a command.
    async fn wake(&mut self, actuator_id: &str) -> Result<(), DeviceError>;

    /// Switch the relay.
    async fn set_power(&mut self, actuator_id: &str, on: bool) -> Result<(), DeviceError>;

    /// Read back the relay state.
    async fn read_power(&mut self, actuator_id: &str) -> Result<bool, DeviceError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator link (domain → dispatcher worker)
// ───────────────────────────────────────────────────────────────

/// Message-passing boundary to the dispatcher.  Commands in, results out.
pub trait ActuatorLink {
    /// Enqueue without blocking.  A full queue is an error the caller must
    /// treat as a failed command.
    fn submit(&self, cmd: ActuatorCommand) -> Result<(), DispatchError>;

    /// Next available result, if any.
    fn poll_result(&self) -> Option<CommandResult>;
}

// ───────────────────────────────────────────────────────────────
// Alert port (domain → notification worker)
// ───────────────────────────────────────────────────────────────

/// Incident triggers produced by the control engine.
pub trait AlertPort {
    fn raise(&self, key: IncidentKey, notification: Notification);

    /// The incident's condition has cleared; the next `raise` is a new incident.
    fn clear(&self, key: IncidentKey);

    /// Hand over anything held back while the worker was busy.
    fn flush(&self) {}
}

// ───────────────────────────────────────────────────────────────
// Notifier port (notification worker → transport)
// ───────────────────────────────────────────────────────────────

/// Outbound email / push transport.
pub trait NotifierPort {
    fn send(&mut self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`ControlEvent`]s through this port.
/// Adapters decide where they go (log facade, JSON-lines file, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &ControlEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (domain ↔ persisted vessel config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the per-vessel configuration.
///
/// `load_raw` returns the file as an untyped object so the
/// [`ConfigMergeGuard`](crate::merge::ConfigMergeGuard) can judge each key
/// on its own; a single bad field must never discard the rest.
pub trait ConfigPort {
    fn load_raw(&self) -> Result<RawConfig, ConfigError>;

    /// Persist the config together with the runtime snapshot.
    fn save(&self, config: &ControlConfig, runtime: &RuntimeSnapshot) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source.  Sensor timestamps are unix seconds, so the controller
/// runs on the same scale.
pub trait ClockPort {
    fn now_secs(&self) -> UnixSecs;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the main loop)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the scheduler invokes when a job is due.
///
/// The main loop implements this by running the control tick, the config
/// reload or the telemetry report; the scheduler itself knows nothing about
/// any of them.
pub trait SchedulerDelegate {
    fn on_job_due(&mut self, job: JobKind, now: UnixSecs);
}

/// Discriminant passed to [`SchedulerDelegate::on_job_due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    ControlTick,
    ConfigReload,
    Telemetry,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations and settings validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No config file yet (first start).
    NotFound,
    /// File exists but is not a JSON object.
    Corrupted(String),
    /// A setting failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying filesystem error.
    Io(String),
}

/// Errors from [`NotifierPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Transport refused or failed the delivery.
    Delivery(String),
    /// Transport not configured.
    Unavailable,
}

/// Errors from [`ActuatorLink::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// Command channel is full.
    QueueFull,
    /// The worker thread has exited.
    WorkerGone,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted(msg) => write!(f, "config corrupted: {msg}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivery(msg) => write!(f, "delivery failed: {msg}"),
            Self::Unavailable => write!(f, "notification transport unavailable"),
        }
    }
}

impl std::error::Error for NotifyError {}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "command queue full"),
            Self::WorkerGone => write!(f, "dispatcher worker stopped"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<DispatchError> for DeviceError {
    fn from(e: DispatchError) -> Self {
        DeviceError::NotDispatched(e.to_string())
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::InvalidConfiguration(msg.to_owned()),
            other => Self::PersistenceCorruption(other.to_string()),
        }
    }
}
