//! Controller configuration.
//!
//! Two layers:
//!
//! - [`ControlConfig`] is the per-vessel record persisted as a flat JSON
//!   object.  External tooling (the dashboard, a text editor) may rewrite
//!   this file at any time; it is reloaded periodically and passed through
//!   the [`ConfigMergeGuard`](crate::merge::ConfigMergeGuard) before use.
//! - [`SystemConfig`] holds process tunables (tick interval, timeouts, retry
//!   policy).  Loaded once at startup from defaults plus an optional
//!   settings file.
//!
//! [`RuntimeSnapshot`] is the runtime-only view written next to the config
//! for tooling.  Its keys are never read back from disk.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::control::ControlMode;
use crate::control::state::ActuatorRole;

/// Unix timestamp in whole seconds.
pub type UnixSecs = u64;

// ---------------------------------------------------------------------------
// Persisted per-vessel configuration
// ---------------------------------------------------------------------------

/// Keys of [`ControlConfig`] as they appear in the persisted file.
pub const PERSISTED_FIELDS: &[&str] = &[
    "low_limit",
    "high_limit",
    "heating_enabled",
    "cooling_enabled",
    "heating_actuator_id",
    "cooling_actuator_id",
    "assigned_sensor_id",
    "assignment_time",
    "active",
    "notify_safety_shutdown",
    "notify_anomaly",
    "notify_device_failure",
    "notification_subject_prefix",
];

/// Keys that live only in memory.  Present in the persisted file for tooling
/// but stripped on every reload.
pub const RUNTIME_ONLY_FIELDS: &[&str] = &[
    "heating_on",
    "heating_pending",
    "heating_pending_action",
    "heating_error",
    "heating_anomaly_notified",
    "heating_failure_notified",
    "cooling_on",
    "cooling_pending",
    "cooling_pending_action",
    "cooling_error",
    "cooling_anomaly_notified",
    "cooling_failure_notified",
    "safety_notified",
    "last_reading",
    "last_reading_time",
    "mode",
    "status",
];

/// Per-vessel control configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    // --- Limits (°F) ---
    /// Heating turns on at or below this temperature.
    pub low_limit: f64,
    /// Cooling turns on at or above this temperature.
    pub high_limit: f64,

    // --- Modes ---
    pub heating_enabled: bool,
    pub cooling_enabled: bool,

    // --- Actuators ---
    /// Network address / id of the heating plug.  Empty = none.
    pub heating_actuator_id: String,
    /// Network address / id of the cooling plug.  Empty = none.
    pub cooling_actuator_id: String,

    // --- Sensor assignment ---
    /// Explicitly assigned sensor.  Empty = fallback mode.
    pub assigned_sensor_id: String,
    /// When the sensor was (re)assigned; starts the grace period.
    pub assignment_time: UnixSecs,

    /// Master enable.  When false every actuator is driven off.
    pub active: bool,

    // --- Notification preferences ---
    pub notify_safety_shutdown: bool,
    pub notify_anomaly: bool,
    pub notify_device_failure: bool,
    /// Prepended to every notification subject (e.g. the vessel name).
    pub notification_subject_prefix: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            low_limit: 64.0,
            high_limit: 68.0,
            heating_enabled: false,
            cooling_enabled: false,
            heating_actuator_id: String::new(),
            cooling_actuator_id: String::new(),
            assigned_sensor_id: String::new(),
            assignment_time: 0,
            active: false,
            notify_safety_shutdown: true,
            notify_anomaly: true,
            notify_device_failure: true,
            notification_subject_prefix: "BrewGuard".into(),
        }
    }
}

impl ControlConfig {
    /// Hysteresis release point shared by heating and cooling.
    pub fn midpoint(&self) -> f64 {
        (self.low_limit + self.high_limit) / 2.0
    }

    /// Check the limit invariant.  Returns a human-readable reason on failure.
    pub fn limits_error(&self) -> Option<String> {
        if !self.low_limit.is_finite() || !self.high_limit.is_finite() {
            return Some(format!(
                "limits must be finite numbers (low={}, high={})",
                self.low_limit, self.high_limit
            ));
        }
        if self.heating_enabled && self.cooling_enabled && self.low_limit >= self.high_limit {
            return Some(format!(
                "low limit {:.1} must be below high limit {:.1}",
                self.low_limit, self.high_limit
            ));
        }
        None
    }

    /// Whether an explicit sensor assignment exists.
    pub fn has_assigned_sensor(&self) -> bool {
        !self.assigned_sensor_id.trim().is_empty()
    }

    pub fn actuator_id(&self, role: ActuatorRole) -> &str {
        match role {
            ActuatorRole::Heating => self.heating_actuator_id.trim(),
            ActuatorRole::Cooling => self.cooling_actuator_id.trim(),
        }
    }

    pub fn role_enabled(&self, role: ActuatorRole) -> bool {
        match role {
            ActuatorRole::Heating => self.heating_enabled,
            ActuatorRole::Cooling => self.cooling_enabled,
        }
    }

    /// Role whose plug has this id, heating first.
    pub fn role_for(&self, actuator_id: &str) -> Option<ActuatorRole> {
        ActuatorRole::ALL
            .into_iter()
            .find(|&role| !self.actuator_id(role).is_empty() && self.actuator_id(role) == actuator_id)
    }
}

// ---------------------------------------------------------------------------
// Runtime-only snapshot
// ---------------------------------------------------------------------------

/// In-memory controller state exported for tooling.  Every key here is in
/// [`RUNTIME_ONLY_FIELDS`] and is ignored when the file is reloaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub heating_on: bool,
    pub heating_pending: bool,
    pub heating_pending_action: Option<String>,
    pub heating_error: String,
    pub heating_anomaly_notified: bool,
    pub heating_failure_notified: bool,
    pub cooling_on: bool,
    pub cooling_pending: bool,
    pub cooling_pending_action: Option<String>,
    pub cooling_error: String,
    pub cooling_anomaly_notified: bool,
    pub cooling_failure_notified: bool,
    pub safety_notified: bool,
    pub last_reading: Option<f64>,
    pub last_reading_time: Option<UnixSecs>,
    pub mode: ControlMode,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Process tunables
// ---------------------------------------------------------------------------

/// Process-wide tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Timing ---
    /// Control loop interval (seconds).
    pub control_tick_secs: u64,
    /// A sensor is stale after this many control ticks without a reading.
    pub stale_ticks: u32,
    /// Staleness is ignored for this long after a (re)assignment (seconds).
    pub sensor_grace_secs: u64,
    /// Persisted config reload interval (seconds).
    pub config_reload_secs: u64,
    /// Telemetry report interval (seconds).
    pub telemetry_interval_secs: u64,

    // --- Actuators ---
    /// Per-step device round-trip timeout (milliseconds).
    pub device_timeout_ms: u64,
    /// Identical successful commands are suppressed for this long (seconds).
    pub command_cooldown_secs: u64,
    /// Pending commands older than this are treated as failed (seconds).
    pub pending_timeout_secs: u64,

    // --- Anomaly detection ---
    /// Minimum observation window after an actuator turns on (seconds).
    pub anomaly_window_secs: u64,
    /// Wrong-direction drift that raises the anomaly (°F).
    pub anomaly_threshold_f: f64,

    // --- Notifications ---
    /// Repeat triggers for the same incident are dropped inside this window.
    pub notify_debounce_secs: u64,
    /// Backoff before each retry (seconds); the last entry repeats.
    pub notify_retry_backoff_secs: Vec<u64>,
    /// Total delivery attempts before a ticket is dropped.
    pub notify_max_attempts: u32,
    /// How often the notification worker drains due retries (seconds).
    pub notify_poll_secs: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Timing
            control_tick_secs: 120,
            stale_ticks: 2,
            sensor_grace_secs: 15 * 60,
            config_reload_secs: 30,
            telemetry_interval_secs: 600,

            // Actuators
            device_timeout_ms: 2000,
            command_cooldown_secs: 10,
            pending_timeout_secs: 60,

            // Anomaly
            anomaly_window_secs: 10 * 60,
            anomaly_threshold_f: 1.5,

            // Notifications
            notify_debounce_secs: 10,
            notify_retry_backoff_secs: vec![5 * 60, 30 * 60],
            notify_max_attempts: 3,
            notify_poll_secs: 5,
        }
    }
}

impl SystemConfig {
    /// Freshness window, derived from the control tick interval.
    pub fn stale_after_secs(&self) -> u64 {
        self.control_tick_secs
            .saturating_mul(u64::from(self.stale_ticks))
    }

    /// Reject settings that would break the control loop's guarantees.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_tick_secs == 0 {
            return Err(ConfigError::ValidationFailed("control_tick_secs must be > 0"));
        }
        if self.stale_ticks < 2 {
            return Err(ConfigError::ValidationFailed(
                "stale_ticks must be at least 2 control ticks",
            ));
        }
        if self.device_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("device_timeout_ms must be > 0"));
        }
        // Three device steps must fit inside the pending window, or every
        // slow command would be expired before its result lands.
        if self.device_timeout_ms.saturating_mul(3) / 1000 >= self.pending_timeout_secs {
            return Err(ConfigError::ValidationFailed(
                "pending_timeout_secs must exceed three device timeouts",
            ));
        }
        if !self.anomaly_threshold_f.is_finite() || self.anomaly_threshold_f <= 0.0 {
            return Err(ConfigError::ValidationFailed("anomaly_threshold_f must be > 0"));
        }
        if self.notify_max_attempts == 0 {
            return Err(ConfigError::ValidationFailed("notify_max_attempts must be > 0"));
        }
        if self.notify_retry_backoff_secs.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "notify_retry_backoff_secs needs at least one entry",
            ));
        }
        if self.config_reload_secs == 0 || self.notify_poll_secs == 0 {
            return Err(ConfigError::ValidationFailed("reload and poll intervals must be > 0"));
        }
        Ok(())
    }
}
