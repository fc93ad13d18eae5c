//! Outbound structured events.
//!
//! The [`ControlService`](super::service::ControlService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide where they go: the log facade, a JSON-lines file, etc.
//!
//! One event per line on the wire:
//!
//! ```text
//! {"timestamp":1700000000,"event_type":"command_issued","sensor_id":null,
//!  "actuator_id":"192.168.1.40","value":63.8,"low_limit":64.0,
//!  "high_limit":68.0,"detail":"heating on"}
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ControlConfig, UnixSecs};

/// Closed set of event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Controller started.
    Started,
    /// Control mode changed.
    ModeChanged,
    /// Authoritative sensor changed.
    SensorSelected,
    /// A command was handed to the dispatcher.
    CommandIssued,
    CommandSucceeded,
    CommandFailed,
    /// Duplicate command answered from the cooldown table.
    CommandSuppressed,
    /// A pending command saw no result in time and was failed.
    PendingExpired,
    SafetyShutdown,
    SafetyCleared,
    ConfigInvalid,
    ConfigRecovered,
    /// A reload changed the live config.
    ConfigMerged,
    /// A reload contained values the merge guard refused.
    ConfigRejected,
    AnomalyDetected,
    Telemetry,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::ModeChanged => "mode_changed",
            Self::SensorSelected => "sensor_selected",
            Self::CommandIssued => "command_issued",
            Self::CommandSucceeded => "command_succeeded",
            Self::CommandFailed => "command_failed",
            Self::CommandSuppressed => "command_suppressed",
            Self::PendingExpired => "pending_expired",
            Self::SafetyShutdown => "safety_shutdown",
            Self::SafetyCleared => "safety_cleared",
            Self::ConfigInvalid => "config_invalid",
            Self::ConfigRecovered => "config_recovered",
            Self::ConfigMerged => "config_merged",
            Self::ConfigRejected => "config_rejected",
            Self::AnomalyDetected => "anomaly_detected",
            Self::Telemetry => "telemetry",
        }
    }
}

/// One structured event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub timestamp: UnixSecs,
    pub event_type: EventType,
    pub sensor_id: Option<String>,
    pub actuator_id: Option<String>,
    /// Temperature reading (°F) or the event's numeric payload.
    pub value: Option<f64>,
    pub low_limit: Option<f64>,
    pub high_limit: Option<f64>,
    pub detail: String,
}

impl ControlEvent {
    pub fn new(timestamp: UnixSecs, event_type: EventType) -> Self {
        Self {
            timestamp,
            event_type,
            sensor_id: None,
            actuator_id: None,
            value: None,
            low_limit: None,
            high_limit: None,
            detail: String::new(),
        }
    }

    pub fn sensor(mut self, id: Option<&str>) -> Self {
        self.sensor_id = id.map(str::to_owned);
        self
    }

    pub fn actuator(mut self, id: &str) -> Self {
        self.actuator_id = Some(id.to_owned());
        self
    }

    pub fn value(mut self, value: Option<f64>) -> Self {
        self.value = value;
        self
    }

    pub fn limits(mut self, cfg: &ControlConfig) -> Self {
        self.low_limit = Some(cfg.low_limit);
        self.high_limit = Some(cfg.high_limit);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}
