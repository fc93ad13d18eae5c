//! Runtime diagnostics.
//!
//! Counters are bumped by the [`ControlService`](crate::app::service::ControlService)
//! as ticks run and results arrive.  On the telemetry cadence they are
//! folded into a [`TelemetryReport`] together with the live readings and
//! emitted as a `telemetry` event.

use serde::{Deserialize, Serialize};

use crate::app::commands::{CommandOutcome, CommandResult};
use crate::config::UnixSecs;
use crate::control::ControlMode;

/// Monotonic counters since process start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeMetrics {
    pub started_at: UnixSecs,
    pub control_cycles: u64,
    pub commands_issued: u64,
    pub commands_succeeded: u64,
    pub commands_failed: u64,
    pub commands_suppressed: u64,
    /// Submits refused by a full queue or a dead worker.
    pub commands_not_dispatched: u64,
    pub pendings_expired: u64,
    pub safety_incidents: u32,
    pub config_errors: u32,
    pub anomalies: u32,
    pub config_reloads: u64,
    pub merges_rejected: u64,
}

impl RuntimeMetrics {
    pub fn new(started_at: UnixSecs) -> Self {
        Self {
            started_at,
            ..Default::default()
        }
    }

    pub fn record_result(&mut self, result: &CommandResult) {
        match result.outcome {
            CommandOutcome::Success => self.commands_succeeded += 1,
            CommandOutcome::Failed(_) => self.commands_failed += 1,
            CommandOutcome::Suppressed => self.commands_suppressed += 1,
        }
    }

    pub fn uptime_secs(&self, now: UnixSecs) -> u64 {
        now.saturating_sub(self.started_at)
    }
}

/// Point-in-time report emitted on the telemetry cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub uptime_secs: u64,
    pub mode: ControlMode,
    pub status: String,
    pub sensor_id: Option<String>,
    pub reading: Option<f64>,
    pub heating_on: bool,
    pub cooling_on: bool,
    pub fault_flags: u8,
    pub sensors_tracked: usize,
    pub metrics: RuntimeMetrics,
}

impl TelemetryReport {
    /// One-line summary for the log.
    pub fn summary(&self) -> String {
        let reading = self
            .reading
            .map_or_else(|| "--".to_owned(), |r| format!("{r:.1}\u{00b0}F"));
        format!(
            "up {}s mode={} reading={} heat={} cool={} faults=0b{:08b} cycles={} cmds={}/{} ok, {} failed",
            self.uptime_secs,
            self.mode,
            reading,
            self.heating_on,
            self.cooling_on,
            self.fault_flags,
            self.metrics.control_cycles,
            self.metrics.commands_succeeded,
            self.metrics.commands_issued,
            self.metrics.commands_failed,
        )
    }
}
