//! Application service: the hexagonal core.
//!
//! [`ControlService`] owns the live config, the control engine and the
//! runtime counters.  It exposes a clean, I/O-free API: every collaborator
//! (sensor registry, dispatcher link, alert queue, event sink, config store)
//! is passed in at the call site, so the whole service is testable with mock
//! adapters.
//!
//! ```text
//!  SensorRegistry ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                     │     ControlService     │
//!   ActuatorLink  ◀──▶│ Engine · Merge · Stats │ ──▶ AlertPort
//!                     └────────────────────────┘
//!                                 ▲ │
//!                      ConfigPort │ ▼ snapshot
//! ```

use log::{debug, info, warn};

use crate::config::{ControlConfig, SystemConfig, UnixSecs};
use crate::control::state::ActuatorRole;
use crate::control::{Alert, ControlEngine, ControlMode, TickInput};
use crate::diagnostics::{RuntimeMetrics, TelemetryReport};
use crate::error::DeviceError;
use crate::merge::{ConfigMergeGuard, MergeReport};
use crate::sensors::SensorRegistry;

use super::commands::CommandResult;
use super::events::{ControlEvent, EventType};
use super::ports::{ActuatorLink, AlertPort, ConfigError, ConfigPort, EventSink};

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct ControlService {
    config: ControlConfig,
    engine: ControlEngine,
    metrics: RuntimeMetrics,
    /// Authoritative sensor at the previous tick, for change events.
    last_sensor: Option<String>,
}

impl ControlService {
    pub fn new(system: &SystemConfig, config: ControlConfig, now: UnixSecs) -> Self {
        Self {
            config,
            engine: ControlEngine::new(system),
            metrics: RuntimeMetrics::new(now),
            last_sensor: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink, now: UnixSecs) {
        let detail = match self.config.limits_error() {
            Some(reason) => format!("starting with invalid limits: {reason}"),
            None => "started".to_owned(),
        };
        sink.emit(
            &ControlEvent::new(now, EventType::Started)
                .limits(&self.config)
                .detail(detail),
        );
        info!(
            "ControlService started (band {:.1}..{:.1}, heating={}, cooling={}, active={})",
            self.config.low_limit,
            self.config.high_limit,
            self.config.heating_enabled,
            self.config.cooling_enabled,
            self.config.active
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle: results → sensor selection → engine →
    /// dispatch.
    pub fn tick(
        &mut self,
        sensors: &SensorRegistry,
        link: &impl ActuatorLink,
        alerts: &impl AlertPort,
        sink: &mut impl EventSink,
        now: UnixSecs,
    ) -> ControlMode {
        self.metrics.control_cycles += 1;
        alerts.flush();

        // 1. Apply whatever the dispatcher finished since the last tick.
        self.drain_results(link, alerts, sink, now);

        // 2. Which sensor speaks for the vessel?
        let selection = sensors.select(&self.config, now);
        let sensor_id = selection.sensor_id().map(str::to_owned);
        if sensor_id != self.last_sensor {
            info!(
                "authoritative sensor: {} ({selection:?})",
                sensor_id.as_deref().unwrap_or("none")
            );
            sink.emit(
                &ControlEvent::new(now, EventType::SensorSelected)
                    .sensor(sensor_id.as_deref())
                    .value(selection.reading()),
            );
            self.last_sensor.clone_from(&sensor_id);
        }

        // 3. Decide.
        let outcome = self.engine.tick(&TickInput {
            cfg: &self.config,
            reading: selection.reading(),
            sensor_active: selection.is_active(),
            sensor_id: sensor_id.as_deref(),
            sensor_age_secs: selection.age_secs(),
            now,
        });

        for ev in &outcome.events {
            match ev.event_type {
                EventType::SafetyShutdown => self.metrics.safety_incidents += 1,
                EventType::ConfigInvalid => self.metrics.config_errors += 1,
                EventType::AnomalyDetected => self.metrics.anomalies += 1,
                EventType::PendingExpired => self.metrics.pendings_expired += 1,
                _ => {}
            }
            sink.emit(ev);
        }
        forward_alerts(outcome.alerts, alerts);

        // 4. Dispatch.  A refused submit is a failed command, retried next tick.
        for cmd in outcome.commands {
            self.metrics.commands_issued += 1;
            if let Err(e) = link.submit(cmd.clone()) {
                warn!("submit {} {} refused: {e}", cmd.actuator_id, cmd.action);
                self.metrics.commands_not_dispatched += 1;
                let failed = CommandResult::failed(&cmd, DeviceError::from(e).to_string());
                self.apply_result(&failed, alerts, sink, now);
            }
        }

        debug!("tick {}: {}", self.metrics.control_cycles, outcome.status);
        outcome.mode
    }

    /// Apply every result currently available from the dispatcher.
    pub fn drain_results(
        &mut self,
        link: &impl ActuatorLink,
        alerts: &impl AlertPort,
        sink: &mut impl EventSink,
        now: UnixSecs,
    ) -> usize {
        let mut n = 0;
        while let Some(result) = link.poll_result() {
            self.apply_result(&result, alerts, sink, now);
            n += 1;
        }
        n
    }

    /// Apply one dispatcher result.
    pub fn apply_result(
        &mut self,
        result: &CommandResult,
        alerts: &impl AlertPort,
        sink: &mut impl EventSink,
        now: UnixSecs,
    ) {
        self.metrics.record_result(result);
        let fx = self.engine.apply(&self.config, result, now);
        for ev in &fx.events {
            sink.emit(ev);
        }
        forward_alerts(fx.alerts, alerts);
    }

    // ── Configuration ─────────────────────────────────────────

    /// Reload the persisted config through the merge guard.
    pub fn reload(
        &mut self,
        store: &impl ConfigPort,
        sink: &mut impl EventSink,
        now: UnixSecs,
    ) -> Result<MergeReport, ConfigError> {
        self.metrics.config_reloads += 1;
        let raw = match store.load_raw() {
            Ok(raw) => raw,
            Err(ConfigError::NotFound) => return Err(ConfigError::NotFound),
            Err(e) => {
                warn!("config reload failed, keeping live config: {e}");
                self.metrics.merges_rejected += 1;
                sink.emit(&ControlEvent::new(now, EventType::ConfigRejected).detail(e.to_string()));
                return Err(e);
            }
        };

        let previous_ids = ActuatorRole::ALL.map(|role| self.config.actuator_id(role).to_owned());
        let report = ConfigMergeGuard::merge(&mut self.config, &raw, now);
        for (role, old_id) in ActuatorRole::ALL.into_iter().zip(previous_ids) {
            if self.config.actuator_id(role) != old_id && self.engine.retire_actuator(role, &old_id) {
                sink.emit(
                    &ControlEvent::new(now, EventType::ConfigMerged)
                        .actuator(&old_id)
                        .detail(format!("{} plug re-addressed; switching old plug off", role.as_str())),
                );
            }
        }
        if report.has_changes() {
            info!("config reload changed {:?}", report.changed);
            sink.emit(
                &ControlEvent::new(now, EventType::ConfigMerged)
                    .limits(&self.config)
                    .detail(report.changed.join(",")),
            );
        }
        if report.has_problems() {
            self.metrics.merges_rejected += 1;
            let detail = report
                .errors()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            sink.emit(
                &ControlEvent::new(now, EventType::ConfigRejected)
                    .limits(&self.config)
                    .detail(detail),
            );
        }
        Ok(report)
    }

    /// Write the live config plus runtime snapshot.
    pub fn persist(&self, store: &impl ConfigPort) -> Result<(), ConfigError> {
        store.save(&self.config, &self.engine.snapshot())
    }

    /// Fold in edits made to the file since the last reload, then persist.
    /// A file that does not parse is left for its writer to finish.
    pub fn checkpoint(
        &mut self,
        store: &impl ConfigPort,
        sink: &mut impl EventSink,
        now: UnixSecs,
    ) -> Result<(), ConfigError> {
        match self.reload(store, sink, now) {
            Ok(_) | Err(ConfigError::NotFound) => self.persist(store),
            Err(e) => Err(e),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn telemetry(&self, sensors: &SensorRegistry, now: UnixSecs) -> TelemetryReport {
        let states = self.engine.states();
        TelemetryReport {
            uptime_secs: self.metrics.uptime_secs(now),
            mode: self.engine.mode(),
            status: self.engine.status().to_owned(),
            sensor_id: self.last_sensor.clone(),
            reading: self.engine.last_reading(),
            heating_on: states.heating.on,
            cooling_on: states.cooling.on,
            fault_flags: self.engine.safety().faults(),
            sensors_tracked: sensors.len(),
            metrics: self.metrics.clone(),
        }
    }

    /// Emit a telemetry event and log its summary.
    pub fn report_telemetry(&self, sensors: &SensorRegistry, sink: &mut impl EventSink, now: UnixSecs) {
        let report = self.telemetry(sensors, now);
        info!("telemetry: {}", report.summary());
        sink.emit(
            &ControlEvent::new(now, EventType::Telemetry)
                .sensor(report.sensor_id.as_deref())
                .value(report.reading)
                .limits(&self.config)
                .detail(report.summary()),
        );
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn engine(&self) -> &ControlEngine {
        &self.engine
    }

    pub fn metrics(&self) -> &RuntimeMetrics {
        &self.metrics
    }

    pub fn mode(&self) -> ControlMode {
        self.engine.mode()
    }

    pub fn status(&self) -> &str {
        self.engine.status()
    }
}

fn forward_alerts(alerts: Vec<Alert>, port: &impl AlertPort) {
    for alert in alerts {
        match alert {
            Alert::Raise { key, notification } => port.raise(key, notification),
            Alert::Clear(key) => port.clear(key),
        }
    }
}
