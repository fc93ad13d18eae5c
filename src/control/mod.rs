//! Hysteresis control engine.
//!
//! [`ControlEngine`] owns the runtime [`ActuatorStates`] and turns one
//! reading plus the live config into actuator commands.  It never talks to a
//! device: commands go out in the [`TickOutcome`], results come back through
//! [`ControlEngine::apply`].
//!
//! ```text
//!            ┌──────────── tick ────────────┐
//!  config ──▶│ expire stale pendings        │
//!  reading ─▶│ safety (limits, sensor loss) │──▶ commands ──▶ dispatcher
//!  sensor  ─▶│ master enable / no reading   │──▶ events, alerts
//!            │ hysteresis + exclusion       │
//!            │ anomaly watch                │
//!            └──────────────────────────────┘
//!  dispatcher results ──▶ apply ──▶ ActuatorStates
//! ```
//!
//! Invariants held here:
//!
//! - a role is never commanded on while the other role is on or has an `on`
//!   in flight, including a plug the other role was re-addressed away from;
//! - nothing is powered on without a reading;
//! - `on` changes only when the device confirms it.

pub mod anomaly;
pub mod hysteresis;
pub mod state;

use core::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::commands::{Action, ActuatorCommand, CommandResult};
use crate::app::events::{ControlEvent, EventType};
use crate::config::{ControlConfig, RuntimeSnapshot, SystemConfig, UnixSecs};
use crate::error::Error;
use crate::notify::{IncidentKey, IncidentKind, Notification};
use crate::safety::{FaultEdges, SafetyFault, SafetySupervisor};

use anomaly::AnomalyDetector;
use hysteresis::Band;
use state::{ActuatorRole, ActuatorStates, Applied};

/// Controller mode, reported in the status snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    #[default]
    Idle,
    Heating,
    Cooling,
    SafetyShutdown,
    ConfigError,
}

impl ControlMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Heating => "heating",
            Self::Cooling => "cooling",
            Self::SafetyShutdown => "safety_shutdown",
            Self::ConfigError => "config_error",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one tick needs to know about the outside world.
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    pub cfg: &'a ControlConfig,
    /// Latest reading from the authoritative sensor, if fresh.
    pub reading: Option<f64>,
    /// False once the authoritative sensor is lost.
    pub sensor_active: bool,
    pub sensor_id: Option<&'a str>,
    /// Age of the authoritative sensor's last sample, if it ever reported.
    pub sensor_age_secs: Option<u64>,
    pub now: UnixSecs,
}

/// Incident trigger for the notification worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    Raise {
        key: IncidentKey,
        notification: Notification,
    },
    Clear(IncidentKey),
}

/// Side effects of applying results.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub events: Vec<ControlEvent>,
    pub alerts: Vec<Alert>,
}

/// Side effects of one tick.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub commands: Vec<ActuatorCommand>,
    pub events: Vec<ControlEvent>,
    pub alerts: Vec<Alert>,
    pub mode: ControlMode,
    pub status: String,
}

/// A plug a config reload moved a role away from while it may still be on.
/// Driven off on its own until the device confirms.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Retiring {
    role: ActuatorRole,
    actuator_id: String,
    sent_at: Option<UnixSecs>,
}

// ───────────────────────────────────────────────────────────────
// ControlEngine
// ───────────────────────────────────────────────────────────────

pub struct ControlEngine {
    states: ActuatorStates,
    retiring: Vec<Retiring>,
    mode: ControlMode,
    status: String,
    safety: SafetySupervisor,
    anomaly: AnomalyDetector,
    pending_timeout_secs: u64,
    last_reading: Option<f64>,
    last_reading_time: Option<UnixSecs>,
}

impl ControlEngine {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            states: ActuatorStates::default(),
            retiring: Vec::new(),
            mode: ControlMode::Idle,
            status: "starting".into(),
            safety: SafetySupervisor::new(),
            anomaly: AnomalyDetector::new(config.anomaly_window_secs, config.anomaly_threshold_f),
            pending_timeout_secs: config.pending_timeout_secs,
            last_reading: None,
            last_reading_time: None,
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn states(&self) -> &ActuatorStates {
        &self.states
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn last_reading(&self) -> Option<f64> {
        self.last_reading
    }

    pub fn safety(&self) -> &SafetySupervisor {
        &self.safety
    }

    /// Old plug addresses still being driven off.
    pub fn retiring(&self) -> impl Iterator<Item = &str> {
        self.retiring.iter().map(|r| r.actuator_id.as_str())
    }

    /// `role` was re-addressed away from `old_id`.
    ///
    /// If the old plug may be on (or has a command in flight) it is switched
    /// off separately until the device confirms, and the role starts over as
    /// off on its new plug.  Returns true if the old plug needs retiring.
    pub fn retire_actuator(&mut self, role: ActuatorRole, old_id: &str) -> bool {
        let old_id = old_id.trim();
        let st = self.states.get(role);
        if old_id.is_empty() || !(st.possibly_on() || st.pending) {
            return false;
        }
        warn!("{} re-addressed while possibly on; switching '{old_id}' off", role.as_str());
        self.retiring.retain(|r| r.actuator_id != old_id);
        self.retiring.push(Retiring {
            role,
            actuator_id: old_id.to_owned(),
            sent_at: None,
        });
        let st = self.states.get_mut(role);
        st.on = false;
        st.clear_pending();
        st.baseline_temp = None;
        st.baseline_time = None;
        st.anomaly_notified = false;
        true
    }

    /// Runtime-only view for the persisted snapshot.
    pub fn snapshot(&self) -> RuntimeSnapshot {
        let h = &self.states.heating;
        let c = &self.states.cooling;
        let action = |a: Option<Action>| a.map(|a| a.as_str().to_owned());
        RuntimeSnapshot {
            heating_on: h.on,
            heating_pending: h.pending,
            heating_pending_action: action(h.pending_action),
            heating_error: h.last_error.clone(),
            heating_anomaly_notified: h.anomaly_notified,
            heating_failure_notified: h.failure_notified,
            cooling_on: c.on,
            cooling_pending: c.pending,
            cooling_pending_action: action(c.pending_action),
            cooling_error: c.last_error.clone(),
            cooling_anomaly_notified: c.anomaly_notified,
            cooling_failure_notified: c.failure_notified,
            safety_notified: self.safety.has_fault(SafetyFault::SensorLost),
            last_reading: self.last_reading,
            last_reading_time: self.last_reading_time,
            mode: self.mode,
            status: self.status.clone(),
        }
    }

    // ── Per-tick evaluation ───────────────────────────────────

    /// Run one control cycle.
    pub fn tick(&mut self, input: &TickInput<'_>) -> TickOutcome {
        let cfg = input.cfg;
        let now = input.now;
        let mut out = TickOutcome::default();
        let mut fx = ApplyOutcome::default();

        if let Some(r) = input.reading {
            self.last_reading = Some(r);
            self.last_reading_time = Some(now);
        }

        // 0. Pendings with no result in time are failures, so they get retried.
        for role in ActuatorRole::ALL {
            let st = self.states.get(role);
            if !st.pending_expired(now, self.pending_timeout_secs) {
                continue;
            }
            let Some(action) = st.pending_action else {
                continue;
            };
            let id = cfg.actuator_id(role).to_owned();
            warn!("{} {action} pending for over {}s; treating as failed", role.as_str(), self.pending_timeout_secs);
            fx.events.push(
                ControlEvent::new(now, EventType::PendingExpired)
                    .actuator(&id)
                    .detail(format!("{} {action}", role.as_str())),
            );
            let result = CommandResult::failed(
                &ActuatorCommand::new(id, action),
                format!("no result within {}s", self.pending_timeout_secs),
            );
            self.apply_role(cfg, role, &result, now, &mut fx);
        }

        // Re-addressed plugs go off whatever the mode.
        let timeout = self.pending_timeout_secs;
        for r in &mut self.retiring {
            let due = r.sent_at.is_none_or(|at| now.saturating_sub(at) >= timeout);
            if due {
                r.sent_at = Some(now);
                info!("{} retired plug -> off ({})", r.role.as_str(), r.actuator_id);
                out.commands.push(ActuatorCommand::new(r.actuator_id.clone(), Action::Off));
            }
        }

        // 1–2. Safety faults.
        let limits_error = cfg.limits_error();
        let edges = self.safety.evaluate(!input.sensor_active, limits_error.is_some());
        self.report_fault_edges(input, limits_error.as_deref(), edges, &mut fx);

        let (mode, status) = if let Some(reason) = limits_error {
            self.all_off(cfg, now, &mut out.commands);
            (ControlMode::ConfigError, Error::InvalidConfiguration(reason).to_string())
        } else if !input.sensor_active {
            self.all_off(cfg, now, &mut out.commands);
            let err = Error::SensorStale {
                sensor_id: input.sensor_id.map(str::to_owned),
                age_secs: input.sensor_age_secs,
            };
            (ControlMode::SafetyShutdown, format!("safety shutdown: {err}"))
        } else if !cfg.active {
            // 3. Master disable.
            self.all_off(cfg, now, &mut out.commands);
            (ControlMode::Idle, "inactive: control disabled".to_owned())
        } else if let Some(reading) = input.reading {
            // 5–6. Normal regulation.
            self.regulate(cfg, reading, now, &mut out.commands);
            self.watch_anomalies(cfg, reading, now, &mut fx);
            let mode = self.current_mode();
            let mut status = format!(
                "{mode}: {reading:.1}\u{00b0}F (band {:.1}..{:.1})",
                cfg.low_limit, cfg.high_limit
            );
            for role in ActuatorRole::ALL {
                let err = &self.states.get(role).last_error;
                if !err.is_empty() {
                    status.push_str(&format!("; {} error: {err}", role.as_str()));
                }
            }
            (mode, status)
        } else {
            // 4. Grace period or no sensor configured: never power on blind.
            self.all_off(cfg, now, &mut out.commands);
            (ControlMode::Idle, "idle: waiting for sensor reading".to_owned())
        };

        for cmd in &out.commands {
            fx.events.push(
                ControlEvent::new(now, EventType::CommandIssued)
                    .sensor(input.sensor_id)
                    .actuator(&cmd.actuator_id)
                    .value(input.reading)
                    .limits(cfg)
                    .detail(format!("{}", cmd.action)),
            );
        }

        if mode != self.mode {
            info!("mode {} -> {mode}", self.mode);
            fx.events.push(
                ControlEvent::new(now, EventType::ModeChanged)
                    .sensor(input.sensor_id)
                    .value(input.reading)
                    .limits(cfg)
                    .detail(format!("{} -> {mode}", self.mode)),
            );
        }
        self.mode = mode;
        self.status.clone_from(&status);

        out.events = fx.events;
        out.alerts = fx.alerts;
        out.mode = mode;
        out.status = status;
        out
    }

    /// Apply a dispatcher result to the role owning `result.actuator_id`.
    pub fn apply(&mut self, cfg: &ControlConfig, result: &CommandResult, now: UnixSecs) -> ApplyOutcome {
        let mut fx = ApplyOutcome::default();
        if result.action == Action::Off {
            if let Some(pos) = self.retiring.iter().position(|r| r.actuator_id == result.actuator_id) {
                self.apply_retired(pos, result, now, &mut fx);
                return fx;
            }
        }
        match cfg.role_for(&result.actuator_id) {
            Some(role) => self.apply_role(cfg, role, result, now, &mut fx),
            None => warn!(
                "result for unknown actuator '{}' ignored (config changed?)",
                result.actuator_id
            ),
        }
        fx
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_retired(&mut self, pos: usize, result: &CommandResult, now: UnixSecs, fx: &mut ApplyOutcome) {
        let ev = |ty| ControlEvent::new(now, ty).actuator(&result.actuator_id);
        match result.error() {
            None => {
                let r = self.retiring.remove(pos);
                info!("{} retired plug '{}' confirmed off", r.role.as_str(), r.actuator_id);
                fx.events.push(ev(EventType::CommandSucceeded).detail("off (retired)"));
            }
            Some(err) => {
                let r = &mut self.retiring[pos];
                r.sent_at = None;
                warn!("{} retired plug '{}' off failed: {err}", r.role.as_str(), r.actuator_id);
                fx.events.push(ev(EventType::CommandFailed).detail(err));
            }
        }
    }

    /// On, heading on, or still backed by a retired plug that may be on.
    fn role_possibly_on(&self, role: ActuatorRole) -> bool {
        self.states.get(role).possibly_on() || self.retiring.iter().any(|r| r.role == role)
    }

    fn apply_role(
        &mut self,
        cfg: &ControlConfig,
        role: ActuatorRole,
        result: &CommandResult,
        now: UnixSecs,
        fx: &mut ApplyOutcome,
    ) {
        let reading = self.last_reading;
        let st = self.states.get_mut(role);
        let had_anomaly = st.anomaly_notified;
        let applied = st.apply(result, reading, now);
        let ev = |ty| {
            ControlEvent::new(now, ty)
                .actuator(&result.actuator_id)
                .value(reading)
                .limits(cfg)
        };

        match applied {
            Applied::Flipped { .. } | Applied::Confirmed => {
                info!("{} {} confirmed by {}", role.as_str(), result.action, result.actuator_id);
                fx.events.push(ev(EventType::CommandSucceeded).detail(result.action.as_str()));
                if let Applied::Flipped { now_on: false } = applied {
                    if had_anomaly {
                        fx.alerts.push(Alert::Clear(IncidentKey::new(
                            IncidentKind::SwappedActuator,
                            role.as_str(),
                        )));
                    }
                }
                if st.failure_notified {
                    st.failure_notified = false;
                    fx.alerts.push(Alert::Clear(IncidentKey::new(
                        IncidentKind::DeviceFailure,
                        role.as_str(),
                    )));
                }
            }
            Applied::Failed => {
                let err = result.error().unwrap_or_default();
                warn!("{} {} failed on {}: {err}", role.as_str(), result.action, result.actuator_id);
                fx.events.push(ev(EventType::CommandFailed).detail(err));
                if !st.failure_notified {
                    st.failure_notified = true;
                    if cfg.notify_device_failure {
                        fx.alerts.push(Alert::Raise {
                            key: IncidentKey::new(IncidentKind::DeviceFailure, role.as_str()),
                            notification: Notification::new(
                                subject(cfg, &format!("{} plug not responding", role.as_str())),
                                format!(
                                    "Turning {} plug '{}' {} failed: {err}. It will be retried every control tick.",
                                    role.as_str(),
                                    result.actuator_id,
                                    result.action
                                ),
                            ),
                        });
                    }
                }
            }
            Applied::Suppressed => {
                debug!("{} {} suppressed by cooldown", role.as_str(), result.action);
                fx.events.push(ev(EventType::CommandSuppressed).detail(result.action.as_str()));
            }
        }
    }

    fn report_fault_edges(
        &self,
        input: &TickInput<'_>,
        limits_error: Option<&str>,
        edges: FaultEdges,
        fx: &mut ApplyOutcome,
    ) {
        let cfg = input.cfg;
        let now = input.now;
        let config_key = || IncidentKey::new(IncidentKind::ConfigInvalid, "limits");
        let safety_key = || IncidentKey::new(IncidentKind::SafetyShutdown, "sensor");

        if edges.raised(SafetyFault::InvalidLimits) {
            let reason = limits_error.unwrap_or("invalid limits");
            fx.events.push(ControlEvent::new(now, EventType::ConfigInvalid).limits(cfg).detail(reason));
            if cfg.notify_safety_shutdown {
                fx.alerts.push(Alert::Raise {
                    key: config_key(),
                    notification: Notification::new(
                        subject(cfg, "configuration error"),
                        format!("Both actuators have been turned off: {reason}."),
                    ),
                });
            }
        }
        if edges.cleared(SafetyFault::InvalidLimits) {
            fx.events.push(ControlEvent::new(now, EventType::ConfigRecovered).limits(cfg));
            fx.alerts.push(Alert::Clear(config_key()));
        }

        if edges.raised(SafetyFault::SensorLost) {
            let who = input.sensor_id.unwrap_or("no sensor");
            fx.events.push(
                ControlEvent::new(now, EventType::SafetyShutdown)
                    .sensor(input.sensor_id)
                    .limits(cfg)
                    .detail(format!("sensor lost: {who}")),
            );
            if cfg.notify_safety_shutdown {
                fx.alerts.push(Alert::Raise {
                    key: safety_key(),
                    notification: Notification::new(
                        subject(cfg, "safety shutdown"),
                        format!(
                            "No fresh reading from {who}. Heating and cooling have been turned off until the sensor reports again."
                        ),
                    ),
                });
            }
        }
        if edges.cleared(SafetyFault::SensorLost) {
            fx.events.push(
                ControlEvent::new(now, EventType::SafetyCleared)
                    .sensor(input.sensor_id)
                    .value(input.reading),
            );
            fx.alerts.push(Alert::Clear(safety_key()));
        }
    }

    /// Drive both roles off.
    fn all_off(&mut self, cfg: &ControlConfig, now: UnixSecs, commands: &mut Vec<ActuatorCommand>) {
        for role in ActuatorRole::ALL {
            self.drive(cfg, role, false, now, commands);
        }
    }

    /// Hysteresis for both roles.  Offs are issued first so an `on` for the
    /// other role sees them in flight.
    fn regulate(&mut self, cfg: &ControlConfig, reading: f64, now: UnixSecs, commands: &mut Vec<ActuatorCommand>) {
        let band = Band::new(cfg.low_limit, cfg.high_limit);
        let target = |role: ActuatorRole, effective_on: bool| {
            if !cfg.role_enabled(role) || cfg.actuator_id(role).is_empty() {
                return false;
            }
            let decision = match role {
                ActuatorRole::Heating => band.heating(reading),
                ActuatorRole::Cooling => band.cooling(reading),
            };
            Band::next_state(decision, effective_on)
        };
        let targets = ActuatorRole::ALL.map(|role| (role, target(role, self.states.get(role).effective_on())));

        for &(role, on) in &targets {
            if !on {
                self.drive(cfg, role, false, now, commands);
            }
        }
        for &(role, on) in &targets {
            if !on || self.states.get(role).effective_on() {
                continue;
            }
            let other = role.other();
            if self.role_possibly_on(other) {
                debug!("{} on deferred: {} still on", role.as_str(), other.as_str());
                continue;
            }
            self.drive(cfg, role, true, now, commands);
        }
    }

    /// Issue a command if `on` differs from where the role is heading.
    fn drive(
        &mut self,
        cfg: &ControlConfig,
        role: ActuatorRole,
        on: bool,
        now: UnixSecs,
        commands: &mut Vec<ActuatorCommand>,
    ) {
        let st = self.states.get_mut(role);
        if st.effective_on() == on {
            return;
        }
        let id = cfg.actuator_id(role);
        if id.is_empty() {
            debug!("{} has no actuator configured", role.as_str());
            return;
        }
        let action = Action::from_bool(on);
        st.mark_pending(action, now);
        info!("{} -> {action} ({id})", role.as_str());
        commands.push(ActuatorCommand::new(id, action));
    }

    fn watch_anomalies(&mut self, cfg: &ControlConfig, reading: f64, now: UnixSecs, fx: &mut ApplyOutcome) {
        for role in ActuatorRole::ALL {
            let Some(drift) = self.anomaly.check(role, self.states.get(role), reading, now) else {
                continue;
            };
            self.states.get_mut(role).anomaly_notified = true;
            let id = cfg.actuator_id(role);
            let err = Error::AnomalyDetected {
                actuator_id: id.to_owned(),
                delta_f: drift,
            };
            warn!("{} anomaly: {err}", role.as_str());
            fx.events.push(
                ControlEvent::new(now, EventType::AnomalyDetected)
                    .actuator(id)
                    .value(Some(reading))
                    .limits(cfg)
                    .detail(err.to_string()),
            );
            if cfg.notify_anomaly {
                fx.alerts.push(Alert::Raise {
                    key: IncidentKey::new(IncidentKind::SwappedActuator, role.as_str()),
                    notification: Notification::new(
                        subject(cfg, &format!("{} plug may be swapped", role.as_str())),
                        format!("{err}. Check that the heating and cooling plugs are connected to the right devices."),
                    ),
                });
            }
        }
    }

    fn current_mode(&self) -> ControlMode {
        if self.states.heating.effective_on() {
            ControlMode::Heating
        } else if self.states.cooling.effective_on() {
            ControlMode::Cooling
        } else {
            ControlMode::Idle
        }
    }
}

fn subject(cfg: &ControlConfig, text: &str) -> String {
    let prefix = cfg.notification_subject_prefix.trim();
    if prefix.is_empty() {
        text.to_owned()
    } else {
        format!("[{prefix}] {text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::commands::CommandOutcome;

    fn cfg(low: f64, high: f64) -> ControlConfig {
        ControlConfig {
            low_limit: low,
            high_limit: high,
            heating_enabled: true,
            cooling_enabled: true,
            heating_actuator_id: "heat".into(),
            cooling_actuator_id: "cool".into(),
            active: true,
            ..Default::default()
        }
    }

    fn input(cfg: &ControlConfig, reading: Option<f64>, now: UnixSecs) -> TickInput<'_> {
        TickInput {
            cfg,
            reading,
            sensor_active: true,
            sensor_id: Some("Red"),
            sensor_age_secs: Some(0),
            now,
        }
    }

    fn engine() -> ControlEngine {
        ControlEngine::new(&SystemConfig::default())
    }

    /// Confirm every command in `out` as successful.
    fn confirm_all(e: &mut ControlEngine, cfg: &ControlConfig, out: &TickOutcome, now: UnixSecs) {
        for cmd in &out.commands {
            e.apply(cfg, &CommandResult::success(cmd), now);
        }
    }

    #[test]
    fn heating_worked_example() {
        let mut c = cfg(73.0, 75.0);
        c.cooling_enabled = false;
        let mut e = engine();
        let mut on = Vec::new();
        for (i, r) in [72.0, 74.0, 76.0, 80.0].into_iter().enumerate() {
            let now = i as u64 * 120;
            let out = e.tick(&input(&c, Some(r), now));
            confirm_all(&mut e, &c, &out, now + 1);
            on.push(e.states().heating.on);
        }
        assert_eq!(on, vec![true, false, false, false]);
        assert!(!e.states().cooling.on);
    }

    #[test]
    fn command_issued_once_while_pending() {
        let c = cfg(64.0, 68.0);
        let mut e = engine();
        let first = e.tick(&input(&c, Some(60.0), 0));
        assert_eq!(first.commands, vec![ActuatorCommand::new("heat", Action::On)]);
        let second = e.tick(&input(&c, Some(60.0), 10));
        assert!(second.commands.is_empty());
        assert_eq!(second.mode, ControlMode::Heating);
    }

    #[test]
    fn failed_command_is_retried_next_tick() {
        let c = cfg(64.0, 68.0);
        let mut e = engine();
        let out = e.tick(&input(&c, Some(60.0), 0));
        let fx = e.apply(&c, &CommandResult::failed(&out.commands[0], "timeout"), 2);
        assert!(!e.states().heating.on);
        assert!(matches!(fx.alerts[0], Alert::Raise { .. }));
        let retry = e.tick(&input(&c, Some(60.0), 120));
        assert_eq!(retry.commands, vec![ActuatorCommand::new("heat", Action::On)]);
    }

    #[test]
    fn device_failure_alerts_once_until_success() {
        let c = cfg(64.0, 68.0);
        let mut e = engine();
        let mut raises = 0;
        for t in 0..3 {
            let out = e.tick(&input(&c, Some(60.0), t * 120));
            let fx = e.apply(&c, &CommandResult::failed(&out.commands[0], "timeout"), t * 120 + 2);
            raises += fx.alerts.iter().filter(|a| matches!(a, Alert::Raise { .. })).count();
        }
        assert_eq!(raises, 1);
        let out = e.tick(&input(&c, Some(60.0), 400));
        let fx = e.apply(&c, &CommandResult::success(&out.commands[0]), 401);
        assert!(matches!(&fx.alerts[..], [Alert::Clear(k)] if k.kind == IncidentKind::DeviceFailure));
    }

    #[test]
    fn readdressed_plug_is_switched_off() {
        let mut c = cfg(64.0, 68.0);
        let mut e = engine();
        let out = e.tick(&input(&c, Some(60.0), 0));
        confirm_all(&mut e, &c, &out, 1);
        assert!(e.states().heating.on);

        c.heating_actuator_id = "heat2".into();
        assert!(e.retire_actuator(ActuatorRole::Heating, "heat"));
        assert!(!e.states().heating.on);

        // Past the midpoint: the old plug still gets its off.
        let out = e.tick(&input(&c, Some(67.0), 120));
        assert_eq!(out.commands, vec![ActuatorCommand::new("heat", Action::Off)]);
        let fx = e.apply(&c, &CommandResult::failed(&out.commands[0], "timeout"), 121);
        assert!(fx.events.iter().any(|ev| ev.event_type == EventType::CommandFailed));

        // Retried next tick until confirmed.
        let out = e.tick(&input(&c, Some(67.0), 240));
        assert_eq!(out.commands, vec![ActuatorCommand::new("heat", Action::Off)]);
        confirm_all(&mut e, &c, &out, 241);
        assert_eq!(e.retiring().count(), 0);
        assert!(e.tick(&input(&c, Some(67.0), 360)).commands.is_empty());
    }

    #[test]
    fn cooling_waits_for_retired_heater() {
        let mut c = cfg(64.0, 68.0);
        let mut e = engine();
        let out = e.tick(&input(&c, Some(60.0), 0));
        confirm_all(&mut e, &c, &out, 1);

        c.heating_actuator_id = "heat2".into();
        e.retire_actuator(ActuatorRole::Heating, "heat");
        let out = e.tick(&input(&c, Some(72.0), 120));
        assert_eq!(out.commands, vec![ActuatorCommand::new("heat", Action::Off)]);

        confirm_all(&mut e, &c, &out, 121);
        let out = e.tick(&input(&c, Some(72.0), 240));
        assert_eq!(out.commands, vec![ActuatorCommand::new("cool", Action::On)]);
    }

    #[test]
    fn readdressing_an_idle_role_needs_nothing() {
        let mut e = engine();
        assert!(!e.retire_actuator(ActuatorRole::Cooling, "cool"));
        assert_eq!(e.retiring().count(), 0);
    }

    #[test]
    fn off_not_blocked_by_stuck_pending_on() {
        let c = cfg(64.0, 68.0);
        let mut e = engine();
        e.tick(&input(&c, Some(60.0), 0));
        assert!(e.states().heating.pending);
        // No result ever arrives; temperature jumps past the midpoint.
        let out = e.tick(&input(&c, Some(67.0), 10));
        assert_eq!(out.commands, vec![ActuatorCommand::new("heat", Action::Off)]);
        assert_eq!(e.states().heating.pending_action, Some(Action::Off));
    }

    #[test]
    fn stale_pending_expires_as_failure() {
        let c = cfg(64.0, 68.0);
        let mut e = engine();
        e.tick(&input(&c, Some(60.0), 0));
        let out = e.tick(&input(&c, Some(60.0), 61));
        assert!(out.events.iter().any(|ev| ev.event_type == EventType::PendingExpired));
        assert_eq!(out.commands, vec![ActuatorCommand::new("heat", Action::On)]);
        assert!(!e.states().heating.last_error.is_empty());
    }

    #[test]
    fn sensor_loss_forces_off_and_alerts_once() {
        let c = cfg(64.0, 68.0);
        let mut e = engine();
        let out = e.tick(&input(&c, Some(60.0), 0));
        confirm_all(&mut e, &c, &out, 1);
        assert!(e.states().heating.on);

        let mut lost = input(&c, None, 120);
        lost.sensor_active = false;
        let out = e.tick(&lost);
        assert_eq!(out.mode, ControlMode::SafetyShutdown);
        assert_eq!(out.commands, vec![ActuatorCommand::new("heat", Action::Off)]);
        assert_eq!(out.alerts.len(), 1);
        assert!(out.status.contains("Red"));

        lost.now = 150;
        let again = e.tick(&lost);
        assert!(again.alerts.is_empty());
        assert!(again.commands.is_empty(), "off already in flight");
        confirm_all(&mut e, &c, &out, 151);
        assert!(!e.states().heating.on);

        let back = e.tick(&input(&c, Some(66.0), 360));
        assert!(matches!(&back.alerts[..], [Alert::Clear(k)] if k.kind == IncidentKind::SafetyShutdown));
    }

    #[test]
    fn inverted_limits_are_config_error() {
        let c = cfg(70.0, 65.0);
        let mut e = engine();
        let out = e.tick(&input(&c, Some(60.0), 0));
        assert_eq!(out.mode, ControlMode::ConfigError);
        assert!(out.commands.is_empty());
        assert!(out.status.starts_with("invalid configuration"));
    }

    #[test]
    fn no_reading_never_powers_on() {
        let c = cfg(64.0, 68.0);
        let mut e = engine();
        let out = e.tick(&input(&c, None, 0));
        assert!(out.commands.is_empty());
        assert_eq!(out.mode, ControlMode::Idle);
    }

    #[test]
    fn master_disable_drives_off() {
        let mut c = cfg(64.0, 68.0);
        let mut e = engine();
        let out = e.tick(&input(&c, Some(70.0), 0));
        confirm_all(&mut e, &c, &out, 1);
        assert!(e.states().cooling.on);
        c.active = false;
        let out = e.tick(&input(&c, Some(70.0), 120));
        assert_eq!(out.commands, vec![ActuatorCommand::new("cool", Action::Off)]);
        assert_eq!(out.mode, ControlMode::Idle);
    }

    #[test]
    fn cooling_waits_for_heating_off_confirmation() {
        let c = cfg(64.0, 68.0);
        let mut e = engine();
        let out = e.tick(&input(&c, Some(60.0), 0));
        confirm_all(&mut e, &c, &out, 1);

        // Jump straight above high: heating off is issued, cooling deferred.
        let out = e.tick(&input(&c, Some(70.0), 120));
        assert_eq!(out.commands, vec![ActuatorCommand::new("heat", Action::Off)]);
        confirm_all(&mut e, &c, &out, 121);

        let out = e.tick(&input(&c, Some(70.0), 240));
        assert_eq!(out.commands, vec![ActuatorCommand::new("cool", Action::On)]);
    }

    #[test]
    fn suppressed_result_clears_pending() {
        let c = cfg(64.0, 68.0);
        let mut e = engine();
        let out = e.tick(&input(&c, Some(60.0), 0));
        let r = CommandResult {
            outcome: CommandOutcome::Suppressed,
            ..CommandResult::success(&out.commands[0])
        };
        e.apply(&c, &r, 1);
        assert!(!e.states().heating.pending);
    }

    #[test]
    fn swapped_heater_is_flagged_once() {
        let mut c = cfg(64.0, 68.0);
        c.cooling_enabled = false;
        let mut e = engine();
        let out = e.tick(&input(&c, Some(63.0), 0));
        confirm_all(&mut e, &c, &out, 0);
        let mut alerts = 0;
        for (t, r) in [(300, 62.5), (600, 61.0), (720, 60.0)] {
            let out = e.tick(&input(&c, Some(r), t));
            alerts += out.alerts.len();
        }
        assert_eq!(alerts, 1);
        assert!(e.states().heating.anomaly_notified);
        assert!(e.states().heating.on, "anomaly never changes commands");
    }

    #[test]
    fn snapshot_reflects_runtime_state() {
        let c = cfg(64.0, 68.0);
        let mut e = engine();
        e.tick(&input(&c, Some(60.0), 0));
        let snap = e.snapshot();
        assert!(snap.heating_pending);
        assert_eq!(snap.heating_pending_action.as_deref(), Some("on"));
        assert_eq!(snap.mode, ControlMode::Heating);
        assert_eq!(snap.last_reading, Some(60.0));
    }
}
