//! ControlService → ActuatorDispatcher → SimulatedPlugs, end to end.

use brewguard::adapters::sim_plug::SimulatedPlugs;
use brewguard::app::events::EventType;
use brewguard::app::service::ControlService;
use brewguard::config::{ControlConfig, SystemConfig};
use brewguard::control::ControlMode;
use brewguard::dispatch::{ActuatorDispatcher, DispatchSettings};
use brewguard::notify::IncidentKind;
use brewguard::sensors::{FreshnessPolicy, SensorRegistry};
use embassy_time::Duration;
use serde_json::json;

use crate::mock_hw::{MemStore, RecordingAlerts, RecordingSink, settle};

struct Rig {
    service: ControlService,
    sensors: SensorRegistry,
    plugs: SimulatedPlugs,
    dispatcher: ActuatorDispatcher,
    alerts: RecordingAlerts,
    sink: RecordingSink,
}

impl Rig {
    fn new(config: ControlConfig) -> Self {
        let system = SystemConfig::default();
        let plugs = SimulatedPlugs::new(Duration::from_millis(1));
        let settings = DispatchSettings {
            device_timeout: Duration::from_millis(500),
            cooldown: Duration::from_secs(10),
        };
        let dispatcher = ActuatorDispatcher::spawn(plugs.clone(), settings).unwrap();
        let mut sink = RecordingSink::default();
        let mut service = ControlService::new(&system, config, 0);
        service.start(&mut sink, 0);
        Self {
            service,
            sensors: SensorRegistry::new(FreshnessPolicy::from_config(&system)),
            plugs,
            dispatcher,
            alerts: RecordingAlerts::default(),
            sink,
        }
    }

    /// Ingest a reading, tick, and wait for every command to finish.
    fn step(&mut self, reading: Option<f64>, now: u64) -> ControlMode {
        if let Some(r) = reading {
            self.sensors.ingest_reading("Red", r, Some(1.050), now).unwrap();
        }
        let issued_before = self.service.metrics().commands_issued;
        let mode = self
            .service
            .tick(&self.sensors, &self.dispatcher, &self.alerts, &mut self.sink, now);
        let issued = (self.service.metrics().commands_issued - issued_before) as usize;
        let applied = settle(
            &mut self.service,
            &self.dispatcher,
            &self.alerts,
            &mut self.sink,
            now + 1,
            issued,
        );
        assert_eq!(applied, issued, "dispatcher results missing");
        assert!(!self.service.engine().states().both_on());
        mode
    }
}

fn vessel() -> ControlConfig {
    ControlConfig {
        low_limit: 64.0,
        high_limit: 68.0,
        heating_enabled: true,
        cooling_enabled: true,
        heating_actuator_id: "heat".into(),
        cooling_actuator_id: "cool".into(),
        active: true,
        ..Default::default()
    }
}

#[test]
fn full_heat_then_cool_cycle() {
    let mut rig = Rig::new(vessel());

    assert_eq!(rig.step(Some(60.0), 1000), ControlMode::Heating);
    assert!(rig.plugs.relay("heat"));

    // Past the midpoint: heating releases.
    assert_eq!(rig.step(Some(66.5), 1120), ControlMode::Idle);
    assert!(!rig.plugs.relay("heat"));

    assert_eq!(rig.step(Some(69.0), 1240), ControlMode::Cooling);
    assert!(rig.plugs.relay("cool"));
    assert!(!rig.plugs.relay("heat"));

    // Inside the band the chiller holds until the midpoint.
    assert_eq!(rig.step(Some(67.0), 1360), ControlMode::Cooling);
    assert_eq!(rig.step(Some(65.9), 1480), ControlMode::Idle);
    assert!(!rig.plugs.relay("cool"));

    assert_eq!(rig.service.metrics().commands_failed, 0);
    assert_eq!(rig.sink.count(EventType::ModeChanged), 4);
}

#[test]
fn jump_across_band_switches_without_overlap() {
    let mut rig = Rig::new(vessel());
    rig.step(Some(60.0), 1000);
    assert!(rig.plugs.relay("heat"));

    // Heating off goes out first; cooling waits for the confirmation.
    rig.step(Some(72.0), 1120);
    assert!(!rig.plugs.relay("heat"));
    assert!(!rig.plugs.relay("cool"));

    rig.step(Some(72.0), 1240);
    assert!(rig.plugs.relay("cool"));
}

#[test]
fn dead_plug_alerts_once_and_retries_every_tick() {
    let mut rig = Rig::new(vessel());
    rig.plugs.set_offline("heat", true);

    for t in [1000, 1120, 1240] {
        rig.step(Some(60.0), t);
        assert!(!rig.service.engine().states().heating.on);
    }
    assert_eq!(rig.alerts.raised(IncidentKind::DeviceFailure), 1);
    assert_eq!(rig.service.metrics().commands_failed, 3);
    assert!(rig.service.status().contains("heating error"));

    rig.plugs.set_offline("heat", false);
    rig.step(Some(60.0), 1360);
    assert!(rig.plugs.relay("heat"));
    assert_eq!(rig.alerts.cleared(IncidentKind::DeviceFailure), 1);
}

#[test]
fn lost_sensor_shuts_everything_off() {
    let mut rig = Rig::new(vessel());
    rig.step(Some(60.0), 1000);
    assert!(rig.plugs.relay("heat"));

    // No reading for longer than two control ticks.
    assert_eq!(rig.step(None, 1300), ControlMode::SafetyShutdown);
    assert!(!rig.plugs.relay("heat"));
    assert_eq!(rig.step(None, 1420), ControlMode::SafetyShutdown);
    assert_eq!(rig.alerts.raised(IncidentKind::SafetyShutdown), 1);
    assert_eq!(rig.sink.count(EventType::SafetyShutdown), 1);

    assert_eq!(rig.step(Some(65.0), 1540), ControlMode::Idle);
    assert_eq!(rig.alerts.cleared(IncidentKind::SafetyShutdown), 1);
    assert_eq!(rig.sink.count(EventType::SafetyCleared), 1);
}

#[test]
fn reload_never_touches_runtime_state() {
    let mut rig = Rig::new(vessel());
    rig.step(Some(60.0), 1000);
    assert!(rig.service.engine().states().heating.on);

    let store = MemStore::empty();
    store.set_json(json!({
        "low_limit": 62.0,
        "high_limit": null,
        "heating_on": false,
        "heating_pending": true,
        "mode": "idle",
    }));
    let report = rig.service.reload(&store, &mut rig.sink, 1010).unwrap();
    assert_eq!(report.excluded.len(), 3);
    assert_eq!(rig.service.config().low_limit, 62.0);
    assert_eq!(rig.service.config().high_limit, 68.0);
    assert!(rig.service.engine().states().heating.on);
    assert!(!rig.service.engine().states().heating.pending);

    // 60 is still below the new low limit: nothing changes.
    assert_eq!(rig.step(Some(60.0), 1120), ControlMode::Heating);
    assert_eq!(rig.service.metrics().commands_issued, 1);
}

#[test]
fn persisted_snapshot_tracks_the_tick() {
    let mut rig = Rig::new(vessel());
    let store = MemStore::empty();
    rig.step(Some(60.0), 1000);
    rig.service.persist(&store).unwrap();
    let saved = store.saved.borrow();
    let (cfg, snap) = saved.last().unwrap();
    assert_eq!(cfg, rig.service.config());
    assert!(snap.heating_on);
    assert_eq!(snap.mode, ControlMode::Heating);
    assert_eq!(snap.last_reading, Some(60.0));
}

#[test]
fn telemetry_reports_live_state() {
    let mut rig = Rig::new(vessel());
    rig.step(Some(60.0), 1000);
    let report = rig.service.telemetry(&rig.sensors, 1100);
    assert_eq!(report.uptime_secs, 1100);
    assert_eq!(report.sensor_id.as_deref(), Some("Red"));
    assert!(report.heating_on);
    assert_eq!(report.sensors_tracked, 1);
    rig.service.report_telemetry(&rig.sensors, &mut rig.sink, 1100);
    assert_eq!(rig.sink.count(EventType::Telemetry), 1);
}

#[test]
fn readdressed_heater_plug_is_switched_off() {
    let mut rig = Rig::new(vessel());
    rig.step(Some(60.0), 1000);
    assert!(rig.plugs.relay("heat"));

    let store = MemStore::empty();
    store.set_json(json!({"heating_actuator_id": "heat2"}));
    rig.service.reload(&store, &mut rig.sink, 1010).unwrap();
    assert_eq!(rig.service.config().heating_actuator_id, "heat2");
    assert_eq!(rig.service.engine().retiring().collect::<Vec<_>>(), vec!["heat"]);

    // Warm enough to idle: the old plug goes off, the new one stays off.
    assert_eq!(rig.step(Some(67.0), 1120), ControlMode::Idle);
    assert!(!rig.plugs.relay("heat"));
    assert!(!rig.plugs.relay("heat2"));
    assert_eq!(rig.service.engine().retiring().count(), 0);
}

#[test]
fn readdressed_heater_keeps_heating_on_the_new_plug() {
    let mut rig = Rig::new(vessel());
    rig.step(Some(60.0), 1000);

    let store = MemStore::empty();
    store.set_json(json!({"heating_actuator_id": "heat2"}));
    rig.service.reload(&store, &mut rig.sink, 1010).unwrap();

    assert_eq!(rig.step(Some(60.0), 1120), ControlMode::Heating);
    assert!(!rig.plugs.relay("heat"));
    assert!(rig.plugs.relay("heat2"));
}

#[test]
fn reassigned_sensor_gets_a_fresh_grace_period() {
    let mut config = vessel();
    config.assigned_sensor_id = "Red".into();
    config.assignment_time = 0;
    let mut rig = Rig::new(config);
    rig.step(Some(66.0), 1000);

    let store = MemStore::empty();
    store.set_json(json!({"assigned_sensor_id": "Blue"}));
    rig.service.reload(&store, &mut rig.sink, 5000).unwrap();
    assert_eq!(rig.service.config().assignment_time, 5000);

    // Blue has never reported; it is waited for instead of declared lost.
    rig.sensors.ingest_reading("Red", 66.0, None, 5010).unwrap();
    let mode = rig
        .service
        .tick(&rig.sensors, &rig.dispatcher, &rig.alerts, &mut rig.sink, 5010);
    assert_ne!(mode, ControlMode::SafetyShutdown);
    assert_eq!(rig.alerts.raised(IncidentKind::SafetyShutdown), 0);
}
