//! Config reload through the real JSON file store.
//!
//! The file is rewritten behind the service's back the way external tooling
//! does it: half-written, with echoed runtime keys, with nulls.

use std::fs;

use brewguard::adapters::config_file::JsonConfigFile;
use brewguard::app::events::{ControlEvent, EventType};
use brewguard::app::ports::{ConfigError, ConfigPort, EventSink};
use brewguard::app::service::ControlService;
use brewguard::config::{ControlConfig, SystemConfig};

#[derive(Default)]
struct Sink(Vec<ControlEvent>);

impl EventSink for Sink {
    fn emit(&mut self, event: &ControlEvent) {
        self.0.push(event.clone());
    }
}

impl Sink {
    fn count(&self, ty: EventType) -> usize {
        self.0.iter().filter(|e| e.event_type == ty).count()
    }
}

fn live() -> ControlConfig {
    ControlConfig {
        low_limit: 64.0,
        high_limit: 68.0,
        heating_enabled: true,
        heating_actuator_id: "10.0.0.5".into(),
        active: true,
        ..Default::default()
    }
}

#[test]
fn own_save_reloads_as_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonConfigFile::new(dir.path().join("vessel.json"));
    let mut svc = ControlService::new(&SystemConfig::default(), live(), 0);
    let mut sink = Sink::default();

    svc.persist(&store).unwrap();
    let report = svc.reload(&store, &mut sink, 10).unwrap();
    assert!(!report.has_changes());
    assert!(!report.has_problems());
    assert_eq!(sink.count(EventType::ConfigMerged), 0);
    assert_eq!(svc.config(), &live());
}

#[test]
fn edited_limits_are_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vessel.json");
    let store = JsonConfigFile::new(&path);
    let mut svc = ControlService::new(&SystemConfig::default(), live(), 0);
    let mut sink = Sink::default();

    fs::write(&path, r#"{"low_limit": 60, "high_limit": 62.5, "notification_subject_prefix": "Stout"}"#).unwrap();
    let report = svc.reload(&store, &mut sink, 10).unwrap();
    assert_eq!(report.changed.len(), 3);
    assert_eq!(svc.config().low_limit, 60.0);
    assert_eq!(svc.config().high_limit, 62.5);
    assert_eq!(svc.config().notification_subject_prefix, "Stout");
    assert_eq!(sink.count(EventType::ConfigMerged), 1);
}

#[test]
fn null_limits_from_a_dashboard_write_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vessel.json");
    let store = JsonConfigFile::new(&path);
    let mut svc = ControlService::new(&SystemConfig::default(), live(), 0);
    let mut sink = Sink::default();

    fs::write(&path, r#"{"low_limit": null, "high_limit": 0, "active": false}"#).unwrap();
    let report = svc.reload(&store, &mut sink, 10).unwrap();
    assert_eq!(svc.config().low_limit, 64.0);
    assert_eq!(svc.config().high_limit, 68.0);
    assert!(!svc.config().active, "the valid key in the same file still applies");
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(sink.count(EventType::ConfigRejected), 1);
}

#[test]
fn truncated_file_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vessel.json");
    let store = JsonConfigFile::new(&path);
    let mut svc = ControlService::new(&SystemConfig::default(), live(), 0);
    let mut sink = Sink::default();

    fs::write(&path, r#"{"low_limit": 50, "high_lim"#).unwrap();
    assert!(matches!(svc.reload(&store, &mut sink, 10), Err(ConfigError::Corrupted(_))));
    assert_eq!(svc.config(), &live());
    assert_eq!(sink.count(EventType::ConfigRejected), 1);
}

#[test]
fn missing_file_is_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonConfigFile::new(dir.path().join("absent.json"));
    let mut svc = ControlService::new(&SystemConfig::default(), live(), 0);
    let mut sink = Sink::default();
    assert_eq!(svc.reload(&store, &mut sink, 10).unwrap_err(), ConfigError::NotFound);
    assert!(sink.0.is_empty());
}

#[test]
fn checkpoint_keeps_an_edit_made_since_the_last_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vessel.json");
    let store = JsonConfigFile::new(&path);
    let mut svc = ControlService::new(&SystemConfig::default(), live(), 0);
    let mut sink = Sink::default();
    svc.persist(&store).unwrap();

    // A dashboard lowers the high limit and tags the file between ticks.
    let mut raw = store.load_raw().unwrap();
    raw.insert("high_limit".into(), serde_json::json!(67.0));
    raw.insert("dashboard_note".into(), serde_json::json!("lager week"));
    fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

    svc.checkpoint(&store, &mut sink, 20).unwrap();
    assert_eq!(svc.config().high_limit, 67.0);
    let on_disk = store.load_raw().unwrap();
    assert_eq!(on_disk["high_limit"], serde_json::json!(67.0));
    assert_eq!(on_disk["dashboard_note"], serde_json::json!("lager week"));
}

#[test]
fn checkpoint_leaves_a_half_written_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vessel.json");
    let store = JsonConfigFile::new(&path);
    let mut svc = ControlService::new(&SystemConfig::default(), live(), 0);
    let mut sink = Sink::default();

    fs::write(&path, r#"{"low_limit": 50, "high_lim"#).unwrap();
    assert!(svc.checkpoint(&store, &mut sink, 10).is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"low_limit": 50, "high_lim"#);
}
