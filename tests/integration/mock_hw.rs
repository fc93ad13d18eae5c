//! Mock adapters for integration tests.
//!
//! Each mock records what it was handed so tests can assert on the full
//! history.  Interior mutability only where the port takes `&self`.

use std::cell::RefCell;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use brewguard::app::events::{ControlEvent, EventType};
use brewguard::app::ports::{
    ActuatorLink, AlertPort, ClockPort, ConfigError, ConfigPort, EventSink, NotifierPort,
    NotifyError, RawConfig,
};
use brewguard::app::service::ControlService;
use brewguard::config::{ControlConfig, RuntimeSnapshot, UnixSecs};
use brewguard::notify::{IncidentKey, IncidentKind, Notification};

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<ControlEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, ty: EventType) -> usize {
        self.events.iter().filter(|e| e.event_type == ty).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &ControlEvent) {
        self.events.push(event.clone());
    }
}

// ── Alerts ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum AlertCall {
    Raise(IncidentKey, Notification),
    Clear(IncidentKey),
}

#[derive(Default)]
pub struct RecordingAlerts {
    pub calls: RefCell<Vec<AlertCall>>,
}

#[allow(dead_code)]
impl RecordingAlerts {
    pub fn raised(&self, kind: IncidentKind) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, AlertCall::Raise(k, _) if k.kind == kind))
            .count()
    }

    pub fn cleared(&self, kind: IncidentKind) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, AlertCall::Clear(k) if k.kind == kind))
            .count()
    }
}

impl AlertPort for RecordingAlerts {
    fn raise(&self, key: IncidentKey, notification: Notification) {
        self.calls.borrow_mut().push(AlertCall::Raise(key, notification));
    }

    fn clear(&self, key: IncidentKey) {
        self.calls.borrow_mut().push(AlertCall::Clear(key));
    }
}

// ── Config store ──────────────────────────────────────────────

/// In-memory config file.  `raw` is what the next reload will see.
pub struct MemStore {
    pub raw: RefCell<Result<RawConfig, ConfigError>>,
    pub saved: RefCell<Vec<(ControlConfig, RuntimeSnapshot)>>,
}

#[allow(dead_code)]
impl MemStore {
    pub fn empty() -> Self {
        Self {
            raw: RefCell::new(Err(ConfigError::NotFound)),
            saved: RefCell::new(Vec::new()),
        }
    }

    pub fn set_json(&self, value: serde_json::Value) {
        let map = match value {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(ConfigError::Corrupted(format!("not an object: {other}"))),
        };
        *self.raw.borrow_mut() = map;
    }
}

impl ConfigPort for MemStore {
    fn load_raw(&self) -> Result<RawConfig, ConfigError> {
        self.raw.borrow().clone()
    }

    fn save(&self, config: &ControlConfig, runtime: &RuntimeSnapshot) -> Result<(), ConfigError> {
        self.saved.borrow_mut().push((config.clone(), runtime.clone()));
        Ok(())
    }
}

// ── Clock ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ManualClock(pub Arc<Mutex<UnixSecs>>);

#[allow(dead_code)]
impl ManualClock {
    pub fn set(&self, now: UnixSecs) {
        *self.0.lock().unwrap() = now;
    }
}

impl ClockPort for ManualClock {
    fn now_secs(&self) -> UnixSecs {
        *self.0.lock().unwrap()
    }
}

// ── Notifier ──────────────────────────────────────────────────

/// Cloneable transport; the worker owns one clone, the test another.
#[derive(Clone, Default)]
pub struct SharedNotifier {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    pub failing: Arc<Mutex<bool>>,
}

#[allow(dead_code)]
impl SharedNotifier {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl NotifierPort for SharedNotifier {
    fn send(&mut self, subject: &str, body: &str) -> Result<(), NotifyError> {
        if *self.failing.lock().unwrap() {
            return Err(NotifyError::Delivery("smtp down".into()));
        }
        self.sent.lock().unwrap().push((subject.to_owned(), body.to_owned()));
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Apply dispatcher results until `expected` have arrived or two seconds
/// pass.  Returns how many were applied.
#[allow(dead_code)]
pub fn settle(
    service: &mut ControlService,
    link: &impl ActuatorLink,
    alerts: &impl AlertPort,
    sink: &mut impl EventSink,
    now: UnixSecs,
    expected: usize,
) -> usize {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut n = 0;
    while n < expected && Instant::now() < deadline {
        n += service.drain_results(link, alerts, sink, now);
        if n < expected {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
    n
}
