//! NotifyHandle worker thread: dedupe and clear across the channel.

use brewguard::app::ports::AlertPort;
use brewguard::config::SystemConfig;
use brewguard::notify::{IncidentKey, IncidentKind, Notification, NotifyHandle};

use crate::mock_hw::{ManualClock, SharedNotifier};

fn key() -> IncidentKey {
    IncidentKey::new(IncidentKind::SafetyShutdown, "sensor")
}

fn note() -> Notification {
    Notification::new("[Vessel] safety shutdown", "sensor lost")
}

fn system() -> SystemConfig {
    SystemConfig {
        notify_poll_secs: 1,
        ..Default::default()
    }
}

#[test]
fn repeated_raise_delivers_once() {
    let transport = SharedNotifier::default();
    let clock = ManualClock::default();
    clock.set(1000);
    let mut handle = NotifyHandle::spawn(transport.clone(), clock, &system()).unwrap();
    for _ in 0..5 {
        handle.raise(key(), note());
    }
    handle.shutdown();
    assert_eq!(transport.sent_count(), 1);
    assert_eq!(transport.sent.lock().unwrap()[0].0, "[Vessel] safety shutdown");
}

#[test]
fn clear_rearms_incident() {
    let transport = SharedNotifier::default();
    let clock = ManualClock::default();
    clock.set(1000);
    let mut handle = NotifyHandle::spawn(transport.clone(), clock.clone(), &system()).unwrap();
    handle.raise(key(), note());
    // Cleared and back within the same burst: still one incident.
    handle.clear(key());
    handle.raise(key(), note());
    std::thread::sleep(std::time::Duration::from_millis(50));
    clock.set(5000);
    handle.raise(key(), note());
    // Cleared for real, then recurring much later: a new incident.
    handle.clear(key());
    std::thread::sleep(std::time::Duration::from_millis(50));
    clock.set(6000);
    handle.raise(key(), note());
    handle.shutdown();
    assert_eq!(transport.sent_count(), 2);
}

#[test]
fn failing_transport_does_not_block_raise() {
    let transport = SharedNotifier::default();
    *transport.failing.lock().unwrap() = true;
    let mut handle = NotifyHandle::spawn(transport.clone(), ManualClock::default(), &system()).unwrap();
    let started = std::time::Instant::now();
    handle.raise(key(), note());
    handle.raise(IncidentKey::new(IncidentKind::DeviceFailure, "heating"), note());
    assert!(started.elapsed() < std::time::Duration::from_millis(50));
    handle.shutdown();
    assert_eq!(transport.sent_count(), 0);
}
