//! ActuatorDispatcher worker thread against the simulated plugs.

use std::time::Instant;

use brewguard::adapters::sim_plug::SimulatedPlugs;
use brewguard::app::commands::{Action, ActuatorCommand, CommandOutcome, CommandResult};
use brewguard::app::ports::{ActuatorLink, DispatchError};
use brewguard::dispatch::{ActuatorDispatcher, DispatchSettings};
use embassy_time::Duration;

fn settings(timeout_ms: u64) -> DispatchSettings {
    DispatchSettings {
        device_timeout: Duration::from_millis(timeout_ms),
        cooldown: Duration::from_secs(10),
    }
}

/// Block until `n` results arrive (two second cap).
fn collect(d: &ActuatorDispatcher, n: usize) -> Vec<CommandResult> {
    let deadline = Instant::now() + std::time::Duration::from_secs(2);
    let mut out = Vec::new();
    while out.len() < n && Instant::now() < deadline {
        out.extend(d.drain_results());
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    out
}

#[test]
fn commands_complete_in_order() {
    let plugs = SimulatedPlugs::new(Duration::from_millis(1));
    let d = ActuatorDispatcher::spawn(plugs.clone(), settings(500)).unwrap();
    d.submit(ActuatorCommand::new("heat", Action::On)).unwrap();
    d.submit(ActuatorCommand::new("cool", Action::Off)).unwrap();
    let results = collect(&d, 2);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].actuator_id, "heat");
    assert!(results.iter().all(CommandResult::is_success));
    assert!(plugs.relay("heat"));
    // wake + set + verify per command
    assert_eq!(plugs.round_trips(), 6);
}

#[test]
fn repeat_inside_cooldown_is_suppressed() {
    let plugs = SimulatedPlugs::new(Duration::from_millis(1));
    let d = ActuatorDispatcher::spawn(plugs.clone(), settings(500)).unwrap();
    let on = ActuatorCommand::new("heat", Action::On);
    d.submit(on.clone()).unwrap();
    d.submit(on).unwrap();
    let results = collect(&d, 2);
    assert_eq!(results[0].outcome, CommandOutcome::Success);
    assert_eq!(results[1].outcome, CommandOutcome::Suppressed);
    assert_eq!(plugs.round_trips(), 3);
}

#[test]
fn failed_command_is_not_suppressed() {
    let plugs = SimulatedPlugs::new(Duration::from_millis(1));
    plugs.set_offline("heat", true);
    let d = ActuatorDispatcher::spawn(plugs.clone(), settings(500)).unwrap();
    let on = ActuatorCommand::new("heat", Action::On);
    d.submit(on.clone()).unwrap();
    d.submit(on).unwrap();
    let results = collect(&d, 2);
    assert!(results.iter().all(|r| r.error().is_some()));
    assert_eq!(plugs.round_trips(), 2);
}

#[test]
fn slow_plug_times_out_without_blocking_caller() {
    let plugs = SimulatedPlugs::new(Duration::from_millis(300));
    let d = ActuatorDispatcher::spawn(plugs, settings(20)).unwrap();
    let started = Instant::now();
    d.submit(ActuatorCommand::new("heat", Action::On)).unwrap();
    assert!(started.elapsed() < std::time::Duration::from_millis(20));
    let results = collect(&d, 1);
    assert_eq!(results[0].error(), Some("device round trip timed out"));
}

#[test]
fn stuck_relay_fails_verification() {
    let plugs = SimulatedPlugs::new(Duration::from_millis(1));
    plugs.set_stuck("cool", true);
    let d = ActuatorDispatcher::spawn(plugs, settings(500)).unwrap();
    d.submit(ActuatorCommand::new("cool", Action::On)).unwrap();
    let results = collect(&d, 1);
    assert!(results[0].error().unwrap().starts_with("verify mismatch"));
}

#[test]
fn shutdown_returns_late_results_and_refuses_new_work() {
    let plugs = SimulatedPlugs::new(Duration::from_millis(5));
    let mut d = ActuatorDispatcher::spawn(plugs, settings(500)).unwrap();
    d.submit(ActuatorCommand::new("heat", Action::On)).unwrap();
    d.submit(ActuatorCommand::new("heat", Action::Off)).unwrap();
    let late = d.shutdown();
    assert_eq!(late.len(), 2);
    assert_eq!(
        d.submit(ActuatorCommand::new("heat", Action::On)),
        Err(DispatchError::WorkerGone)
    );
    assert!(d.poll_result().is_none());
}
