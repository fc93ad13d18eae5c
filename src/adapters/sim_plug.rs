//! Simulated smart plugs.
//!
//! Implements [`PlugPort`] with an in-memory relay table and an
//! `embassy_time` delay per round trip, so the dispatcher's timeout and
//! verification paths behave as they would against real hardware.  Used by
//! the binary when no plug transport is configured, and by the integration
//! tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use embassy_time::{Duration, Timer};
use log::debug;

use crate::app::ports::PlugPort;
use crate::error::DeviceError;

#[derive(Debug, Default)]
struct Bench {
    relays: HashMap<String, bool>,
    offline: HashSet<String>,
    /// Plugs that acknowledge `set_power` but never switch.
    stuck: HashSet<String>,
    round_trips: u64,
}

/// Cloneable handle: the dispatcher owns one clone, tests keep another to
/// inspect relays or inject faults.
#[derive(Debug, Clone)]
pub struct SimulatedPlugs {
    bench: Arc<Mutex<Bench>>,
    latency: Duration,
}

impl SimulatedPlugs {
    pub fn new(latency: Duration) -> Self {
        Self {
            bench: Arc::new(Mutex::new(Bench::default())),
            latency,
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut Bench) -> T) -> T {
        let mut guard = match self.bench.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn relay(&self, actuator_id: &str) -> bool {
        self.with(|b| b.relays.get(actuator_id).copied().unwrap_or(false))
    }

    pub fn set_offline(&self, actuator_id: &str, offline: bool) {
        self.with(|b| {
            if offline {
                b.offline.insert(actuator_id.to_owned());
            } else {
                b.offline.remove(actuator_id);
            }
        });
    }

    pub fn set_stuck(&self, actuator_id: &str, stuck: bool) {
        self.with(|b| {
            if stuck {
                b.stuck.insert(actuator_id.to_owned());
            } else {
                b.stuck.remove(actuator_id);
            }
        });
    }

    pub fn round_trips(&self) -> u64 {
        self.with(|b| b.round_trips)
    }

    async fn round_trip(&self, actuator_id: &str) -> Result<(), DeviceError> {
        Timer::after(self.latency).await;
        self.with(|b| {
            b.round_trips += 1;
            if b.offline.contains(actuator_id) {
                Err(DeviceError::Unreachable(format!("{actuator_id}: no route to host")))
            } else {
                Ok(())
            }
        })
    }
}

impl PlugPort for SimulatedPlugs {
    async fn wake(&mut self, actuator_id: &str) -> Result<(), DeviceError> {
        self.round_trip(actuator_id).await
    }

    async fn set_power(&mut self, actuator_id: &str, on: bool) -> Result<(), DeviceError> {
        self.round_trip(actuator_id).await?;
        self.with(|b| {
            if !b.stuck.contains(actuator_id) {
                b.relays.insert(actuator_id.to_owned(), on);
            }
        });
        debug!("sim plug {actuator_id} <- {}", if on { "on" } else { "off" });
        Ok(())
    }

    async fn read_power(&mut self, actuator_id: &str) -> Result<bool, DeviceError> {
        self.round_trip(actuator_id).await?;
        Ok(self.relay(actuator_id))
    }
}
