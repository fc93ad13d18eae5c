//! Swapped-actuator detection.
//!
//! When a plug is confirmed on, the engine captures a baseline temperature.
//! If after the observation window the temperature has drifted at least
//! `threshold_f` the *wrong* way (heater on and colder, chiller on and
//! warmer) the plugs are probably wired to the wrong roles.  Advisory only:
//! detection never changes a command.

use super::state::{ActuatorRole, ActuatorState};
use crate::config::UnixSecs;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyDetector {
    pub window_secs: u64,
    pub threshold_f: f64,
}

impl AnomalyDetector {
    pub fn new(window_secs: u64, threshold_f: f64) -> Self {
        Self {
            window_secs,
            threshold_f,
        }
    }

    /// Wrong-direction drift in °F if the anomaly condition holds, `None`
    /// otherwise.  Returns `None` once the incident has been notified.
    pub fn check(
        &self,
        role: ActuatorRole,
        state: &ActuatorState,
        reading: f64,
        now: UnixSecs,
    ) -> Option<f64> {
        if !state.on || state.anomaly_notified {
            return None;
        }
        let (baseline, since) = (state.baseline_temp?, state.baseline_time?);
        if now.saturating_sub(since) < self.window_secs {
            return None;
        }
        let drift = reading - baseline;
        let wrong_way = match role {
            ActuatorRole::Heating => -drift,
            ActuatorRole::Cooling => drift,
        };
        (wrong_way >= self.threshold_f).then_some(drift)
    }
}
