//! Runtime actuator state owned by the control engine.
//!
//! `ActuatorState` is the engine's record of what each plug is doing: the
//! last state the device *confirmed*, any command still in flight, and the
//! per-incident armed flags.  It is mutated only by issuing a command or by
//! applying a [`CommandResult`], never by a config reload.

use serde::{Deserialize, Serialize};

use crate::app::commands::{Action, CommandOutcome, CommandResult};
use crate::config::UnixSecs;

/// Which side of the loop an actuator serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorRole {
    Heating,
    Cooling,
}

impl ActuatorRole {
    pub const ALL: [ActuatorRole; 2] = [ActuatorRole::Heating, ActuatorRole::Cooling];

    pub fn other(self) -> Self {
        match self {
            Self::Heating => Self::Cooling,
            Self::Cooling => Self::Heating,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heating => "heating",
            Self::Cooling => "cooling",
        }
    }
}

/// What applying a result changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Device confirmed a state flip.
    Flipped { now_on: bool },
    /// Device confirmed the state it already had.
    Confirmed,
    /// Command failed; confirmed state preserved.
    Failed,
    /// Duplicate suppressed by the dispatcher cooldown.
    Suppressed,
}

/// Per-actuator runtime state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActuatorState {
    /// Last state confirmed by the device.
    pub on: bool,
    /// A command has been issued and no result has been applied yet.
    pub pending: bool,
    pub pending_action: Option<Action>,
    pub pending_since: Option<UnixSecs>,
    /// Empty when healthy.
    pub last_error: String,

    /// Temperature / time captured at the last confirmed off→on flip.
    pub baseline_temp: Option<f64>,
    pub baseline_time: Option<UnixSecs>,

    /// Anomaly notification already raised for the current on-period.
    pub anomaly_notified: bool,
    /// Device-failure notification already raised for the current incident.
    pub failure_notified: bool,
}

impl ActuatorState {
    /// The state the actuator is heading to: the pending action if a command
    /// is in flight, otherwise the confirmed state.
    pub fn effective_on(&self) -> bool {
        match self.pending_action {
            Some(action) if self.pending => action.is_on(),
            _ => self.on,
        }
    }

    /// True if the actuator is, or may shortly be, energised.
    pub fn possibly_on(&self) -> bool {
        self.on || (self.pending && self.pending_action == Some(Action::On))
    }

    /// Record that a command was handed to the dispatcher.
    ///
    /// A newer command always replaces an older pending one, so an `off`
    /// issued while an `on` is stuck clears the stale pending flag.
    pub fn mark_pending(&mut self, action: Action, now: UnixSecs) {
        self.pending = true;
        self.pending_action = Some(action);
        self.pending_since = Some(now);
    }

    pub fn clear_pending(&mut self) {
        self.pending = false;
        self.pending_action = None;
        self.pending_since = None;
    }

    /// Pending for longer than `timeout_secs`.
    pub fn pending_expired(&self, now: UnixSecs, timeout_secs: u64) -> bool {
        match self.pending_since {
            Some(since) if self.pending => now.saturating_sub(since) >= timeout_secs,
            _ => false,
        }
    }

    /// Apply a dispatcher result.
    ///
    /// `reading` is the latest temperature, captured as the anomaly baseline
    /// on an off→on flip.
    pub fn apply(&mut self, result: &CommandResult, reading: Option<f64>, now: UnixSecs) -> Applied {
        let matches_pending = self.pending && self.pending_action == Some(result.action);
        match &result.outcome {
            CommandOutcome::Success => {
                let was_on = self.on;
                self.on = result.action.is_on();
                self.last_error.clear();
                if matches_pending {
                    self.clear_pending();
                }
                if self.on == was_on {
                    return Applied::Confirmed;
                }
                if self.on {
                    self.baseline_temp = reading;
                    self.baseline_time = Some(now);
                } else {
                    self.baseline_temp = None;
                    self.baseline_time = None;
                    self.anomaly_notified = false;
                }
                Applied::Flipped { now_on: self.on }
            }
            CommandOutcome::Failed(error) => {
                // Physical state did not change: keep `on` as last confirmed.
                self.last_error.clone_from(error);
                if matches_pending {
                    self.clear_pending();
                }
                Applied::Failed
            }
            CommandOutcome::Suppressed => {
                if matches_pending {
                    self.clear_pending();
                }
                Applied::Suppressed
            }
        }
    }
}

/// Both actuator roles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActuatorStates {
    pub heating: ActuatorState,
    pub cooling: ActuatorState,
}

impl ActuatorStates {
    pub fn get(&self, role: ActuatorRole) -> &ActuatorState {
        match role {
            ActuatorRole::Heating => &self.heating,
            ActuatorRole::Cooling => &self.cooling,
        }
    }

    pub fn get_mut(&mut self, role: ActuatorRole) -> &mut ActuatorState {
        match role {
            ActuatorRole::Heating => &mut self.heating,
            ActuatorRole::Cooling => &mut self.cooling,
        }
    }

    /// Both actuators confirmed on at once.  Must never happen.
    pub fn both_on(&self) -> bool {
        self.heating.on && self.cooling.on
    }
}
