//! Actuator command / result messages.
//!
//! These cross the boundary between the control loop and the dispatcher
//! worker thread.  They are plain owned values with no shared actuator state
//! ever crosses the channel.
//!
//! Wire shape (JSON):
//!
//! ```text
//!  request  {"actuator_id": "192.168.1.40", "action": "on"}
//!  result   {"actuator_id": "192.168.1.40", "action": "on",
//!            "outcome": {"failed": "device round trip timed out"}}
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

/// Requested plug state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    On,
    Off,
}

impl Action {
    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for the dispatcher worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub actuator_id: String,
    pub action: Action,
}

impl ActuatorCommand {
    pub fn new(actuator_id: impl Into<String>, action: Action) -> Self {
        Self {
            actuator_id: actuator_id.into(),
            action,
        }
    }
}

/// How a command ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Device confirmed the requested state.
    Success,
    /// Command failed; the physical state is assumed unchanged.
    Failed(String),
    /// Identical command succeeded within the cooldown; device not touched.
    Suppressed,
}

/// The worker's answer to one [`ActuatorCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub actuator_id: String,
    pub action: Action,
    pub outcome: CommandOutcome,
}

impl CommandResult {
    pub fn success(cmd: &ActuatorCommand) -> Self {
        Self::with_outcome(cmd, CommandOutcome::Success)
    }

    pub fn failed(cmd: &ActuatorCommand, error: impl Into<String>) -> Self {
        Self::with_outcome(cmd, CommandOutcome::Failed(error.into()))
    }

    pub fn suppressed(cmd: &ActuatorCommand) -> Self {
        Self::with_outcome(cmd, CommandOutcome::Suppressed)
    }

    fn with_outcome(cmd: &ActuatorCommand, outcome: CommandOutcome) -> Self {
        Self {
            actuator_id: cmd.actuator_id.clone(),
            action: cmd.action,
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == CommandOutcome::Success
    }

    /// Error text for failed results.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            CommandOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}
