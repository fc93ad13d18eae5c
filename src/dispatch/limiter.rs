//! Duplicate-command suppression.
//!
//! Only successes are remembered.  A failure erases the actuator's record,
//! so a command that just failed is always eligible again on the very next
//! tick.

use std::collections::HashMap;

use embassy_time::{Duration, Instant};

use crate::app::commands::{Action, ActuatorCommand, CommandOutcome, CommandResult};

/// Last successful command for one actuator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub actuator_id: String,
    pub action: Action,
    pub last_sent_at: Instant,
    pub last_outcome: CommandOutcome,
}

#[derive(Debug)]
pub struct CommandLimiter {
    cooldown: Duration,
    records: HashMap<String, CommandRecord>,
}

impl CommandLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            records: HashMap::new(),
        }
    }

    /// True if the same action succeeded on this actuator within the cooldown.
    pub fn should_suppress(&self, cmd: &ActuatorCommand, now: Instant) -> bool {
        self.records.get(&cmd.actuator_id).is_some_and(|rec| {
            rec.action == cmd.action
                && now.checked_duration_since(rec.last_sent_at).is_some_and(|d| d < self.cooldown)
        })
    }

    /// Update the table with a device outcome.  Suppressed results leave it
    /// untouched.
    pub fn record(&mut self, result: &CommandResult, now: Instant) {
        match &result.outcome {
            CommandOutcome::Success => {
                self.records.insert(
                    result.actuator_id.clone(),
                    CommandRecord {
                        actuator_id: result.actuator_id.clone(),
                        action: result.action,
                        last_sent_at: now,
                        last_outcome: CommandOutcome::Success,
                    },
                );
            }
            CommandOutcome::Failed(_) => {
                self.records.remove(&result.actuator_id);
            }
            CommandOutcome::Suppressed => {}
        }
    }

    pub fn record_for(&self, actuator_id: &str) -> Option<&CommandRecord> {
        self.records.get(actuator_id)
    }
}
