//! Notification tickets: dedupe, debounce and retry with backoff.
//!
//! ```text
//!  trigger ──▶ dedupe ──▶ ticket ──▶ send ──ok──▶ resolved
//!                                     │
//!                                    err
//!                                     ▼
//!                         wait backoff[n] ──▶ send ... ──▶ resolved
//!                                                 (after max attempts)
//! ```
//!
//! One ticket is kept per incident key.  While the underlying condition has
//! not cleared, every trigger for the key is deduplicated, however long ago
//! the ticket was delivered.  A new ticket is only created after
//! [`NotificationQueue::clear`] reported the condition gone and the key
//! re-triggers outside the debounce window; a condition that flaps back
//! inside the window stays the same incident.

use core::fmt;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::NotifierPort;
use crate::config::{SystemConfig, UnixSecs};

/// Maximum live tickets.  Incident keys are per role and per kind, so the
/// working set is tiny.
pub const MAX_TICKETS: usize = 16;

// ---------------------------------------------------------------------------
// Incident identity and payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    /// Authoritative sensor lost; actuators forced off.
    SafetyShutdown,
    /// Actuator moves temperature the wrong way.
    SwappedActuator,
    /// Device command failed.
    DeviceFailure,
    /// Limits are inconsistent.
    ConfigInvalid,
}

impl IncidentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SafetyShutdown => "safety_shutdown",
            Self::SwappedActuator => "swapped_actuator",
            Self::DeviceFailure => "device_failure",
            Self::ConfigInvalid => "config_invalid",
        }
    }
}

/// Incident kind plus the subject it concerns (a role, a sensor id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidentKey {
    pub kind: IncidentKind,
    pub subject: String,
}

impl IncidentKey {
    pub fn new(kind: IncidentKind, subject: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
        }
    }
}

impl fmt::Display for IncidentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.subject)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTicket {
    pub incident_key: IncidentKey,
    pub payload: Notification,
    pub created_at: UnixSecs,
    /// Failed delivery attempts so far.
    pub retry_count: u32,
    pub last_attempt_at: Option<UnixSecs>,
    /// Delivered, or given up on.
    pub resolved: bool,
    /// The incident's condition has gone away since this ticket was created.
    pub condition_cleared: bool,
}

impl NotificationTicket {
    fn new(incident_key: IncidentKey, payload: Notification, now: UnixSecs) -> Self {
        Self {
            incident_key,
            payload,
            created_at: now,
            retry_count: 0,
            last_attempt_at: None,
            resolved: false,
            condition_cleared: false,
        }
    }
}

/// Debounce and retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub debounce_secs: u64,
    /// Wait before retry *n*; the last entry repeats.
    pub backoff_secs: Vec<u64>,
    /// Total delivery attempts, including the first.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            debounce_secs: config.notify_debounce_secs,
            backoff_secs: config.notify_retry_backoff_secs.clone(),
            max_attempts: config.notify_max_attempts,
        }
    }

    /// Backoff before the retry that follows `failures` failed attempts.
    fn backoff_after(&self, failures: u32) -> u64 {
        let idx = (failures.saturating_sub(1) as usize).min(self.backoff_secs.len().saturating_sub(1));
        self.backoff_secs.get(idx).copied().unwrap_or(0)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

/// What [`NotificationQueue::trigger`] did with a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Same incident already known: nothing sent.
    Deduplicated,
    /// New ticket, delivered on the first attempt.
    Delivered,
    /// New ticket, first attempt failed; retry scheduled.
    RetryScheduled,
    /// New ticket, only attempt failed and no retries are allowed.
    Abandoned,
    /// Ticket table full of live incidents.
    Overflow,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct NotificationQueue {
    policy: RetryPolicy,
    tickets: heapless::Vec<NotificationTicket, MAX_TICKETS>,
    delivered: u32,
    abandoned: u32,
}

impl NotificationQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            tickets: heapless::Vec::new(),
            delivered: 0,
            abandoned: 0,
        }
    }

    /// Handle an incident trigger.  Delivers immediately for a new incident.
    pub fn trigger(
        &mut self,
        key: IncidentKey,
        payload: Notification,
        now: UnixSecs,
        transport: &mut impl NotifierPort,
    ) -> TriggerOutcome {
        if let Some(pos) = self.position(&key) {
            let debounce = self.policy.debounce_secs;
            let t = &mut self.tickets[pos];
            if !t.condition_cleared {
                return TriggerOutcome::Deduplicated;
            }
            if now.saturating_sub(t.created_at) < debounce {
                debug!("notify: {key} came back inside the debounce window; same incident");
                t.condition_cleared = false;
                return TriggerOutcome::Deduplicated;
            }
            if !t.resolved {
                info!("notify: {key} re-occurred before delivery; replacing ticket");
            }
            self.tickets.swap_remove(pos);
        }

        if self.tickets.is_full() && !self.evict_resolved() {
            warn!("notify: ticket table full, dropping {key}");
            return TriggerOutcome::Overflow;
        }

        let ticket = NotificationTicket::new(key, payload, now);
        // Capacity was ensured above.
        if self.tickets.push(ticket).is_err() {
            return TriggerOutcome::Overflow;
        }
        let idx = self.tickets.len() - 1;
        self.attempt(idx, now, transport);

        let t = &self.tickets[idx];
        match (t.resolved, t.retry_count) {
            (true, 0) => TriggerOutcome::Delivered,
            (true, _) => TriggerOutcome::Abandoned,
            (false, _) => TriggerOutcome::RetryScheduled,
        }
    }

    /// Retry every ticket whose backoff has elapsed.  Returns the number of
    /// attempts made.
    pub fn tick(&mut self, now: UnixSecs, transport: &mut impl NotifierPort) -> usize {
        let mut attempts = 0;
        for idx in 0..self.tickets.len() {
            if self.is_due(&self.tickets[idx], now) {
                self.attempt(idx, now, transport);
                attempts += 1;
            }
        }
        attempts
    }

    /// The incident's condition has cleared; the next trigger is a new incident.
    pub fn clear(&mut self, key: &IncidentKey) {
        if let Some(pos) = self.position(key) {
            self.tickets[pos].condition_cleared = true;
        }
    }

    pub fn ticket(&self, key: &IncidentKey) -> Option<&NotificationTicket> {
        self.position(key).map(|pos| &self.tickets[pos])
    }

    /// Tickets still waiting for a successful delivery.
    pub fn pending_count(&self) -> usize {
        self.tickets.iter().filter(|t| !t.resolved).count()
    }

    pub fn delivered_count(&self) -> u32 {
        self.delivered
    }

    pub fn abandoned_count(&self) -> u32 {
        self.abandoned
    }

    // ── Internal ──────────────────────────────────────────────────

    fn position(&self, key: &IncidentKey) -> Option<usize> {
        self.tickets.iter().position(|t| &t.incident_key == key)
    }

    fn is_due(&self, t: &NotificationTicket, now: UnixSecs) -> bool {
        if t.resolved {
            return false;
        }
        match t.last_attempt_at {
            Some(last) => now.saturating_sub(last) >= self.policy.backoff_after(t.retry_count),
            None => true,
        }
    }

    fn attempt(&mut self, idx: usize, now: UnixSecs, transport: &mut impl NotifierPort) {
        let max_attempts = self.policy.max_attempts;
        let t = &mut self.tickets[idx];
        t.last_attempt_at = Some(now);
        match transport.send(&t.payload.subject, &t.payload.body) {
            Ok(()) => {
                info!("notify: delivered {} ({})", t.incident_key, t.payload.subject);
                t.resolved = true;
                self.delivered += 1;
            }
            Err(e) => {
                t.retry_count += 1;
                if t.retry_count >= max_attempts {
                    error!(
                        "notify: {} permanently failed after {} attempts: {e}",
                        t.incident_key, t.retry_count
                    );
                    t.resolved = true;
                    self.abandoned += 1;
                } else {
                    warn!(
                        "notify: {} attempt {} failed: {e}",
                        t.incident_key, t.retry_count
                    );
                }
            }
        }
    }

    /// Drop the oldest resolved ticket, cleared incidents first.  False if
    /// every ticket is live.
    fn evict_resolved(&mut self) -> bool {
        let oldest = self
            .tickets
            .iter()
            .enumerate()
            .filter(|(_, t)| t.resolved)
            .min_by_key(|(_, t)| (!t.condition_cleared, t.created_at))
            .map(|(i, _)| i);
        match oldest {
            Some(i) => {
                self.tickets.swap_remove(i);
                true
            }
            None => false,
        }
    }
}
