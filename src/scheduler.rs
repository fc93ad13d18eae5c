//! Periodic job scheduler.
//!
//! The main loop owns one [`Scheduler`] and calls [`Scheduler::poll`] with
//! the wall clock.  Each due job is handed to a [`SchedulerDelegate`], which
//! runs the control tick, the config reload or the telemetry report.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       Scheduler                          │
//! │                                                          │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   │
//! │  │ ControlTick │   │ ConfigReload │   │  Telemetry   │   │
//! │  │   120 s     │   │     30 s     │   │    600 s     │   │
//! │  └──────┬──────┘   └──────┬───────┘   └──────┬───────┘   │
//! │         ▼                 ▼                  ▼           │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │                SchedulerDelegate                   │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Jobs run in slot order when several fall due together, so a reload due
//! at the same instant as a tick is applied after it.

use log::{debug, info, warn};

use crate::app::ports::{JobKind, SchedulerDelegate};
use crate::config::{SystemConfig, UnixSecs};

// ═══════════════════════════════════════════════════════════════
//  Job entries
// ═══════════════════════════════════════════════════════════════

/// Maximum number of jobs (stack-allocated).
const MAX_JOBS: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Job {
    kind: JobKind,
    interval_secs: u64,
    /// Next deadline; `None` until the first poll.
    next_due: Option<UnixSecs>,
    enabled: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

pub struct Scheduler {
    jobs: heapless::Vec<Job, MAX_JOBS>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: heapless::Vec::new(),
        }
    }

    /// The three controller jobs at their configured cadence.
    pub fn from_config(config: &SystemConfig) -> Self {
        let mut s = Self::new();
        s.add(JobKind::ControlTick, config.control_tick_secs);
        s.add(JobKind::ConfigReload, config.config_reload_secs);
        s.add(JobKind::Telemetry, config.telemetry_interval_secs);
        s
    }

    /// Register a job.  An interval of zero disables it.  Returns `false` if
    /// the job table is full or the kind is already registered.
    pub fn add(&mut self, kind: JobKind, interval_secs: u64) -> bool {
        if self.jobs.iter().any(|j| j.kind == kind) {
            warn!("Scheduler: {kind:?} already registered");
            return false;
        }
        let job = Job {
            kind,
            interval_secs,
            next_due: None,
            enabled: interval_secs > 0,
        };
        if self.jobs.push(job).is_err() {
            warn!("Scheduler: job table full, {kind:?} dropped");
            return false;
        }
        info!("Scheduler: {kind:?} every {interval_secs}s");
        true
    }

    pub fn set_enabled(&mut self, kind: JobKind, enabled: bool) {
        if let Some(job) = self.jobs.iter_mut().find(|j| j.kind == kind) {
            job.enabled = enabled && job.interval_secs > 0;
        }
    }

    /// Force `kind` to run on the next poll.
    pub fn trigger_now(&mut self, kind: JobKind) {
        if let Some(job) = self.jobs.iter_mut().find(|j| j.kind == kind) {
            job.next_due = Some(0);
        }
    }

    /// Run every due job.  Every job is due on the first poll.
    ///
    /// A job that overran several intervals fires once and is rescheduled
    /// from `now`, never in a burst.
    pub fn poll(&mut self, now: UnixSecs, delegate: &mut dyn SchedulerDelegate) -> usize {
        let mut fired = 0;
        for job in self.jobs.iter_mut().filter(|j| j.enabled) {
            let due = job.next_due.is_none_or(|d| now >= d);
            if !due {
                continue;
            }
            if let Some(d) = job.next_due {
                let late = now.saturating_sub(d);
                if late >= job.interval_secs && d != 0 {
                    debug!("Scheduler: {:?} late by {late}s", job.kind);
                }
            }
            job.next_due = Some(now.saturating_add(job.interval_secs));
            delegate.on_job_due(job.kind, now);
            fired += 1;
        }
        fired
    }

    /// Seconds until the earliest deadline, `0` if something is due.
    pub fn until_next(&self, now: UnixSecs) -> u64 {
        self.jobs
            .iter()
            .filter(|j| j.enabled)
            .map(|j| j.next_due.map_or(0, |d| d.saturating_sub(now)))
            .min()
            .unwrap_or(u64::MAX)
    }

    pub fn active_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.enabled).count()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
