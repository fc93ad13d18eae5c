//! Authoritative-sensor selection.
//!
//! ```text
//!  assigned id set?
//!    ├─ yes: fresh ────────────────▶ Assigned
//!    │       stale, inside grace ──▶ Grace       (active, no reading)
//!    │       stale, past grace ────▶ Lost
//!    └─ no:  any fresh sensor ─────▶ Fallback    (freshest wins)
//!            seen, none fresh ─────▶ Lost
//!            never seen any ───────▶ Unconfigured (active, no reading)
//! ```
//!
//! An assignment never falls back to another sensor's reading.  A sample
//! stamped beyond [`MAX_CLOCK_SKEW_SECS`] ahead of the clock is never fresh.

use super::registry::{Reading, SensorId, MAX_SENSORS};
use crate::config::{ControlConfig, SystemConfig, UnixSecs};
use crate::error::Error;

/// How far ahead of the local clock a sample timestamp may be.
pub const MAX_CLOCK_SKEW_SECS: u64 = 60;

/// Freshness and grace windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    /// A sample is fresh while `now - timestamp` is below this.
    pub stale_after_secs: u64,
    /// Staleness is tolerated this long after `assignment_time`.
    pub grace_secs: u64,
}

impl FreshnessPolicy {
    /// Derived from the control tick interval, never a logging interval.
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            stale_after_secs: config.stale_after_secs(),
            grace_secs: config.sensor_grace_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Assigned {
        sensor_id: String,
        value: f64,
        age_secs: u64,
    },
    /// Assigned sensor not fresh yet, still inside the grace period.
    Grace {
        sensor_id: String,
        age_secs: Option<u64>,
    },
    Fallback {
        sensor_id: String,
        value: f64,
        age_secs: u64,
    },
    /// No assignment and no sensor ever seen.
    Unconfigured,
    Lost {
        sensor_id: Option<String>,
        age_secs: Option<u64>,
    },
}

impl Selection {
    /// Whether control may proceed.  Only `Lost` is inactive.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Lost { .. })
    }

    pub fn sensor_id(&self) -> Option<&str> {
        match self {
            Self::Assigned { sensor_id, .. }
            | Self::Grace { sensor_id, .. }
            | Self::Fallback { sensor_id, .. } => Some(sensor_id),
            Self::Lost { sensor_id, .. } => sensor_id.as_deref(),
            Self::Unconfigured => None,
        }
    }

    /// Usable temperature, only for a fresh selection.
    pub fn reading(&self) -> Option<f64> {
        match self {
            Self::Assigned { value, .. } | Self::Fallback { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn age_secs(&self) -> Option<u64> {
        match self {
            Self::Assigned { age_secs, .. } | Self::Fallback { age_secs, .. } => Some(*age_secs),
            Self::Grace { age_secs, .. } | Self::Lost { age_secs, .. } => *age_secs,
            Self::Unconfigured => None,
        }
    }

    /// The stale-sensor error when the selection is lost.
    pub fn error(&self) -> Option<Error> {
        match self {
            Self::Lost {
                sensor_id,
                age_secs,
            } => Some(Error::SensorStale {
                sensor_id: sensor_id.clone(),
                age_secs: *age_secs,
            }),
            _ => None,
        }
    }
}

pub(crate) fn select(
    table: &heapless::FnvIndexMap<SensorId, Reading, MAX_SENSORS>,
    cfg: &ControlConfig,
    now: UnixSecs,
    policy: FreshnessPolicy,
) -> Selection {
    let age = |r: &Reading| now.saturating_sub(r.timestamp);
    let plausible = |r: &Reading| r.timestamp <= now.saturating_add(MAX_CLOCK_SKEW_SECS);
    let fresh = |r: &Reading| plausible(r) && age(r) < policy.stale_after_secs;

    if cfg.has_assigned_sensor() {
        let wanted = cfg.assigned_sensor_id.trim();
        let found = table.iter().find(|(id, _)| id.as_str() == wanted).map(|(_, r)| *r);
        let sensor_id = wanted.to_owned();
        if let Some(r) = found {
            if fresh(&r) {
                return Selection::Assigned {
                    sensor_id,
                    value: r.value,
                    age_secs: age(&r),
                };
            }
        }
        let age_secs = found.as_ref().map(age);
        if now.saturating_sub(cfg.assignment_time) < policy.grace_secs {
            return Selection::Grace {
                sensor_id,
                age_secs,
            };
        }
        return Selection::Lost {
            sensor_id: Some(sensor_id),
            age_secs,
        };
    }

    if table.is_empty() {
        return Selection::Unconfigured;
    }
    let freshest = table
        .iter()
        .filter(|(_, r)| plausible(r))
        .max_by_key(|(_, r)| r.timestamp);
    match freshest {
        None => Selection::Lost {
            sensor_id: None,
            age_secs: None,
        },
        Some((id, r)) if fresh(r) => Selection::Fallback {
            sensor_id: id.as_str().to_owned(),
            value: r.value,
            age_secs: age(r),
        },
        Some((id, r)) => Selection::Lost {
            sensor_id: Some(id.as_str().to_owned()),
            age_secs: Some(age(r)),
        },
    }
}
