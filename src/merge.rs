//! Config merge guard.
//!
//! The persisted config file is rewritten by other tools, sometimes
//! half-written, sometimes with runtime keys echoed back from an old
//! snapshot.  Every reload passes through [`ConfigMergeGuard::merge`], which
//! judges each key on its own:
//!
//! ```text
//!  key in RUNTIME_ONLY_FIELDS ──▶ excluded   (runtime state is never reloaded)
//!  low_limit / high_limit
//!     null, 0, NaN, non-numeric
//!     while live value is sane ──▶ rejected   (live kept)
//!  known key, wrong JSON type ───▶ corrupted  (live kept)
//!  known key, well typed ────────▶ accepted
//!  anything else ────────────────▶ unknown    (ignored)
//! ```

use log::{debug, info, warn};
use serde_json::Value;

use crate::app::ports::RawConfig;
use crate::config::{ControlConfig, RUNTIME_ONLY_FIELDS, UnixSecs};
use crate::error::Error;

/// What a merge did, key by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Accepted keys whose value differed from the live one.
    pub changed: Vec<&'static str>,
    /// Runtime-only keys present in the file.
    pub excluded: Vec<String>,
    /// Limit values refused, with the reason.
    pub rejected: Vec<(&'static str, String)>,
    /// Known keys with a wrongly typed value.
    pub corrupted: Vec<&'static str>,
    pub unknown: Vec<String>,
}

impl MergeReport {
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// True if anything in the file was refused.
    pub fn has_problems(&self) -> bool {
        !self.rejected.is_empty() || !self.corrupted.is_empty()
    }

    /// The refused values as persistence-corruption errors.
    pub fn errors(&self) -> Vec<Error> {
        let rejected = self
            .rejected
            .iter()
            .map(|(key, why)| Error::PersistenceCorruption(format!("{key}: {why}")));
        let corrupted = self
            .corrupted
            .iter()
            .map(|key| Error::PersistenceCorruption(format!("{key}: wrong type")));
        rejected.chain(corrupted).collect()
    }
}

pub struct ConfigMergeGuard;

impl ConfigMergeGuard {
    /// Merge a reloaded file into the live config.
    ///
    /// `assignment_time` only moves forward.  When the assigned sensor changes
    /// and the file brings no newer time, the assignment is stamped `now` so
    /// the new sensor gets its full grace period.
    pub fn merge(live: &mut ControlConfig, reloaded: &RawConfig, now: UnixSecs) -> MergeReport {
        let mut report = MergeReport::default();
        let previous_sensor = live.assigned_sensor_id.trim().to_owned();
        let previous_time = live.assignment_time;
        let mut file_time = None;

        for (key, value) in reloaded {
            if RUNTIME_ONLY_FIELDS.contains(&key.as_str()) {
                report.excluded.push(key.clone());
                continue;
            }
            match key.as_str() {
                "low_limit" => merge_limit("low_limit", &mut live.low_limit, Some(value), &mut report),
                "high_limit" => merge_limit("high_limit", &mut live.high_limit, Some(value), &mut report),
                "heating_enabled" => merge_bool("heating_enabled", &mut live.heating_enabled, value, &mut report),
                "cooling_enabled" => merge_bool("cooling_enabled", &mut live.cooling_enabled, value, &mut report),
                "heating_actuator_id" => {
                    merge_string("heating_actuator_id", &mut live.heating_actuator_id, value, &mut report);
                }
                "cooling_actuator_id" => {
                    merge_string("cooling_actuator_id", &mut live.cooling_actuator_id, value, &mut report);
                }
                "assigned_sensor_id" => {
                    merge_string("assigned_sensor_id", &mut live.assigned_sensor_id, value, &mut report);
                }
                "assignment_time" => file_time = Some(value),
                "active" => merge_bool("active", &mut live.active, value, &mut report),
                "notify_safety_shutdown" => {
                    merge_bool("notify_safety_shutdown", &mut live.notify_safety_shutdown, value, &mut report);
                }
                "notify_anomaly" => merge_bool("notify_anomaly", &mut live.notify_anomaly, value, &mut report),
                "notify_device_failure" => {
                    merge_bool("notify_device_failure", &mut live.notify_device_failure, value, &mut report);
                }
                "notification_subject_prefix" => merge_string(
                    "notification_subject_prefix",
                    &mut live.notification_subject_prefix,
                    value,
                    &mut report,
                ),
                _ => report.unknown.push(key.clone()),
            }
        }

        if let Some(value) = file_time {
            merge_time("assignment_time", &mut live.assignment_time, value, &mut report);
        }
        let reassigned = live.assigned_sensor_id.trim() != previous_sensor;
        if reassigned && live.has_assigned_sensor() && live.assignment_time == previous_time && now > previous_time {
            info!("config reload: sensor reassigned to '{}', grace starts now", live.assigned_sensor_id.trim());
            live.assignment_time = now;
            report.changed.push("assignment_time");
        }

        // A missing limit is as bad as a null one.
        if !reloaded.contains_key("low_limit") {
            merge_limit("low_limit", &mut live.low_limit, None, &mut report);
        }
        if !reloaded.contains_key("high_limit") {
            merge_limit("high_limit", &mut live.high_limit, None, &mut report);
        }

        for (key, why) in &report.rejected {
            warn!("config reload: {key} rejected ({why}); keeping live value");
        }
        for key in &report.corrupted {
            warn!("config reload: {key} has the wrong type; keeping live value");
        }
        if !report.unknown.is_empty() {
            debug!("config reload: ignoring unknown keys {:?}", report.unknown);
        }
        report
    }
}

fn is_sane_limit(v: f64) -> bool {
    v.is_finite() && v != 0.0
}

fn merge_limit(key: &'static str, live: &mut f64, value: Option<&Value>, report: &mut MergeReport) {
    let incoming = value.and_then(Value::as_f64);
    match incoming {
        Some(v) if is_sane_limit(v) => {
            if *live != v {
                *live = v;
                report.changed.push(key);
            }
        }
        _ if is_sane_limit(*live) => {
            let why = match value {
                None => "missing".to_owned(),
                Some(Value::Null) => "null".to_owned(),
                Some(Value::Number(n)) => format!("implausible value {n}"),
                Some(other) => format!("not a number: {other}"),
            };
            report.rejected.push((key, why));
        }
        // Live value is already unusable: take any number we are given.
        Some(v) => {
            if *live != v {
                *live = v;
                report.changed.push(key);
            }
        }
        None if value.is_some() => report.corrupted.push(key),
        None => {}
    }
}

fn merge_bool(key: &'static str, live: &mut bool, value: &Value, report: &mut MergeReport) {
    match value.as_bool() {
        Some(v) => {
            if *live != v {
                *live = v;
                report.changed.push(key);
            }
        }
        None => report.corrupted.push(key),
    }
}

fn merge_string(key: &'static str, live: &mut String, value: &Value, report: &mut MergeReport) {
    match value.as_str() {
        Some(v) => {
            if live.as_str() != v {
                v.clone_into(live);
                report.changed.push(key);
            }
        }
        None => report.corrupted.push(key),
    }
}

/// Accepts only a time newer than the live one; an older one is a stale echo.
fn merge_time(key: &'static str, live: &mut UnixSecs, value: &Value, report: &mut MergeReport) {
    let parsed = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as UnixSecs)
    });
    match parsed {
        Some(v) if v > *live => {
            *live = v;
            report.changed.push(key);
        }
        Some(_) => {}
        None => report.corrupted.push(key),
    }
}
