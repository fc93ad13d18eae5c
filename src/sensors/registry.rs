//! Concurrency-safe latest-sample store.
//!
//! Readings arrive from a feed thread while the control loop selects from
//! the same map, so every access goes through a blocking critical-section
//! mutex.  The map is fixed-capacity; when a new id arrives and the table is
//! full, the entry with the oldest sample is evicted.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::selection::{self, FreshnessPolicy, MAX_CLOCK_SKEW_SECS, Selection};
use crate::config::{ControlConfig, UnixSecs};
use crate::error::SensorError;

/// Maximum distinct sensor ids tracked.
pub const MAX_SENSORS: usize = 16;
/// Maximum sensor id length in bytes.
pub const MAX_ID_LEN: usize = 32;

pub type SensorId = heapless::String<MAX_ID_LEN>;

/// One reading from a wireless hydrometer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub sensor_id: String,
    /// Temperature (°F).
    pub value: f64,
    /// Specific gravity, when the sensor reports it.
    pub secondary_value: Option<f64>,
    pub timestamp: UnixSecs,
}

/// Stored part of a sample; the id is the map key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Reading {
    pub value: f64,
    pub secondary_value: Option<f64>,
    pub timestamp: UnixSecs,
}

/// What [`SensorRegistry::ingest`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    Stored,
    /// Older than the stored sample for this id; dropped.
    OutOfOrder,
    /// Stored after evicting the stalest sensor.
    Evicted(String),
}

type Table = heapless::FnvIndexMap<SensorId, Reading, MAX_SENSORS>;

pub struct SensorRegistry {
    table: Mutex<CriticalSectionRawMutex, RefCell<Table>>,
    policy: FreshnessPolicy,
}

impl SensorRegistry {
    pub fn new(policy: FreshnessPolicy) -> Self {
        Self {
            table: Mutex::new(RefCell::new(Table::new())),
            policy,
        }
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    /// Store a sample received at `now`.
    ///
    /// A sample stamped more than [`MAX_CLOCK_SKEW_SECS`] ahead of `now` is
    /// rejected, and a stored sample that is itself that far ahead no longer
    /// blocks newer writes.
    pub fn ingest(&self, sample: &SensorSample, now: UnixSecs) -> Result<Ingested, SensorError> {
        if sample.timestamp > now.saturating_add(MAX_CLOCK_SKEW_SECS) {
            return Err(SensorError::FutureTimestamp {
                timestamp: sample.timestamp,
                now,
            });
        }
        self.store(
            &sample.sensor_id,
            sample.value,
            sample.secondary_value,
            sample.timestamp,
            Some(now),
        )
    }

    /// Store a reading whose timestamp is the receive time.  Last write wins
    /// per id, except that a sample older than the stored one is dropped.
    pub fn ingest_reading(
        &self,
        sensor_id: &str,
        value: f64,
        secondary_value: Option<f64>,
        timestamp: UnixSecs,
    ) -> Result<Ingested, SensorError> {
        self.store(sensor_id, value, secondary_value, timestamp, None)
    }

    fn store(
        &self,
        sensor_id: &str,
        value: f64,
        secondary_value: Option<f64>,
        timestamp: UnixSecs,
        now: Option<UnixSecs>,
    ) -> Result<Ingested, SensorError> {
        let id = parse_id(sensor_id)?;
        if !value.is_finite() {
            return Err(SensorError::NonFiniteValue);
        }
        let secondary_value = secondary_value.filter(|g| g.is_finite());
        let reading = Reading {
            value,
            secondary_value,
            timestamp,
        };

        self.table.lock(|cell| {
            let mut table = cell.borrow_mut();
            if let Some(existing) = table.get_mut(&id) {
                let existing_from_future =
                    now.is_some_and(|n| existing.timestamp > n.saturating_add(MAX_CLOCK_SKEW_SECS));
                if timestamp < existing.timestamp && !existing_from_future {
                    debug!("sensor {id}: dropping out-of-order sample @{timestamp}");
                    return Ok(Ingested::OutOfOrder);
                }
                *existing = reading;
                return Ok(Ingested::Stored);
            }

            let mut outcome = Ingested::Stored;
            if table.len() == MAX_SENSORS {
                let stalest = table
                    .iter()
                    .min_by_key(|(_, r)| r.timestamp)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = stalest {
                    table.remove(&victim);
                    info!("sensor table full; evicted {victim}");
                    outcome = Ingested::Evicted(victim.as_str().to_owned());
                }
            }
            if table.insert(id.clone(), reading).is_err() {
                // Only reachable if eviction found nothing, i.e. never.
                return Ok(Ingested::OutOfOrder);
            }
            info!("sensor {id}: first reading {value:.1}");
            Ok(outcome)
        })
    }

    /// Latest sample for `sensor_id`.
    pub fn latest(&self, sensor_id: &str) -> Option<SensorSample> {
        let id = parse_id(sensor_id).ok()?;
        self.table.lock(|cell| {
            cell.borrow().get(&id).map(|r| SensorSample {
                sensor_id: sensor_id.to_owned(),
                value: r.value,
                secondary_value: r.secondary_value,
                timestamp: r.timestamp,
            })
        })
    }

    /// Fresh iff `now - timestamp < stale_after_secs` and the sample is not
    /// stamped beyond the allowed clock skew.
    pub fn is_fresh(&self, sensor_id: &str, now: UnixSecs, stale_after_secs: u64) -> bool {
        self.latest(sensor_id).is_some_and(|s| {
            s.timestamp <= now.saturating_add(MAX_CLOCK_SKEW_SECS)
                && now.saturating_sub(s.timestamp) < stale_after_secs
        })
    }

    /// Pick the authoritative sensor for this vessel.
    pub fn select(&self, cfg: &ControlConfig, now: UnixSecs) -> Selection {
        self.table
            .lock(|cell| selection::select(&cell.borrow(), cfg, now, self.policy))
    }

    /// Thin form of [`select`](Self::select): the active id, if any, and
    /// whether control may proceed.
    pub fn active_sensor_id(&self, cfg: &ControlConfig, now: UnixSecs) -> (Option<String>, bool) {
        let sel = self.select(cfg, now);
        (sel.sensor_id().map(str::to_owned), sel.is_active())
    }

    pub fn len(&self) -> usize {
        self.table.lock(|cell| cell.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored sample, newest first.
    pub fn samples(&self) -> Vec<SensorSample> {
        let mut out: Vec<SensorSample> = self.table.lock(|cell| {
            cell.borrow()
                .iter()
                .map(|(id, r)| SensorSample {
                    sensor_id: id.as_str().to_owned(),
                    value: r.value,
                    secondary_value: r.secondary_value,
                    timestamp: r.timestamp,
                })
                .collect()
        });
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }
}

fn parse_id(raw: &str) -> Result<SensorId, SensorError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SensorError::EmptyId);
    }
    SensorId::try_from(trimmed).map_err(|()| SensorError::IdTooLong)
}
