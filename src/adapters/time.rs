//! Wall-clock time adapter.
//!
//! [`SystemClock`] implements [`ClockPort`] from `std::time::SystemTime`.
//! Sample timestamps, assignment times and the persisted snapshot are all
//! Unix seconds, so the control loop runs on the wall clock rather than a
//! monotonic one.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::ports::ClockPort;
use crate::config::UnixSecs;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now_secs(&self) -> UnixSecs {
        // A clock before 1970 reads as 0, which every freshness check treats
        // as "no fresh data".
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }
}
