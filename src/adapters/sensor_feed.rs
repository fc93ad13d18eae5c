//! Line-oriented sensor feed.
//!
//! Reads hydrometer samples from any [`BufRead`] (stdin in production, a
//! bridge process piping BLE advertisements) and ingests them into the
//! shared [`SensorRegistry`].  Two line shapes are accepted:
//!
//! ```text
//!  Red,66.4,1.048,1700000000        id,temp_f[,gravity][,unix_secs]
//!  {"sensor_id":"Red","value":66.4,"secondary_value":1.048,"timestamp":1700000000}
//! ```
//!
//! A missing timestamp is stamped with the clock on arrival; one too far
//! ahead of it is refused by the registry.  Blank lines and `#` comments are
//! skipped; malformed lines are logged and dropped.

use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, info, warn};

use crate::app::ports::ClockPort;
use crate::config::UnixSecs;
use crate::sensors::{Ingested, SensorRegistry, SensorSample};

/// Parse one feed line.  `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str, now: UnixSecs) -> Result<Option<SensorSample>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if line.starts_with('{') {
        return serde_json::from_str(line).map(Some).map_err(|e| e.to_string());
    }

    let mut fields = line.split(',').map(str::trim);
    let sensor_id = fields.next().filter(|s| !s.is_empty()).ok_or("missing sensor id")?;
    let value = fields
        .next()
        .ok_or("missing value")?
        .parse::<f64>()
        .map_err(|e| format!("bad value: {e}"))?;
    let secondary_value = match fields.next() {
        None | Some("") => None,
        Some(s) => Some(s.parse::<f64>().map_err(|e| format!("bad secondary value: {e}"))?),
    };
    let timestamp = match fields.next() {
        None | Some("") => now,
        Some(s) => s.parse::<UnixSecs>().map_err(|e| format!("bad timestamp: {e}"))?,
    };
    if fields.next().is_some() {
        return Err("too many fields".into());
    }
    Ok(Some(SensorSample {
        sensor_id: sensor_id.to_owned(),
        value,
        secondary_value,
        timestamp,
    }))
}

/// Feed every line of `input` into `registry` until EOF.  Returns the number
/// of samples stored.
pub fn pump<R: BufRead>(input: R, registry: &SensorRegistry, clock: &impl ClockPort) -> usize {
    let mut stored = 0;
    for (n, line) in input.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("sensor feed: read error, stopping: {e}");
                break;
            }
        };
        let now = clock.now_secs();
        let sample = match parse_line(&line, now) {
            Ok(Some(s)) => s,
            Ok(None) => continue,
            Err(e) => {
                warn!("sensor feed: line {}: {e}", n + 1);
                continue;
            }
        };
        match registry.ingest(&sample, now) {
            Ok(Ingested::Stored) => stored += 1,
            Ok(Ingested::Evicted(old)) => {
                info!("sensor feed: registry full, evicted '{old}' for '{}'", sample.sensor_id);
                stored += 1;
            }
            Ok(Ingested::OutOfOrder) => {
                debug!("sensor feed: out-of-order sample from '{}' dropped", sample.sensor_id);
            }
            Err(e) => warn!("sensor feed: '{}' rejected: {e}", sample.sensor_id),
        }
    }
    stored
}

/// Run [`pump`] on a named thread.
pub fn spawn<R, C>(input: R, registry: Arc<SensorRegistry>, clock: C) -> std::io::Result<JoinHandle<usize>>
where
    R: BufRead + Send + 'static,
    C: ClockPort + Send + 'static,
{
    std::thread::Builder::new()
        .name("sensor-feed".into())
        .spawn(move || {
            let n = pump(input, &registry, &clock);
            info!("sensor feed: input closed after {n} samples");
            n
        })
}
