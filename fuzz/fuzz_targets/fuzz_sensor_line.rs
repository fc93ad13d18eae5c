//! Fuzz target: sensor feed line parser + registry ingest
//!
//! Feeds arbitrary text through `parse_line` and stores whatever parses.
//! The registry must never panic and never hold more than `MAX_SENSORS`.
//!
//! cargo fuzz run fuzz_sensor_line

#![no_main]

use brewguard::adapters::sensor_feed::parse_line;
use brewguard::config::SystemConfig;
use brewguard::sensors::{FreshnessPolicy, MAX_SENSORS, SensorRegistry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let registry = SensorRegistry::new(FreshnessPolicy::from_config(&SystemConfig::default()));
    for line in text.lines() {
        if let Ok(Some(sample)) = parse_line(line, 1_000) {
            let _ = registry.ingest(&sample, 1_000);
        }
    }
    assert!(registry.len() <= MAX_SENSORS);
});
