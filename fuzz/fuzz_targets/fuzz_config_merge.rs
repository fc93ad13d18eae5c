//! Fuzz target: `ConfigMergeGuard::merge`
//!
//! Parses arbitrary bytes as a persisted config file and merges whatever
//! object comes out into a sane live config.  Asserts that the merge never
//! panics, never accepts a zero or non-finite limit over a sane one, and
//! never reports a runtime-only key as changed.
//!
//! cargo fuzz run fuzz_config_merge

#![no_main]

use brewguard::config::{ControlConfig, RUNTIME_ONLY_FIELDS};
use brewguard::merge::ConfigMergeGuard;
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(Value::Object(raw)) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let mut live = ControlConfig {
        heating_enabled: true,
        cooling_enabled: true,
        active: true,
        ..Default::default()
    };
    let report = ConfigMergeGuard::merge(&mut live, &raw, 1_000);

    assert!(live.low_limit.is_finite() && live.low_limit != 0.0);
    assert!(live.high_limit.is_finite() && live.high_limit != 0.0);
    for key in &report.changed {
        assert!(!RUNTIME_ONLY_FIELDS.contains(key), "runtime key {key} merged");
    }

    // Merging the same file twice changes nothing the second time.
    let again = ConfigMergeGuard::merge(&mut live, &raw, 1_000);
    assert!(again.changed.is_empty());
});
