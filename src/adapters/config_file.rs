//! JSON file config store.
//!
//! Implements [`ConfigPort`] over a single flat JSON object on disk.  The
//! file holds the persisted [`ControlConfig`] keys plus the
//! [`RuntimeSnapshot`] keys for tooling; the snapshot keys are stripped again
//! by the merge guard on every reload.
//!
//! Writes go to a sibling temp file and are renamed over the target, so a
//! reader never sees a half-written file from us.  Other writers are not so
//! careful, which is why [`ConfigPort::load_raw`] reports truncated or
//! non-object content as [`ConfigError::Corrupted`].

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::Value;

use crate::app::ports::{ConfigError, ConfigPort, RawConfig};
use crate::config::{ControlConfig, RuntimeSnapshot, SystemConfig, UnixSecs};

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Initial config for startup: the file parsed on top of defaults, or
    /// defaults if there is no file yet.
    pub fn load_initial(&self, now: UnixSecs) -> Result<ControlConfig, ConfigError> {
        match self.load_raw() {
            Ok(raw) => {
                let mut cfg = ControlConfig::default();
                let report = crate::merge::ConfigMergeGuard::merge(&mut cfg, &raw, now);
                info!(
                    "config: loaded {} ({} keys accepted)",
                    self.path.display(),
                    report.changed.len()
                );
                Ok(cfg)
            }
            Err(ConfigError::NotFound) => {
                info!("config: {} not found, using defaults", self.path.display());
                Ok(ControlConfig::default())
            }
            Err(e) => Err(e),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ConfigPort for JsonConfigFile {
    fn load_raw(&self) -> Result<RawConfig, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ConfigError::NotFound),
            Err(e) => return Err(ConfigError::Io(e.to_string())),
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ConfigError::Corrupted(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
            Err(e) => Err(ConfigError::Corrupted(e.to_string())),
        }
    }

    /// Keys other tools keep in the file survive; ours are overwritten.
    fn save(&self, config: &ControlConfig, runtime: &RuntimeSnapshot) -> Result<(), ConfigError> {
        let mut doc = self.load_raw().unwrap_or_default();
        doc.extend(to_object(config)?);
        doc.extend(to_object(runtime)?);
        let bytes = serde_json::to_vec_pretty(&Value::Object(doc))
            .map_err(|e| ConfigError::Io(e.to_string()))?;

        let tmp = self.tmp_path();
        let write = || -> io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&bytes)?;
            f.write_all(b"\n")?;
            f.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            // Best effort: leave no stray temp file behind.
            let _ = fs::remove_file(&tmp);
            ConfigError::Io(e.to_string())
        })?;
        debug!("config: saved {}", self.path.display());
        Ok(())
    }
}

/// Load process tunables: defaults, overlaid by an optional JSON file.
pub fn load_system_config(path: Option<&Path>) -> Result<SystemConfig, ConfigError> {
    let config = match path {
        None => SystemConfig::default(),
        Some(p) => {
            let text = fs::read_to_string(p).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ConfigError::NotFound,
                _ => ConfigError::Io(e.to_string()),
            })?;
            serde_json::from_str(&text).map_err(|e| ConfigError::Corrupted(e.to_string()))?
        }
    };
    config.validate()?;
    Ok(config)
}

fn to_object<T: serde::Serialize>(value: &T) -> Result<RawConfig, ConfigError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ConfigError::Io("value did not serialize to an object".into())),
        Err(e) => Err(ConfigError::Io(e.to_string())),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
