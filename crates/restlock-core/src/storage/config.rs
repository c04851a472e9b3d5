//! TOML-based application configuration.
//!
//! Holds host-level settings that are not part of the break cycle itself:
//! - The locked resource surfaces are redirected to
//! - The default log filter
//! - Daemon polling cadence
//!
//! Break settings (interval, duration, enabled) live in the state store so
//! they are read atomically with scheduler state.
//!
//! Configuration is stored at `~/.config/restlock/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::surface::LockedResource;

/// Daemon-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/restlock/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_locked_resource")]
    pub locked_resource: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

fn default_locked_resource() -> String {
    LockedResource::DEFAULT.into()
}
fn default_log_filter() -> String {
    "info".into()
}
fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locked_resource: default_locked_resource(),
            log_filter: default_log_filter(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot replace a whole section".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or create the default file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or created.
    pub fn load_from(path: &Path) -> Result<Self> {
        if let Some(cfg) = Self::read_from(path)? {
            return Ok(cfg);
        }
        let cfg = Self::default();
        cfg.save_to(path)?;
        Ok(cfg)
    }

    /// Read the config file if there is one. Never writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// validated.
    pub fn read_from(path: &Path) -> Result<Option<Self>> {
        let load_failed = |message: String| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(load_failed(e.to_string()).into()),
        };
        let cfg: Config = toml::from_str(&content).map_err(|e| load_failed(e.to_string()))?;
        cfg.validate()?;
        Ok(Some(cfg))
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// [`Config::read_from`] at the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory is unavailable or the file
    /// exists but is unusable.
    pub fn read() -> Result<Option<Self>> {
        Self::read_from(&Self::path()?)
    }

    /// Reject values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns an error for an unusable locked resource or a zero poll interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locked_resource.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "locked_resource".into(),
                message: "must not be empty".into(),
            });
        }
        if let Err(e) = url::Url::parse(&self.locked_resource) {
            return Err(ConfigError::InvalidValue {
                key: "locked_resource".into(),
                message: format!("not an absolute URL: {e}"),
            });
        }
        if self.daemon.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "daemon.poll_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn locked_resource(&self) -> LockedResource {
        LockedResource::new(self.locked_resource.clone())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. Returns error if key is unknown
    /// or the resulting config is invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.locked_resource, "restlock://locked");
        assert_eq!(parsed.daemon.poll_interval_ms, 1000);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let parsed: Config = toml::from_str("log_filter = \"debug\"").unwrap();
        assert_eq!(parsed.log_filter, "debug");
        assert_eq!(parsed.locked_resource, LockedResource::DEFAULT);
        assert_eq!(parsed.daemon.poll_interval_ms, 1000);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("daemon.poll_interval_ms").as_deref(), Some("1000"));
        assert_eq!(cfg.get("log_filter").as_deref(), Some("info"));
        assert!(cfg.get("daemon.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_nested_number() {
        let mut cfg = Config::default();
        cfg.set("daemon.poll_interval_ms", "250").unwrap();
        assert_eq!(cfg.daemon.poll_interval_ms, 250);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_values() {
        let mut cfg = Config::default();
        assert!(cfg.set("daemon.nonexistent", "1").is_err());
        assert!(cfg.set("daemon.poll_interval_ms", "fast").is_err());
        assert!(cfg.set("daemon.poll_interval_ms", "0").is_err());
        assert!(cfg.set("locked_resource", "not a url").is_err());
        assert!(cfg.set("daemon", "{}").is_err());
        assert_eq!(cfg.daemon.poll_interval_ms, 1000);
    }

    #[test]
    fn load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.locked_resource, LockedResource::DEFAULT);

        let mut changed = cfg.clone();
        changed
            .set("locked_resource", "chrome-extension://abc/locked.html")
            .unwrap();
        changed.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert!(reloaded
            .locked_resource()
            .matches("chrome-extension://abc/locked.html?from=1"));
    }

    #[test]
    fn load_from_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "locked_resource = [").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn read_from_never_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(Config::read_from(&path).unwrap().is_none());
        assert!(!path.exists());

        std::fs::write(&path, "log_filter = \"debug\"\nlocked_resource = \"\"").unwrap();
        assert!(Config::read_from(&path).is_err());
    }
}
