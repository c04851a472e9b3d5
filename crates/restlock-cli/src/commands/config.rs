use clap::Subcommand;
use restlock_core::{Config, ConfigError};
use serde_json::json;

use super::{print_json, CliResult};

/// Host settings in `config.toml`. Break timing lives in the state store
/// and is changed with `restlock configure`.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting, e.g. `locked_resource` or `daemon.poll_interval_ms`
    Get { key: String },
    /// Validate and store one setting
    Set { key: String, value: String },
    /// Print every setting
    List,
    /// Overwrite config.toml with the built-in settings
    Reset,
}

pub fn run(action: ConfigAction) -> CliResult {
    let config = match action {
        ConfigAction::Reset => {
            let fresh = Config::default();
            fresh.save()?;
            fresh
        }
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or(ConfigError::UnknownKey(key.clone()))?;
            return print_json(&json!({ "key": key, "value": value }));
        }
        ConfigAction::Set { key, value } => {
            let mut edited = Config::load()?;
            edited.set(&key, &value)?;
            edited.save()?;
            let stored = edited.get(&key);
            return print_json(&json!({ "key": key, "value": stored }));
        }
        ConfigAction::List => Config::load()?,
    };
    print_json(&config)
}
