pub mod config;
pub mod replay;

use std::path::Path;

use parlor_engine::{EngineConfig, Settings};

/// Load an engine config file, or the defaults.
fn load_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    match path {
        Some(path) => EngineConfig::from_json_file(path).map_err(|e| e.to_string()),
        None => Ok(EngineConfig::default()),
    }
}

/// Load a group settings file, or empty settings.
fn load_settings(path: Option<&Path>) -> Result<Settings, String> {
    match path {
        Some(path) => Settings::from_json_file(path).map_err(|e| e.to_string()),
        None => Ok(Settings::default()),
    }
}
