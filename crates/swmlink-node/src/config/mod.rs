//! Component config loader (parse + validate).
//!
//! Accepts YAML or the JSON files older deployments ship with.

pub mod schema;

use std::fs;

use swmlink_core::error::{Result, SwmError};

pub use schema::{ComponentConfig, DEFAULT_GROUP};

pub fn load_from_file(path: &str) -> Result<ComponentConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| SwmError::InvalidConfig(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ComponentConfig> {
    let cfg: ComponentConfig = serde_yaml::from_str(s)
        .map_err(|e| SwmError::InvalidConfig(format!("invalid config: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
