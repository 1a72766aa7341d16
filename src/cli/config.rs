//! Config file loading

use crate::coordinator::CoordinatorConfig;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Load a JSON config; missing fields keep their defaults
pub fn load_config(path: &Path) -> Result<CoordinatorConfig, ConfigError> {
    let data = fs::read_to_string(path)?;
    let config: CoordinatorConfig = serde_json::from_str(&data)?;
    log::debug!("Loaded config from {:?}", path);
    Ok(config)
}
