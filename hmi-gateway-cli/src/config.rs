//! Configuration loading and parsing

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use hmi_gateway::GatewayConfig;

/// Load a gateway configuration from a TOML file
///
/// Missing keys take their built-in defaults; an unknown key is a
/// config error, not silently ignored.
pub fn load_config(path: &Path) -> Result<GatewayConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config: GatewayConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    Ok(config)
}
