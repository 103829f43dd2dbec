use std::fs;
use std::path::Path;

use crate::config::overrides::ConfigOverrides;
use crate::config::validator::validate_config;
use crate::config::Config;
use crate::error::{ProxyError, Result};

/// Loads, parses, applies CLI overrides to, and validates the configuration
/// file at `p`. Any failure here is fatal at startup (spec section 7).
pub fn load_from_path<P: AsRef<Path>>(p: P, overrides: &ConfigOverrides) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| ProxyError::Config(format!("failed to read config file: {e}")))?;
    let mut cfg: Config = toml::from_str(&txt)
        .map_err(|e| ProxyError::Config(format!("failed to parse config: {e}")))?;

    overrides.apply(&mut cfg);
    validate_config(&cfg)?;

    Ok(cfg)
}
