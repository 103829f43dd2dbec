use std::path::Path;

use crate::config::Config;
use crate::error::{ProxyError, Result};

/// Validates that every certificate/key/CA path the configuration names
/// actually exists before the server starts listening. Fatal on failure
/// per spec section 7 ("Certificate/trust error" at startup).
pub fn validate_config(cfg: &Config) -> Result<()> {
    require_file(&cfg.server.cert_path, "server.cert_path")?;
    require_file(&cfg.server.key_path, "server.key_path")?;
    require_file(&cfg.server.ca_path, "server.ca_path")?;

    if cfg.admin.enabled {
        if let Some(p) = &cfg.admin.cert_path {
            require_file(p, "admin.cert_path")?;
        }
        if let Some(p) = &cfg.admin.key_path {
            require_file(p, "admin.key_path")?;
        }
        if let Some(p) = &cfg.admin.ca_path {
            require_file(p, "admin.ca_path")?;
        }
    }

    if cfg.geoip.enabled && cfg.geoip.db_path.is_none() {
        return Err(ProxyError::Config(
            "geoip.enabled is true but geoip.db_path is not set".to_string(),
        ));
    }

    Ok(())
}

fn require_file(path: &str, field: &str) -> Result<()> {
    if !Path::new(path).exists() {
        return Err(ProxyError::Config(format!("{field} not found: {path}")));
    }
    Ok(())
}
