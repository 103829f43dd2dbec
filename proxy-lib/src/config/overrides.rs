use super::admin::Language;
use super::root::Config;

/// CLI-flag overrides layered on top of the parsed config file. Kept as a
/// plain struct (no `clap` dependency here) so the binary crate owns the
/// argument-parsing concern and this library only applies the result.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub stats: Option<bool>,
    pub stats_path: Option<String>,
    pub admin: Option<bool>,
    pub admin_port: Option<u16>,
    pub language: Option<Language>,
}

impl ConfigOverrides {
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(port) = self.port {
            cfg.server.listen.set_port(port);
        }
        if let Some(enabled) = self.stats {
            cfg.stats.enabled = enabled;
        }
        if let Some(path) = &self.stats_path {
            cfg.stats.db_path = path.clone();
        }
        if let Some(enabled) = self.admin {
            cfg.admin.enabled = enabled;
        }
        if let Some(port) = self.admin_port {
            cfg.admin.port = port;
        }
        if let Some(lang) = self.language {
            cfg.admin.language = lang;
        }
    }
}
