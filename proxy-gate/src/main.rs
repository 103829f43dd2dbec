#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use proxy_lib::config::Language;
use proxy_lib::{load_from_path, ConfigOverrides};
use tracing::{error, info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(author, version, about = "Mutually-authenticated HTTPS forward proxy")]
struct Cli {
    /// Path to the configuration TOML file.
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,
    /// Override the proxy listener port.
    #[arg(long)]
    port: Option<u16>,
    /// Enable or disable the statistics pipeline.
    #[arg(long)]
    stats: Option<bool>,
    /// Override the SQLite statistics database path.
    #[arg(long, value_name = "PATH")]
    stats_path: Option<String>,
    /// Enable or disable the admin listener.
    #[arg(long)]
    admin: Option<bool>,
    /// Override the admin listener port.
    #[arg(long)]
    admin_port: Option<u16>,
    /// Admin UI/API language: "en" or "zh".
    #[arg(long, value_name = "en|zh")]
    language: Option<String>,
}

fn parse_language(s: &str) -> Option<Language> {
    match s {
        "en" => Some(Language::En),
        "zh" => Some(Language::Zh),
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        port: cli.port,
        stats: cli.stats,
        stats_path: cli.stats_path.clone(),
        admin: cli.admin,
        admin_port: cli.admin_port,
        language: cli.language.as_deref().and_then(parse_language),
    };

    let cfg = match load_from_path(&cli.config, &overrides) {
        Ok(cfg) => Arc::new(cfg),
        Err(err) => {
            proxy_lib::telemetry::init_tracing("info");
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    proxy_lib::telemetry::init_tracing(&cfg.logging.level);

    info!(listen = %cfg.server.listen, admin_port = cfg.admin.port, "configuration loaded");

    let store = match proxy_lib::Store::open(&cfg.stats).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(%err, "failed to open statistics store");
            std::process::exit(1);
        }
    };

    let geoip = if cfg.geoip.enabled {
        cfg.geoip
            .db_path
            .as_ref()
            .and_then(|path| proxy_lib::geoip::Resolver::open(path))
            .map(Arc::new)
    } else {
        None
    };

    let collector = proxy_lib::Collector::spawn(cfg.stats.clone(), store.clone(), geoip);
    let stats_handle = collector.handle();

    let _retention_task = proxy_lib::store::spawn_retention_task(
        store.clone(),
        cfg.stats.retention.minute_stats_days,
        cfg.stats.retention.hourly_stats_days,
    );

    let mut tasks = Vec::new();

    if cfg.proxy.enabled {
        let proxy_acceptor = match proxy_lib::build_proxy_acceptor(&cfg.server.cert_path, &cfg.server.key_path, &cfg.server.ca_path) {
            Ok(acceptor) => acceptor,
            Err(err) => {
                error!(%err, "failed to build proxy tls acceptor");
                std::process::exit(1);
            }
        };

        let server_cfg = Arc::new(cfg.server.clone());
        let front_cfg = Arc::new(cfg.proxy.clone());
        let store = store.clone();
        let stats_handle = stats_handle.clone();
        tasks.push(tokio::spawn(async move {
            proxy_lib::proxy::run(server_cfg, front_cfg, proxy_acceptor, store, stats_handle, SHUTDOWN_TIMEOUT).await
        }));
    } else {
        warn!("proxy front end disabled by configuration");
    }

    if cfg.admin.enabled {
        let admin_cert = cfg.admin.cert_path.as_deref().unwrap_or(&cfg.server.cert_path);
        let admin_key = cfg.admin.key_path.as_deref().unwrap_or(&cfg.server.key_path);
        let admin_ca = cfg.admin.ca_path.as_deref().unwrap_or(&cfg.server.ca_path);

        let admin_acceptor = match proxy_lib::build_admin_acceptor(admin_cert, admin_key, admin_ca) {
            Ok(acceptor) => acceptor,
            Err(err) => {
                error!(%err, "failed to build admin tls acceptor");
                std::process::exit(1);
            }
        };

        let admin_port = cfg.admin.port;
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            proxy_lib::admin::run(admin_port, admin_acceptor, store, SHUTDOWN_TIMEOUT).await
        }));
    } else {
        warn!("admin listener disabled by configuration");
    }

    for task in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(%err, "listener exited with error"),
            Err(err) => error!(%err, "listener task panicked"),
        }
    }

    info!("draining statistics collector");
    collector.stop().await;
    info!("shutdown complete");
}
