//! WDA layout gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────────────┐
//!                         │                     WDA GATEWAY                        │
//!                         │                                                        │
//!   Client ── /v2/* ──────┼─▶ http::server ─▶ auth gate ─▶ proxy ─▶ load_balancer ─┼──▶ layout API
//!                         │                     │                                  │
//!                         │             session / permission                       │
//!                         │               backends (auth)                          │
//!                         │                                                        │
//!   Ops ── /health ───────┼─▶ health board ◀── aggregator ──▶ repository probe     │
//!       └─ /metrics ──────┼─▶ prometheus        (ticker)  └──▶ upstream probe      │
//!                         │                                                        │
//!                         │   lifecycle: bind → register → serve → drain → dereg   │
//!                         └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::Instrument;

use wda_gateway::config::{load_config, Overrides};
use wda_gateway::lifecycle::signals::spawn_signal_listener;
use wda_gateway::observability::{logging, BuildInfo};
use wda_gateway::{Gateway, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "wda-gateway", version, about = "Authenticating gateway for the layout API")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "WDA_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Traffic listener port.
    #[arg(short, long, env = "WDA_HTTPD_PORT")]
    port: Option<u16>,

    /// Listener host.
    #[arg(long, env = "WDA_HTTPD_HOST")]
    host: Option<String>,

    /// Log level.
    #[arg(long, env = "WDA_LOG_LEVEL")]
    level: Option<String>,

    /// Log sink: `stdout` or a file path.
    #[arg(long, env = "WDA_LOG_FILE")]
    logfile: Option<String>,

    /// Consul agent address.
    #[arg(long, env = "WDA_CONSUL_URL")]
    consul: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            log_level: self.level.clone(),
            log_file: self.logfile.clone(),
            consul_url: self.consul.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config, &cli.overrides())?;
    logging::init(&config.log, config.app.is_production())?;

    let build = BuildInfo::current();
    let root = tracing::info_span!(
        "wda",
        program = %config.app.name,
        version = %build.version,
        githash = %build.githash,
        build = %build.build,
        env = %config.app.env,
    );

    async move {
        tracing::info!(config = %cli.config.display(), "Starting");

        let gateway = Gateway::bind(config, build).await?;
        let shutdown = Shutdown::new();
        spawn_signal_listener(shutdown.clone());

        gateway.run(shutdown).await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    }
    .instrument(root)
    .await
}
