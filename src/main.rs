use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use aqi_relay::config::AqiConfig;
use aqi_relay::resolver::Resolver;
use aqi_relay::visits::VisitLog;
use aqi_relay::{telemetry, web};

/// Air quality lookup service with multi-provider fail-over
#[derive(Debug, Parser)]
#[command(name = "aqi-relay", version, about)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "AQI_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the config file
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AqiConfig::load_from_path(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let _telemetry = telemetry::init(&config.logging)?;

    let mut resolver = Resolver::from_config(&config)?;
    if config.visits.enabled {
        let log = VisitLog::open(&config.visits.path)?;
        tracing::info!("Recording visits to {}", config.visits.path.display());
        resolver = resolver.with_visits(Arc::new(log));
    }

    web::run(&config.server, Arc::new(resolver)).await
}
