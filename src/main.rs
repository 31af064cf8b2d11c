use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dispatch_server::{config::ServerConfig, service::Service, tracing::setup_tracing};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "config file")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => {
            let path = path.to_str().context("invalid config path")?;
            ServerConfig::from_path(path)?
        }
        None => ServerConfig::default(),
    };

    setup_tracing(&config)?;

    let mut service = Service::new(config).await?;
    service.start().await
}
