mod config;
mod content_loader;
mod error;
mod feed;
mod fence;
mod markdown;
mod models;
mod watch;

use std::{path::PathBuf, process::ExitCode};

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::SiteConfig;
use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "site.toml";

async fn run(is_development: bool) -> Result<()> {
    let config_path = std::env::var("SITE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = SiteConfig::load(&config_path).await?;

    let written = feed::generate_feeds(&config).await?;
    info!(feeds = written.len(), out_dir = %config.out_dir.display(), "Feeds generated");

    if is_development {
        watch::watch_and_regenerate(&config).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let is_development = std::env::var("RUST_ENV")
        .map(|v| v == "development")
        .unwrap_or(false);

    // logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("RUST_ENV is set to development: {}", is_development);

    match run(is_development).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match std::error::Error::source(&e) {
                Some(source) => error!("{}: {}", e, source),
                None => error!("{}", e),
            }
            ExitCode::FAILURE
        }
    }
}
