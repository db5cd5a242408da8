//! `rss2epub` binary: parse arguments, set up logging and the stop signal,
//! then hand off to the [`Monitor`].

mod cli;

use std::future::Future;
use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rss2epub::error::ConfigError;
use rss2epub::registry::parse_source_url;
use rss2epub::{
    Converter, FetchConfig, HttpFetcher, Monitor, Schedule, Settings, SourceRegistry,
};

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (registry, schedule) = match &cli.command {
        Command::Once { url } => {
            parse_source_url(url).map_err(|reason| ConfigError::InvalidUrl {
                url: url.clone(),
                reason,
            })?;
            (SourceRegistry::single(url.clone()), Schedule::Once)
        }
        Command::Watch { feeds, interval } => {
            let registry =
                SourceRegistry::from_file(feeds).map_err(|source| ConfigError::SourceList {
                    path: feeds.clone(),
                    source,
                })?;
            (registry, Schedule::Every(Duration::from_secs(*interval)))
        }
    };

    let fetcher = HttpFetcher::new(&FetchConfig {
        timeout: Duration::from_secs(cli.timeout),
        ..FetchConfig::default()
    })?;
    let settings = Settings {
        output_dir: cli.output.clone(),
        state_dir: cli.state_dir(),
        schedule,
    };
    info!(
        sources = registry.snapshot().len(),
        output = %settings.output_dir.display(),
        "rss2epub starting"
    );
    let monitor = Monitor::new(registry, settings, Box::new(fetcher), Converter::default());

    // First Ctrl-C lets the current source finish; a second one exits now.
    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));

    let totals = monitor.run(cancel.clone()).await?;
    if cancel.is_cancelled() {
        info!(cycles = totals.cycles, "shut down gracefully");
    }
    Ok(())
}

async fn watch_signals(cancel: CancellationToken) {
    if second_stop(tokio::signal::ctrl_c, cancel).await {
        warn!("second stop signal, exiting without waiting");
        std::process::exit(130);
    }
}

/// Cancel on the first signal; true once a second one arrives.
async fn second_stop<F, Fut>(mut signal: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if signal().await.is_err() {
        return false;
    }
    info!("stop signal received, finishing current source");
    cancel.cancel();

    signal().await.is_ok()
}
