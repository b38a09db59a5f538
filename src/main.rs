//! EPI downloader - bulk download datasets from the IHME EPI website
//!
//! Dumps the service metadata with an example configuration, or downloads
//! every dataset selected by a configuration file into a single CSV.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use epi_downloader::app::{dump_config, run_download};
use epi_downloader::cache::CacheStore;
use epi_downloader::cli::{Cli, Mode};
use epi_downloader::data::{EpiClient, RetryPolicy};
use epi_downloader::download::Downloader;

/// Exit status after Ctrl+C
const INTERRUPTED: u8 = 130;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("epi_downloader=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Builds the downloader described by the CLI options
fn build_downloader(cli: &Cli) -> Downloader<EpiClient> {
    let retry = RetryPolicy::default().with_max_retries(cli.max_retries);
    let client = EpiClient::with_base_url(cli.base_url.clone())
        .with_retry_policy(retry)
        .with_timeout(Duration::from_secs(cli.timeout));

    let cache = match &cli.cache_dir {
        Some(dir) => Some(CacheStore::with_dir(dir.clone())),
        None => CacheStore::new(),
    };
    match &cache {
        Some(cache) => info!("Using cache directory {}", cache.dir().display()),
        None => warn!("No cache directory available; every request will hit the network"),
    }

    Downloader::new(client, cache)
        .bypass_cache(cli.no_cache)
        .with_concurrency(cli.concurrency)
}

async fn execute(cli: &Cli, mode: Mode) -> ExitCode {
    let downloader = build_downloader(cli);

    let result = match mode {
        Mode::DumpConfig { dir } => dump_config(&downloader, &dir).await.map(|_| ()),
        Mode::Download { config, output } => {
            run_download(&downloader, &config, &output).await.map(|summary| {
                if summary.is_partial() {
                    warn!(
                        "Output is incomplete: {} of {} parameter sets failed",
                        summary.failed.len(),
                        summary.planned
                    );
                }
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let mode = match Mode::from_cli(&cli) {
        Ok(mode) => mode,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    // Output is only written once every query has resolved, so stopping here
    // leaves no partial output file behind.
    tokio::select! {
        code = execute(&cli, mode) => code,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; no output was written");
            ExitCode::from(INTERRUPTED)
        }
    }
}
