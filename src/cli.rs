//! Command-line interface parsing for EPI downloader
//!
//! This module handles parsing of CLI arguments using clap. The tool runs in
//! one of two modes: `--dump-config` writes the reference files, while
//! `--config` together with `--output` runs a download.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use thiserror::Error;

use crate::data::retry::DEFAULT_MAX_RETRIES;
use crate::data::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::download::DEFAULT_CONCURRENCY;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// Neither mode was requested
    #[error("Either --dump-config or both --config and --output are required")]
    MissingMode,

    /// --dump-config was combined with download options
    #[error("--dump-config cannot be combined with other options")]
    ConflictingMode,

    /// Only one of --config and --output was given
    #[error("Both --config and --output options are required")]
    IncompleteDownload,
}

/// EPI downloader - bulk download datasets from the IHME EPI visualisation website
#[derive(Parser, Debug)]
#[command(name = "epi-downloader")]
#[command(about = "A tool to download datasets from IHME")]
#[command(version)]
#[command(group(ArgGroup::new("mode").required(true).args(["dump_config", "config"])))]
pub struct Cli {
    /// Dump metadata and example config files
    #[arg(long, conflicts_with_all = ["config", "output", "no_cache"])]
    pub dump_config: bool,

    /// Directory to write the dumped files to
    #[arg(long, value_name = "DIR", default_value = ".", requires = "dump_config")]
    pub dump_dir: PathBuf,

    /// Path to config file
    #[arg(short, long, value_name = "PATH", requires = "output")]
    pub config: Option<PathBuf>,

    /// Path to save CSV data to
    #[arg(short, long, value_name = "PATH", requires = "config")]
    pub output: Option<PathBuf>,

    /// Redownload data files even if they are in the cache.
    ///
    /// This is useful for checking whether new data has become available
    /// since the last search.
    #[arg(long)]
    pub no_cache: bool,

    /// Directory for cached responses (defaults to the user cache directory)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Base URL of the EPI website
    #[arg(long, value_name = "URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Retries for requests that fail with a network or server error
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Seconds before a request without a complete response is abandoned
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, value_parser = parse_timeout)]
    pub timeout: u64,

    /// Number of datasets downloaded at the same time
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CONCURRENCY, value_parser = parse_concurrency)]
    pub concurrency: usize,
}

fn parse_concurrency(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("concurrency must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_timeout(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("timeout must be at least 1 second".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// The action requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Write metadata.json and example_config.json into a directory
    DumpConfig { dir: PathBuf },
    /// Download the datasets selected by a config file into one CSV
    Download { config: PathBuf, output: PathBuf },
}

impl Mode {
    /// Determines the mode from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(Mode)` for a consistent set of options
    /// * `Err(CliError)` if the options do not describe exactly one mode
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.dump_config {
            if cli.config.is_some() || cli.output.is_some() || cli.no_cache {
                return Err(CliError::ConflictingMode);
            }
            return Ok(Mode::DumpConfig {
                dir: cli.dump_dir.clone(),
            });
        }

        match (&cli.config, &cli.output) {
            (Some(config), Some(output)) => Ok(Mode::Download {
                config: config.clone(),
                output: output.clone(),
            }),
            (None, None) => Err(CliError::MissingMode),
            _ => Err(CliError::IncompleteDownload),
        }
    }
}
