//! The two things the tool does: dump reference files and run a download

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::combine::{combine, write_csv};
use crate::data::{config::example_config, plan_queries, DownloadConfig, EpiSource, Query};
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::fs_util::write_atomic;

/// File name of the dumped metadata
pub const METADATA_FILE: &str = "metadata.json";

/// File name of the dumped example configuration
pub const EXAMPLE_CONFIG_FILE: &str = "example_config.json";

/// What a completed download produced
#[derive(Debug, Clone)]
pub struct DownloadSummary {
    /// Number of queries planned from the configuration
    pub planned: usize,
    /// Number of queries that contributed rows
    pub succeeded: usize,
    /// Rows written to the output file
    pub rows: usize,
    /// Queries that failed, in planned order
    pub failed: Vec<Query>,
}

impl DownloadSummary {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Writes the metadata and an example configuration into `dir`
///
/// Returns the paths of the written files.
pub async fn dump_config<S: EpiSource>(downloader: &Downloader<S>, dir: &Path) -> Result<Vec<PathBuf>> {
    let metadata = downloader.load_metadata().await.map_err(Error::Metadata)?;

    fs::create_dir_all(dir).map_err(|e| Error::Dump {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let metadata_path = dir.join(METADATA_FILE);
    write_json(&metadata_path, &metadata)?;

    let example_path = dir.join(EXAMPLE_CONFIG_FILE);
    write_json(&example_path, &example_config())?;

    Ok(vec![metadata_path, example_path])
}

fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    info!("Saving {}", path.display());
    let dump_error = |message: String| Error::Dump {
        path: path.display().to_string(),
        message,
    };

    let json = serde_json::to_string_pretty(data).map_err(|e| dump_error(e.to_string()))?;
    write_atomic(path, json.as_bytes()).map_err(|e| dump_error(e.to_string()))
}

/// Downloads every query planned from the configuration and writes one CSV
///
/// The configuration is validated before any dataset is requested. Queries
/// that fail are logged and left out; if none succeed, no output is written
/// and `Error::NoData` is returned.
pub async fn run_download<S: EpiSource>(
    downloader: &Downloader<S>,
    config_path: &Path,
    output_path: &Path,
) -> Result<DownloadSummary> {
    let metadata = downloader.load_metadata().await.map_err(Error::Metadata)?;
    let config = DownloadConfig::load(config_path, &metadata)?;
    let queries = plan_queries(&config);

    let report = downloader.download(&queries).await;

    if report.fragments.is_empty() {
        return Err(Error::NoData {
            failed: report.failures.len(),
        });
    }

    let table = combine(&report.fragments);
    write_csv(&table, output_path)?;

    let summary = DownloadSummary {
        planned: report.planned(),
        succeeded: report.fragments.len(),
        rows: table.row_count(),
        failed: report.failures.into_iter().map(|(query, _)| query).collect(),
    };

    if summary.is_partial() {
        warn!(
            "Failed to download data for {}/{} parameter sets. The parameter sets were:",
            summary.failed.len(),
            summary.planned
        );
        for query in &summary.failed {
            warn!(" - {}", query);
        }
    }
    info!(
        "Downloaded {} rows from {}/{} parameter sets",
        summary.rows, summary.succeeded, summary.planned
    );

    Ok(summary)
}
