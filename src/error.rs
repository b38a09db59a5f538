//! Top-level error type for a downloader run

use thiserror::Error;

use crate::combine::OutputError;
use crate::data::{ConfigError, FetchError};

/// Errors that end a run with a non-zero exit status
///
/// Failures of individual queries are not errors at this level; they are
/// collected in the download report and only become `NoData` when nothing
/// succeeded.
#[derive(Debug, Error)]
pub enum Error {
    /// The parameter metadata could not be loaded
    #[error("Could not load metadata: {0}")]
    Metadata(#[source] FetchError),

    /// The configuration file is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The combined output could not be written
    #[error(transparent)]
    Output(#[from] OutputError),

    /// Writing one of the dumped reference files failed
    #[error("Failed to write {path}: {message}")]
    Dump { path: String, message: String },

    /// Every planned query failed
    #[error("No data could be downloaded: all {failed} parameter sets failed")]
    NoData { failed: usize },
}

/// Result type for downloader runs
pub type Result<T> = std::result::Result<T, Error>;
