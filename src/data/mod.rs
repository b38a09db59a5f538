//! Core data models for EPI downloader
//!
//! This module contains the types used throughout the application for
//! describing parameter dimensions, the service's metadata, validated download
//! configurations and the queries planned from them.

pub mod client;
pub mod config;
pub mod metadata;
pub mod planner;
pub mod retry;
pub mod table;
pub mod versions;

pub use client::{EpiClient, EpiSource, FetchError, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use config::{ConfigError, DownloadConfig};
pub use metadata::Metadata;
pub use planner::{plan_queries, Query};
pub use retry::RetryPolicy;
pub use table::Table;
pub use versions::{select_version, ModelVersion};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One axis of dataset selection
///
/// The declaration order of the variants is the order used for planning
/// queries and for the leading columns of the combined output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Model,
    Measure,
    Year,
    Age,
    Sex,
}

impl Dimension {
    /// All dimensions in declaration order
    pub const ALL: [Dimension; 5] = [
        Dimension::Model,
        Dimension::Measure,
        Dimension::Year,
        Dimension::Age,
        Dimension::Sex,
    ];

    /// Name of the dimension as used in config files and API parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Model => "model",
            Dimension::Measure => "measure",
            Dimension::Year => "year",
            Dimension::Age => "age",
            Dimension::Sex => "sex",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|dim| dim.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A single parameter value: its display name and the numeric ID the API uses
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    /// Human-readable name, e.g. "Prevalence"
    pub name: String,
    /// Numeric ID sent to the API
    pub id: u32,
}

impl Param {
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}
