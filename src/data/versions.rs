//! Published dataset versions for a model
//!
//! Each model has a list of dataset versions. Some carry an explicit measure
//! ID, others leave it null but still serve data for any measure, so the
//! version chosen for a query prefers an exact measure match and falls back to
//! a measure-less version.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::FetchError;

/// One published dataset version of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Version ID; newer datasets have higher IDs
    pub version: u64,
    /// Measure the version was published for, if any
    pub measure: Option<u32>,
}

/// Envelope of the `/api/model/versions` response
#[derive(Debug, Deserialize)]
struct VersionsResponse {
    data: BTreeMap<String, ModelVersion>,
}

impl ModelVersion {
    /// Parses the raw `/api/model/versions` response body
    pub fn parse_list(text: &str) -> Result<Vec<ModelVersion>, FetchError> {
        let response: VersionsResponse = serde_json::from_str(text)
            .map_err(|e| FetchError::Parse(format!("invalid model versions document: {}", e)))?;
        Ok(response.data.into_values().collect())
    }
}

/// Picks the dataset version to download for a measure
///
/// Returns the highest version published for exactly this measure, or failing
/// that the highest version without a measure.
pub fn select_version(versions: &[ModelVersion], measure: u32) -> Option<u64> {
    let latest = |wanted: Option<u32>| {
        versions
            .iter()
            .filter(|v| v.measure == wanted)
            .map(|v| v.version)
            .max()
    };

    latest(Some(measure)).or_else(|| latest(None))
}
