//! Loading and validation of download configuration files
//!
//! A configuration file is a JSON object whose keys are dimension names and
//! whose values are arrays of display names, e.g.
//!
//! ```json
//! {"model": ["Diabetes mellitus"], "measure": ["Prevalence"], "year": ["2015", "2019"]}
//! ```
//!
//! Values are checked against the service metadata and resolved to their
//! numeric IDs. A dimension left out of the file selects every valid value.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::{Dimension, Metadata, Param};

/// Errors that can occur when loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a JSON object of string arrays
    #[error("Failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),

    /// Keys that are not dimension names
    #[error("Unknown parameters in config: {}. Valid parameters: model, measure, year, age, sex", .0.join(", "))]
    UnknownParameters(Vec<String>),

    /// Values absent from the metadata, grouped by dimension
    #[error("The following values in the config file are invalid: {}", describe_invalid(.0))]
    InvalidValues(BTreeMap<Dimension, Vec<String>>),

    /// A dimension was given an empty list
    #[error("No values selected for parameter '{0}'")]
    EmptySelection(Dimension),
}

fn describe_invalid(invalid: &BTreeMap<Dimension, Vec<String>>) -> String {
    invalid
        .iter()
        .map(|(dim, values)| format!("{}: {:?}", dim, values))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single configured value; years are commonly written as numbers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Number(serde_json::Number),
}

impl RawValue {
    fn into_name(self) -> String {
        match self {
            RawValue::Text(s) => s,
            RawValue::Number(n) => n.to_string(),
        }
    }
}

/// Values configured for one dimension; a bare value is a one-element list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawSelection {
    Many(Vec<RawValue>),
    One(RawValue),
}

impl RawSelection {
    fn into_names(self) -> Vec<String> {
        match self {
            RawSelection::Many(values) => values.into_iter().map(RawValue::into_name).collect(),
            RawSelection::One(value) => vec![value.into_name()],
        }
    }
}

/// A validated selection of parameter values, one list per dimension
///
/// Only constructed through validation, so every value is known to exist in
/// the metadata it was checked against. Lists keep the order of the file and
/// contain no duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadConfig {
    pub model: Vec<Param>,
    pub measure: Vec<Param>,
    pub year: Vec<Param>,
    pub age: Vec<Param>,
    pub sex: Vec<Param>,
}

impl DownloadConfig {
    /// Reads and validates a configuration file
    pub fn load(path: &Path, metadata: &Metadata) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, metadata)
    }

    /// Parses and validates configuration JSON
    pub fn from_json(text: &str, metadata: &Metadata) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, RawSelection> = serde_json::from_str(text)?;
        Self::validate(raw, metadata)
    }

    fn validate(
        raw: BTreeMap<String, RawSelection>,
        metadata: &Metadata,
    ) -> Result<Self, ConfigError> {
        let mut selected: BTreeMap<Dimension, Vec<String>> = BTreeMap::new();
        let mut unknown = Vec::new();

        for (key, selection) in raw {
            match key.parse::<Dimension>() {
                Ok(dim) => {
                    selected.insert(dim, selection.into_names());
                }
                Err(key) => unknown.push(key),
            }
        }

        if !unknown.is_empty() {
            return Err(ConfigError::UnknownParameters(unknown));
        }

        let mut resolved: BTreeMap<Dimension, Vec<Param>> = BTreeMap::new();
        let mut invalid: BTreeMap<Dimension, Vec<String>> = BTreeMap::new();

        for dim in Dimension::ALL {
            let Some(names) = selected.remove(&dim) else {
                let all = metadata.all_params(dim);
                warn!(
                    "Parameter '{}' not set in config; selecting all {} valid values",
                    dim,
                    all.len()
                );
                resolved.insert(dim, all);
                continue;
            };

            if names.is_empty() {
                return Err(ConfigError::EmptySelection(dim));
            }

            let mut params: Vec<Param> = Vec::with_capacity(names.len());
            for name in names {
                let name = name.trim();
                match metadata.lookup(dim, name) {
                    Some(param) => {
                        if !params.contains(&param) {
                            params.push(param);
                        }
                    }
                    None => invalid.entry(dim).or_default().push(name.to_string()),
                }
            }
            resolved.insert(dim, params);
        }

        if !invalid.is_empty() {
            return Err(ConfigError::InvalidValues(invalid));
        }

        let mut take = |dim: Dimension| resolved.remove(&dim).unwrap_or_default();
        let config = DownloadConfig {
            model: take(Dimension::Model),
            measure: take(Dimension::Measure),
            year: take(Dimension::Year),
            age: take(Dimension::Age),
            sex: take(Dimension::Sex),
        };

        for dim in Dimension::ALL {
            if config.get(dim).is_empty() {
                return Err(ConfigError::EmptySelection(dim));
            }
        }

        Ok(config)
    }

    /// Returns the values selected for one dimension
    pub fn get(&self, dim: Dimension) -> &[Param] {
        match dim {
            Dimension::Model => &self.model,
            Dimension::Measure => &self.measure,
            Dimension::Year => &self.year,
            Dimension::Age => &self.age,
            Dimension::Sex => &self.sex,
        }
    }

    /// Number of queries the selection expands to
    pub fn combination_count(&self) -> usize {
        Dimension::ALL.iter().map(|&dim| self.get(dim).len()).product()
    }
}

/// The skeleton written next to the metadata in dump mode
pub fn example_config() -> BTreeMap<&'static str, Vec<&'static str>> {
    BTreeMap::from([
        ("model", vec!["Diabetes Mellitus - Total"]),
        ("measure", vec!["Prevalence"]),
        ("year", vec!["2015"]),
        ("age", vec!["20-24 years"]),
        ("sex", vec!["Male"]),
    ])
}
