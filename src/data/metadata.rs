//! Metadata describing the valid parameter values of the EPI service
//!
//! The service publishes every valid value for each dimension together with
//! a numeric ID. This module parses that document and answers name/ID lookups.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Dimension, FetchError, Param};

/// Valid values per dimension, mapping display name to numeric ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub model: BTreeMap<String, u32>,
    pub measure: BTreeMap<String, u32>,
    pub year: BTreeMap<String, u32>,
    pub age: BTreeMap<String, u32>,
    pub sex: BTreeMap<String, u32>,
}

/// Envelope of the `/api/metadata` response
#[derive(Debug, Deserialize)]
struct MetadataResponse {
    data: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Metadata {
    /// Returns the name/ID table for one dimension
    pub fn values(&self, dim: Dimension) -> &BTreeMap<String, u32> {
        match dim {
            Dimension::Model => &self.model,
            Dimension::Measure => &self.measure,
            Dimension::Year => &self.year,
            Dimension::Age => &self.age,
            Dimension::Sex => &self.sex,
        }
    }

    fn values_mut(&mut self, dim: Dimension) -> &mut BTreeMap<String, u32> {
        match dim {
            Dimension::Model => &mut self.model,
            Dimension::Measure => &mut self.measure,
            Dimension::Year => &mut self.year,
            Dimension::Age => &mut self.age,
            Dimension::Sex => &mut self.sex,
        }
    }

    /// Looks up a parameter value by its display name
    pub fn lookup(&self, dim: Dimension, name: &str) -> Option<Param> {
        self.values(dim)
            .get(name)
            .map(|&id| Param::new(name, id))
    }

    /// Returns every valid value of a dimension, in name order
    pub fn all_params(&self, dim: Dimension) -> Vec<Param> {
        self.values(dim)
            .iter()
            .map(|(name, &id)| Param::new(name.clone(), id))
            .collect()
    }

    /// Parses the raw `/api/metadata` response body
    ///
    /// Each dimension is an object of items, where every item carries a
    /// `name` and a `<dimension>_id` field. Names that are not JSON strings
    /// (years, for example) are converted to their textual form.
    pub fn from_response(text: &str) -> Result<Self, FetchError> {
        let response: MetadataResponse = serde_json::from_str(text)
            .map_err(|e| FetchError::Parse(format!("invalid metadata document: {}", e)))?;

        let mut metadata = Metadata::default();
        for dim in Dimension::ALL {
            let items = response
                .data
                .get(dim.as_str())
                .ok_or_else(|| FetchError::Parse(format!("metadata is missing '{}'", dim)))?;
            let id_field = format!("{}_id", dim);

            let table = metadata.values_mut(dim);
            for item in items.values() {
                let name = match item.get("name") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => {
                        return Err(FetchError::Parse(format!(
                            "metadata item for '{}' has no name",
                            dim
                        )))
                    }
                    Some(other) => other.to_string(),
                };
                let id = item
                    .get(&id_field)
                    .and_then(Value::as_u64)
                    .and_then(|id| u32::try_from(id).ok())
                    .ok_or_else(|| {
                        FetchError::Parse(format!("metadata item '{}' has no valid {}", name, id_field))
                    })?;
                table.insert(name, id);
            }
        }

        Ok(metadata)
    }
}
