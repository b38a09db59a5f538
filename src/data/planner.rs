//! Expansion of a download configuration into individual queries

use std::fmt;

use serde::Serialize;

use super::{Dimension, DownloadConfig, Param};
use crate::cache::CacheKey;

/// One fully-resolved combination of parameter values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Query {
    pub model: Param,
    pub measure: Param,
    pub year: Param,
    pub age: Param,
    pub sex: Param,
}

impl Query {
    /// Returns the value of one dimension
    pub fn get(&self, dim: Dimension) -> &Param {
        match dim {
            Dimension::Model => &self.model,
            Dimension::Measure => &self.measure,
            Dimension::Year => &self.year,
            Dimension::Age => &self.age,
            Dimension::Sex => &self.sex,
        }
    }

    /// Display names in dimension order, as attached to output rows
    pub fn names(&self) -> Vec<&str> {
        Dimension::ALL
            .iter()
            .map(|&dim| self.get(dim).name.as_str())
            .collect()
    }

    /// Cache key of the dataset for this query
    ///
    /// Derived from the numeric IDs only, so two queries with the same values
    /// always share a cache entry.
    pub fn cache_key(&self) -> CacheKey {
        let params: Vec<(&str, String)> = Dimension::ALL
            .iter()
            .map(|&dim| (dim.as_str(), self.get(dim).id.to_string()))
            .collect();
        CacheKey::new("data", &params)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = Dimension::ALL
            .iter()
            .map(|&dim| format!("{}={:?}", dim, self.get(dim).name))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Expands a configuration into the cartesian product of its values
///
/// Dimensions are nested in declaration order (model outermost, sex
/// innermost) and values keep their configured order, so the planned
/// sequence is deterministic.
pub fn plan_queries(config: &DownloadConfig) -> Vec<Query> {
    let mut queries = Vec::with_capacity(config.combination_count());

    for model in &config.model {
        for measure in &config.measure {
            for year in &config.year {
                for age in &config.age {
                    for sex in &config.sex {
                        queries.push(Query {
                            model: model.clone(),
                            measure: measure.clone(),
                            year: year.clone(),
                            age: age.clone(),
                            sex: sex.clone(),
                        });
                    }
                }
            }
        }
    }

    queries
}
