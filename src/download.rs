//! Cache-aware download pipeline
//!
//! The `Downloader` resolves metadata, model versions and datasets through the
//! cache store, falling back to the remote source on a miss. Queries run on a
//! bounded pool and results come back in planned order.

use std::collections::HashMap;
use std::future::Future;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStore};
use crate::data::{select_version, EpiSource, FetchError, Metadata, ModelVersion, Query, Table};

/// Default number of datasets fetched at the same time
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Outcome of downloading every planned query
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Successfully loaded tables, in planned order
    pub fragments: Vec<(Query, Table)>,
    /// Queries that could not be loaded, in planned order
    pub failures: Vec<(Query, FetchError)>,
}

impl DownloadReport {
    pub fn planned(&self) -> usize {
        self.fragments.len() + self.failures.len()
    }

    pub fn row_count(&self) -> usize {
        self.fragments.iter().map(|(_, table)| table.row_count()).sum()
    }
}

/// Fetches data from an `EpiSource`, consulting the cache first
pub struct Downloader<S> {
    source: S,
    cache: Option<CacheStore>,
    bypass_cache: bool,
    concurrency: usize,
}

impl<S: EpiSource> Downloader<S> {
    /// Creates a downloader; without a cache store every request hits the source
    pub fn new(source: S, cache: Option<CacheStore>) -> Self {
        Self {
            source,
            cache,
            bypass_cache: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Skip cache lookups; fresh responses are still written to the cache
    pub fn bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }

    /// Limit the number of datasets fetched at the same time
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    /// Loads a value through the cache
    ///
    /// A cached payload is used unless the cache is bypassed or the payload
    /// no longer parses. Otherwise `fetch` is called, and a response that
    /// parses is stored before being returned. Failing to store is logged
    /// and otherwise ignored.
    async fn load_cached<T, P, F, Fut>(&self, key: &CacheKey, parse: P, fetch: F) -> Result<T, FetchError>
    where
        P: Fn(&str) -> Result<T, FetchError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, FetchError>>,
    {
        if !self.bypass_cache {
            if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.lookup(key)) {
                match parse(&cached.payload) {
                    Ok(value) => {
                        debug!("Using response for {} cached at {}", key, cached.cached_at);
                        return Ok(value);
                    }
                    Err(e) => warn!("Cached response for {} is unusable ({}); refetching", key, e),
                }
            }
        }

        let text = fetch().await?;
        let value = parse(&text)?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(key, &text) {
                warn!("Failed to cache response for {}: {}", key, e);
            }
        }

        Ok(value)
    }

    /// Loads the parameter metadata
    pub async fn load_metadata(&self) -> Result<Metadata, FetchError> {
        let key = CacheKey::new("metadata", &[]);
        self.load_cached(&key, Metadata::from_response, || self.source.fetch_metadata())
            .await
    }

    /// Loads the published dataset versions of one model
    pub async fn load_model_versions(&self, model: u32) -> Result<Vec<ModelVersion>, FetchError> {
        let key = CacheKey::new("versions", &[("model", model.to_string())]);
        self.load_cached(&key, ModelVersion::parse_list, || {
            self.source.fetch_model_versions(model)
        })
        .await
    }

    /// Loads the dataset for one query
    ///
    /// The dataset version is only resolved on a cache miss, so cached
    /// datasets load even when the version list is unavailable.
    pub async fn load_dataset(
        &self,
        query: &Query,
        versions: &HashMap<u32, Result<Vec<ModelVersion>, FetchError>>,
    ) -> Result<Table, FetchError> {
        let key = query.cache_key();
        self.load_cached(&key, Table::from_csv, move || async move {
            let available: &[ModelVersion] = match versions.get(&query.model.id) {
                Some(Ok(available)) => available.as_slice(),
                Some(Err(e)) => return Err(e.clone()),
                None => &[],
            };
            let version = select_version(available, query.measure.id).ok_or(FetchError::NoVersion {
                model: query.model.id,
                measure: query.measure.id,
            })?;
            debug!("Downloading {} at version {}", query, version);
            self.source.fetch_dataset(query, version).await
        })
        .await
    }

    /// Downloads every query, collecting successes and failures
    ///
    /// A failing query never stops the others. The report lists results in
    /// the order the queries were given, whatever order the responses
    /// arrived in.
    pub async fn download(&self, queries: &[Query]) -> DownloadReport {
        let mut models: Vec<u32> = Vec::new();
        for query in queries {
            if !models.contains(&query.model.id) {
                models.push(query.model.id);
            }
        }

        let version_results: Vec<Result<Vec<ModelVersion>, FetchError>> =
            stream::iter(models.iter().copied())
                .map(|model| self.load_model_versions(model))
                .buffered(self.concurrency)
                .collect()
                .await;
        let versions: HashMap<u32, Result<Vec<ModelVersion>, FetchError>> =
            models.into_iter().zip(version_results).collect();
        for (model, result) in &versions {
            if let Err(e) = result {
                warn!("Could not load dataset versions for model {}: {}", model, e);
            }
        }

        info!("{} data files to download", queries.len());

        let versions = &versions;
        let results: Vec<(Query, Result<Table, FetchError>)> = stream::iter(queries)
            .map(|query| async move { (query.clone(), self.load_dataset(query, versions).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = DownloadReport::default();
        for (query, result) in results {
            match result {
                Ok(table) => report.fragments.push((query, table)),
                Err(e) => {
                    warn!("Failed to download {}: {}", query, e);
                    report.failures.push((query, e));
                }
            }
        }
        info!(
            "Loaded {} of {} data files ({} rows)",
            report.fragments.len(),
            report.planned(),
            report.row_count()
        );
        report
    }
}
