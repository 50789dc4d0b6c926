//! Fetching one task's light curve into the cache.

use std::path::Path;
use std::sync::Arc;

use backon::Retryable;
use tce_core::{
    Error, HarvestConfig, HarvestTask, LightCurveRecord, Result, TaskOutcome,
};
use tce_mast::{
    CacheLayout, DataProduct, FitsHeader, LightCurveArchive, Observation, ProductFilter,
    rank_observations,
};

use crate::retry::LinearBackoff;

/// Resolves tasks to cached light-curve files.
#[derive(Clone)]
pub struct LightCurveFetcher {
    archive: Arc<dyn LightCurveArchive>,
    cache: CacheLayout,
    filter: ProductFilter,
    backoff: LinearBackoff,
}

impl std::fmt::Debug for LightCurveFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightCurveFetcher")
            .field("cache", &self.cache)
            .field("filter", &self.filter)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl LightCurveFetcher {
    /// Creates a fetcher.
    pub fn new(
        archive: Arc<dyn LightCurveArchive>,
        cache: CacheLayout,
        filter: ProductFilter,
        backoff: LinearBackoff,
    ) -> Self {
        Self {
            archive,
            cache,
            filter,
            backoff,
        }
    }

    /// Creates a fetcher from the harvest configuration.
    pub fn from_config(archive: Arc<dyn LightCurveArchive>, config: &HarvestConfig) -> Self {
        Self::new(
            archive,
            CacheLayout::new(&config.cache.dir),
            ProductFilter {
                include_fast: config.mast.include_fast,
                authors: config.mast.authors.clone(),
            },
            LinearBackoff::from_config(&config.retry),
        )
    }

    /// Cache the fetcher writes into.
    pub fn cache(&self) -> &CacheLayout {
        &self.cache
    }

    /// Resolves a task, retrying transient failures.
    ///
    /// Never fails: errors are logged and reported as
    /// [`TaskOutcome::Failed`].
    pub async fn fetch(&self, task: &HarvestTask) -> TaskOutcome {
        let max_attempts = self.backoff.max_attempts();
        let mut failures = 0usize;

        let result = (|| self.attempt(task))
            .retry(self.backoff)
            .sleep(tokio::time::sleep)
            .when(Error::is_retryable)
            .notify(|err: &Error, delay| {
                failures += 1;
                tracing::warn!(
                    %task,
                    attempt = failures,
                    max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    "Attempt {failures}/{max_attempts} failed for {task}: {err}"
                );
            })
            .await;

        match result {
            Ok(outcome) => outcome,
            Err(err) if err.is_retryable() => {
                tracing::error!(%task, "All download attempts failed for {task}: {err}");
                TaskOutcome::Failed {
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                tracing::error!(%task, "Permanent error for {task}: {err}");
                TaskOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn attempt(&self, task: &HarvestTask) -> Result<TaskOutcome> {
        let mut observations = self.archive.search(task.tic, &task.sectors).await?;
        observations.retain(|o| self.filter.accepts_observation(o));

        if observations.is_empty() {
            tracing::info!(%task, "No data found for {task}");
            return Ok(TaskOutcome::NoData);
        }

        rank_observations(&mut observations);

        for observation in &observations {
            let products = self.archive.products(observation).await?;
            if let Some(product) = self.filter.select(&products) {
                return self.materialize(observation, product).await;
            }
            tracing::debug!(obs_id = %observation.obs_id, "Observation has no light-curve file");
        }

        tracing::info!(%task, "No data found for {task}");
        Ok(TaskOutcome::NoData)
    }

    async fn materialize(
        &self,
        observation: &Observation,
        product: &DataProduct,
    ) -> Result<TaskOutcome> {
        let path = self.cache.product_path(product);
        let record = LightCurveRecord {
            tic: observation.tic,
            sector: observation.sector,
            path: path.clone(),
        };

        if CacheLayout::is_cached(&path).await {
            match verify(&path, observation).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Cache hit");
                    return Ok(TaskOutcome::Cached(record));
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "Discarding cached file: {err}");
                }
            }
        }

        let partial = CacheLayout::partial_file(&path);
        let bytes = self.archive.fetch(product, partial.path()).await?;
        verify(partial.path(), observation).await?;

        // Another task may have resolved to the same product meanwhile
        if CacheLayout::is_cached(&path).await && verify(&path, observation).await.is_ok() {
            tracing::debug!(path = %path.display(), "Cache filled by a concurrent download");
            return Ok(TaskOutcome::Cached(record));
        }

        partial.persist(&path).await?;

        tracing::info!(
            tic = %observation.tic,
            sector = %observation.sector,
            bytes,
            path = %path.display(),
            "Downloaded light curve"
        );
        Ok(TaskOutcome::Downloaded(record))
    }
}

async fn verify(path: &Path, observation: &Observation) -> Result<()> {
    FitsHeader::read(path)
        .await?
        .verify_light_curve(path, observation.tic, observation.sector)
}
