//! The harvest run: a bounded pool of fetches feeding the catalog.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use futures::stream;
use indicatif::ProgressBar;
use tce_catalog::Catalog;
use tce_core::{CandidateTable, HarvestConfig, Result};
use tce_mast::LightCurveArchive;

use crate::fetch::LightCurveFetcher;
use crate::plan::HarvestPlan;
use crate::progress::{RunSummary, progress_bar};

/// Runs harvest plans.
#[derive(Clone)]
pub struct Harvester {
    fetcher: LightCurveFetcher,
    config: HarvestConfig,
    progress: Option<ProgressBar>,
}

impl std::fmt::Debug for Harvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harvester")
            .field("fetcher", &self.fetcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Harvester {
    /// Creates a harvester for an archive and configuration.
    pub fn new(archive: Arc<dyn LightCurveArchive>, config: HarvestConfig) -> Self {
        let fetcher = LightCurveFetcher::from_config(archive, &config);
        Self::with_fetcher(fetcher, config)
    }

    /// Creates a harvester around a prepared fetcher.
    pub fn with_fetcher(fetcher: LightCurveFetcher, config: HarvestConfig) -> Self {
        Self {
            fetcher,
            config,
            progress: None,
        }
    }

    /// Reports progress on `bar` instead of a bar created per run.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Fetcher used for each task.
    pub fn fetcher(&self) -> &LightCurveFetcher {
        &self.fetcher
    }

    /// Configuration of this harvester.
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Runs every task in `plan`.
    ///
    /// The catalogue's feature columns replace the `TOIs` table first.
    /// Successful outcomes are upserted into `LightCurves` as they arrive,
    /// committed in batches. When `shutdown` resolves, in-flight fetches
    /// are dropped, recorded rows are committed and the summary is marked
    /// interrupted. Finished tasks advance the progress bar, which is
    /// abandoned on interruption.
    ///
    /// # Errors
    ///
    /// Fails only on setup or catalog errors; per-task failures are
    /// counted in the summary.
    pub async fn run<F>(
        &self,
        table: &CandidateTable,
        plan: HarvestPlan,
        shutdown: F,
    ) -> Result<RunSummary>
    where
        F: Future,
    {
        let clock = Instant::now();
        let mut summary = RunSummary::new(plan.len(), chrono::Utc::now());
        let workers = self.config.harvest.workers.max(1);

        tracing::info!(
            tasks = plan.len(),
            workers,
            cache = %self.fetcher.cache().root().display(),
            database = %self.config.catalog.database.display(),
            "Starting harvest"
        );

        self.fetcher
            .cache()
            .ensure_root(self.config.cache.world_writable)
            .await?;

        let catalog = Catalog::open(&self.config.catalog.database).await?;
        let tois = catalog
            .replace_tois(table, &self.config.input.sectors_column)
            .await?;
        tracing::info!(rows = tois, "TOI table refreshed");

        let mut writer = catalog.writer(self.config.catalog.commit_every).await?;

        let progress = match &self.progress {
            Some(bar) => {
                bar.set_length(plan.len() as u64);
                bar.clone()
            }
            None => progress_bar(plan.len()),
        };

        let mut outcomes = stream::iter(plan.tasks())
            .map(|task| self.fetcher.fetch(task))
            .buffer_unordered(workers);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    progress.abandon_with_message("Interrupted");
                    tracing::warn!(
                        completed = summary.completed(),
                        planned = summary.planned,
                        "Process interrupted by user"
                    );
                    summary.interrupted = true;
                    break;
                }
                next = outcomes.next() => {
                    let Some(outcome) = next else { break };
                    if let Some(record) = outcome.record() {
                        writer.record(record).await?;
                    }
                    summary.tally(&outcome);
                    progress.inc(1);
                }
            }
        }

        if !summary.interrupted {
            progress.finish();
        }

        // Cancels whatever is still in flight
        drop(outcomes);

        summary.recorded = writer.finish().await?;
        catalog.close().await;
        summary.elapsed = clock.elapsed();

        tracing::info!(
            downloaded = summary.downloaded,
            cached = summary.cached,
            no_data = summary.no_data,
            failed = summary.failed,
            interrupted = summary.interrupted,
            "Processing completed. Total processed: {}",
            summary.recorded
        );

        Ok(summary)
    }
}
