//! Common test utilities and harness for harvest integration tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tce_core::config::HarvestConfig;
use tce_core::{CandidateTable, Error, Result, Sector, SectorSet, TicId};
use tce_mast::fits::build_header;
use tce_mast::{CacheLayout, DataProduct, LightCurveArchive, Observation};
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;

/// In-memory archive with scripted failures.
#[derive(Default)]
pub struct MockArchive {
    targets: HashMap<TicId, Vec<Sector>>,
    hanging: HashSet<TicId>,
    transient_failures: AtomicUsize,
    permanent_failure: bool,
    corrupt_downloads: bool,
    header_tic_override: Option<u64>,
    streaming: Option<(usize, Duration)>,
    searches: AtomicUsize,
    fetches: AtomicUsize,
    searched: Mutex<Vec<TicId>>,
    hang_entered: Arc<Notify>,
}

impl MockArchive {
    /// Creates an archive with no data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds SPOC light curves for a target.
    pub fn with_target(mut self, tic: u64, sectors: &[u16]) -> Self {
        let sectors = sectors.iter().map(|s| Sector::new(*s).unwrap()).collect();
        self.targets.insert(TicId::new(tic), sectors);
        self
    }

    /// Searches for this target never complete.
    pub fn hanging(mut self, tic: u64) -> Self {
        self.hanging.insert(TicId::new(tic));
        self
    }

    /// The first `n` searches fail with a network error.
    pub fn failing_transiently(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Every search fails with HTTP 400.
    pub fn failing_permanently(mut self) -> Self {
        self.permanent_failure = true;
        self
    }

    /// Downloads return an HTML error page instead of FITS.
    pub fn corrupt_downloads(mut self) -> Self {
        self.corrupt_downloads = true;
        self
    }

    /// Downloaded headers claim this TIC instead of the requested one.
    pub fn with_header_tic(mut self, tic: u64) -> Self {
        self.header_tic_override = Some(tic);
        self
    }

    /// Downloads are written in `chunks` pieces with `delay` after each,
    /// the way a slow HTTP body arrives.
    pub fn streaming(mut self, chunks: usize, delay: Duration) -> Self {
        self.streaming = Some((chunks.max(1), delay));
        self
    }

    /// Number of `search` calls so far.
    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// Number of `fetch` calls so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Targets searched, in call order.
    pub fn searched(&self) -> Vec<TicId> {
        self.searched.lock().unwrap().clone()
    }

    /// Signalled when a hanging search starts.
    pub fn hang_entered(&self) -> Arc<Notify> {
        Arc::clone(&self.hang_entered)
    }
}

/// Observation name for a target and sector.
pub fn obs_id(tic: TicId, sector: Sector) -> String {
    format!("tess-s{:04}-{:016}-0120-s", sector.get(), tic.get())
}

#[async_trait]
impl LightCurveArchive for MockArchive {
    async fn search(&self, tic: TicId, sectors: &SectorSet) -> Result<Vec<Observation>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.searched.lock().unwrap().push(tic);

        if self.permanent_failure {
            return Err(Error::archive(400, "Bad Request"));
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::network("connection reset by peer"));
        }
        if self.hanging.contains(&tic) {
            self.hang_entered.notify_one();
            std::future::pending::<()>().await;
        }

        Ok(self
            .targets
            .get(&tic)
            .map(|available| {
                available
                    .iter()
                    .filter(|s| sectors.contains(**s))
                    .map(|&sector| Observation {
                        obsid: format!("{}{:04}", tic.get(), sector.get()),
                        obs_id: obs_id(tic, sector),
                        tic,
                        sector,
                        author: "SPOC".to_string(),
                        exptime: Some(120.0),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn products(&self, observation: &Observation) -> Result<Vec<DataProduct>> {
        let product = |suffix: &str| DataProduct {
            obs_id: observation.obs_id.clone(),
            filename: format!("{}_{suffix}.fits", observation.obs_id),
            data_uri: format!("mast:TESS/product/{}_{suffix}.fits", observation.obs_id),
            subgroup: suffix.to_ascii_uppercase(),
            size: None,
        };
        Ok(vec![product("tp"), product("lc"), product("dvt")])
    }

    async fn fetch(&self, product: &DataProduct, dest: &Path) -> Result<u64> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let body = if self.corrupt_downloads {
            b"<html><body>Service Unavailable</body></html>".to_vec()
        } else {
            // obs_id encodes sector and TIC: tess-sSSSS-TTTTTTTTTTTTTTTT-0120-s
            let parts: Vec<&str> = product.obs_id.split('-').collect();
            let sector = parts[1].trim_start_matches('s').trim_start_matches('0');
            let tic = match self.header_tic_override {
                Some(tic) => tic.to_string(),
                None => parts[2].trim_start_matches('0').to_string(),
            };
            build_header(&[("TICID", tic.as_str()), ("SECTOR", sector)])
        };

        tokio::fs::create_dir_all(dest.parent().unwrap()).await?;
        match self.streaming {
            Some((chunks, delay)) => {
                let mut file = tokio::fs::File::create(dest).await?;
                for chunk in body.chunks(body.len().div_ceil(chunks)) {
                    file.write_all(chunk).await?;
                    file.flush().await?;
                    tokio::time::sleep(delay).await;
                }
            }
            None => tokio::fs::write(dest, &body).await?,
        }
        Ok(body.len() as u64)
    }
}

/// Test harness for integration tests.
///
/// Owns a temporary directory holding the cache and database, and a
/// configuration pointing at it with zero-delay retries.
pub struct TestHarness {
    /// Temporary working directory
    pub dir: tempfile::TempDir,
    /// Configuration rooted in `dir`
    pub config: HarvestConfig,
}

impl TestHarness {
    /// Creates a harness with default settings.
    pub fn new() -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = HarvestConfig::default();
        config.cache.dir = dir.path().join("TCEs_LCs");
        config.catalog.database = dir.path().join("tce_database.db");
        config.logging.file = None;
        config.retry.step_secs = 0;
        config.harvest.workers = 4;
        Self { dir, config }
    }

    /// Cache root.
    pub fn cache_dir(&self) -> PathBuf {
        self.config.cache.dir.clone()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Catalogue with a `period` feature column.
pub fn candidate_table(rows: &[(&str, &str)]) -> CandidateTable {
    let headers = vec![
        "tic_id".to_string(),
        "Sectors".to_string(),
        "period".to_string(),
    ];
    let rows = rows
        .iter()
        .enumerate()
        .map(|(i, (tic, sectors))| {
            vec![tic.to_string(), sectors.to_string(), format!("{}.5", i + 1)]
        })
        .collect();
    CandidateTable::from_parts("tces.csv", headers, rows)
}

/// Unfinished downloads left in `dir`.
pub fn partial_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|entry| entry.unwrap().path())
                .filter(|path| CacheLayout::is_partial(path))
                .collect()
        })
        .unwrap_or_default()
}

/// Task for a target and sector list.
pub fn task(tic: u64, sectors: &str) -> tce_core::HarvestTask {
    tce_core::HarvestTask::new(TicId::new(tic), SectorSet::parse(sectors).unwrap().unwrap())
}
