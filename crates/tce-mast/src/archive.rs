//! The archive seam: search, list products, fetch.

use std::cmp::Ordering;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tce_core::{Result, Sector, SectorSet, TicId};

/// Exposure time (seconds) below which an observation is "fast" cadence.
const FAST_CADENCE_MAX_SECS: f64 = 60.0;

/// A TESS time-series observation of one target in one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Archive-internal observation key (used to list products)
    pub obsid: String,
    /// Observation name, also the cache directory name
    pub obs_id: String,
    /// Target observed
    pub tic: TicId,
    /// Sector observed
    pub sector: Sector,
    /// Producing pipeline (`SPOC`, `TESS-SPOC`, `QLP`, ...)
    pub author: String,
    /// Exposure time in seconds, if reported
    pub exptime: Option<f64>,
}

impl Observation {
    /// Returns `true` for 20-second cadence observations.
    pub fn is_fast(&self) -> bool {
        self.exptime.is_some_and(|t| t < FAST_CADENCE_MAX_SECS)
    }
}

/// A downloadable file belonging to an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProduct {
    /// Observation name the product belongs to
    pub obs_id: String,
    /// File name
    pub filename: String,
    /// Archive URI used for download
    pub data_uri: String,
    /// Product sub-group (`LC`, `FAST-LC`, `TP`, `DVT`, ...)
    pub subgroup: String,
    /// Size in bytes, if reported
    pub size: Option<u64>,
}

impl DataProduct {
    /// Returns `true` for light-curve files.
    pub fn is_light_curve(&self) -> bool {
        self.filename.to_ascii_lowercase().ends_with("lc.fits")
    }

    /// Returns `true` for 20-second cadence light-curve files.
    pub fn is_fast(&self) -> bool {
        self.filename.to_ascii_lowercase().ends_with("fast-lc.fits")
    }
}

/// Which observations and files a harvest accepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    /// Accept 20-second cadence data
    pub include_fast: bool,
    /// Accepted pipeline authors, case-insensitive (empty = any)
    pub authors: Vec<String>,
}

impl ProductFilter {
    /// Returns `true` if the observation should be considered.
    pub fn accepts_observation(&self, observation: &Observation) -> bool {
        let author_ok = self.authors.is_empty()
            || self
                .authors
                .iter()
                .any(|a| a.eq_ignore_ascii_case(&observation.author));
        author_ok && (self.include_fast || !observation.is_fast())
    }

    /// Picks the light-curve file from an observation's products.
    ///
    /// Standard cadence files win over fast cadence ones.
    pub fn select<'a>(&self, products: &'a [DataProduct]) -> Option<&'a DataProduct> {
        products
            .iter()
            .filter(|p| p.is_light_curve())
            .filter(|p| self.include_fast || !p.is_fast())
            .min_by_key(|p| p.is_fast())
    }
}

/// Orders observations best-first: author priority, then shortest
/// exposure, then sector.
pub fn rank_observations(observations: &mut [Observation]) {
    observations.sort_by(|a, b| {
        author_rank(&a.author)
            .cmp(&author_rank(&b.author))
            .then_with(|| compare_exptime(a.exptime, b.exptime))
            .then_with(|| a.sector.cmp(&b.sector))
            .then_with(|| a.obs_id.cmp(&b.obs_id))
    });
}

fn author_rank(author: &str) -> u8 {
    match author.to_ascii_uppercase().as_str() {
        "SPOC" => 0,
        "TESS-SPOC" => 1,
        "QLP" => 2,
        _ => 3,
    }
}

fn compare_exptime(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Source of TESS light curves.
#[async_trait]
pub trait LightCurveArchive: Send + Sync {
    /// Time-series observations of `tic` in any of `sectors`.
    async fn search(&self, tic: TicId, sectors: &SectorSet) -> Result<Vec<Observation>>;

    /// Files belonging to an observation.
    async fn products(&self, observation: &Observation) -> Result<Vec<DataProduct>>;

    /// Downloads a product to `dest`, returning the bytes written.
    async fn fetch(&self, product: &DataProduct, dest: &Path) -> Result<u64>;
}
