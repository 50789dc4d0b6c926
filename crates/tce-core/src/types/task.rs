//! Harvest tasks and their outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::types::{Sector, SectorSet, TicId};

/// One unit of harvest work: a target and the sectors to search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestTask {
    /// Target to search for
    pub tic: TicId,

    /// Sectors the search is restricted to
    pub sectors: SectorSet,
}

impl HarvestTask {
    /// Creates a new task.
    pub fn new(tic: TicId, sectors: SectorSet) -> Self {
        Self { tic, sectors }
    }
}

impl fmt::Display for HarvestTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sector {}", self.tic, self.sectors)
    }
}

/// A light curve present in the local FITS cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightCurveRecord {
    /// Target the light curve belongs to
    pub tic: TicId,

    /// Sector the light curve covers
    pub sector: Sector,

    /// Location of the FITS file
    pub path: PathBuf,
}

/// Result of running a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The file was fetched from the archive.
    Downloaded(LightCurveRecord),

    /// The file was already in the cache.
    Cached(LightCurveRecord),

    /// The archive holds no light curve for the task.
    NoData,

    /// The task failed permanently or ran out of attempts.
    Failed {
        /// Last error message
        reason: String,
    },
}

impl TaskOutcome {
    /// The record to catalog, if the task produced a file.
    pub fn record(&self) -> Option<&LightCurveRecord> {
        match self {
            TaskOutcome::Downloaded(record) | TaskOutcome::Cached(record) => Some(record),
            TaskOutcome::NoData | TaskOutcome::Failed { .. } => None,
        }
    }

    /// Returns `true` if the task produced a file.
    pub fn is_success(&self) -> bool {
        self.record().is_some()
    }
}
