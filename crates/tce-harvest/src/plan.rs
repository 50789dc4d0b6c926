//! Turning the candidate catalogue into download tasks.

use std::collections::HashSet;

use tce_core::config::SectorMode;
use tce_core::{CandidateTable, HarvestConfig, HarvestTask, Result, SectorSet};

/// Options controlling how a plan is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    /// Column holding the TIC identifier
    pub tic_column: String,
    /// Column holding the sector list
    pub sectors_column: String,
    /// Keep only the first N tasks
    pub limit: Option<usize>,
    /// Row-to-task mapping
    pub sector_mode: SectorMode,
}

impl PlanOptions {
    /// Options taken from a harvest configuration.
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            tic_column: config.input.tic_column.clone(),
            sectors_column: config.input.sectors_column.clone(),
            limit: config.harvest.limit,
            sector_mode: config.harvest.sector_mode,
        }
    }
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self::from_config(&HarvestConfig::default())
    }
}

/// The ordered list of tasks for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestPlan {
    tasks: Vec<HarvestTask>,
    available: usize,
    mode: SectorMode,
}

impl HarvestPlan {
    /// Builds a plan from the catalogue.
    ///
    /// A star with several TCEs has one row per TCE; rows repeating a
    /// `(tic, sectors)` pair already planned are dropped. In
    /// [`SectorMode::EachSector`] every row is split into one task per
    /// sector and repeated `(tic, sector)` pairs are dropped. The limit is
    /// applied last.
    pub fn from_table(table: &CandidateTable, options: &PlanOptions) -> Result<Self> {
        let rows = table.tasks(&options.tic_column, &options.sectors_column)?;

        let mut tasks: Vec<HarvestTask> = match options.sector_mode {
            SectorMode::FirstMatch => {
                let mut seen = HashSet::new();
                rows.into_iter()
                    .filter(|task| seen.insert((task.tic, task.sectors.clone())))
                    .collect()
            }
            SectorMode::EachSector => {
                let mut seen = HashSet::new();
                rows.iter()
                    .flat_map(|task| task.sectors.iter().map(move |s| (task.tic, s)))
                    .filter(|pair| seen.insert(*pair))
                    .map(|(tic, sector)| HarvestTask::new(tic, SectorSet::single(sector)))
                    .collect()
            }
        };

        let available = tasks.len();
        if let Some(limit) = options.limit {
            tasks.truncate(limit);
        }

        tracing::info!(
            tasks = tasks.len(),
            available,
            mode = ?options.sector_mode,
            "Harvest plan ready"
        );

        Ok(Self {
            tasks,
            available,
            mode: options.sector_mode,
        })
    }

    /// Builds a plan from an explicit task list.
    pub fn from_tasks(tasks: Vec<HarvestTask>) -> Self {
        Self {
            available: tasks.len(),
            tasks,
            mode: SectorMode::FirstMatch,
        }
    }

    /// Planned tasks, in catalogue order.
    pub fn tasks(&self) -> &[HarvestTask] {
        &self.tasks
    }

    /// Number of planned tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if nothing is planned.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks the catalogue yielded before the limit was applied.
    pub fn available(&self) -> usize {
        self.available
    }

    /// Returns `true` if the limit dropped tasks.
    pub fn is_truncated(&self) -> bool {
        self.available > self.tasks.len()
    }

    /// Row-to-task mapping the plan was built with.
    pub fn mode(&self) -> SectorMode {
        self.mode
    }

    /// Consumes the plan, yielding its tasks.
    pub fn into_tasks(self) -> Vec<HarvestTask> {
        self.tasks
    }
}
