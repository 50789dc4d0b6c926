//! The TCE catalogue (`tces.csv`).
//!
//! The catalogue is a headed CSV file. Two columns drive harvesting (the TIC
//! id and the sector list); every other column is a feature copied into the
//! catalog database as-is.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{HarvestTask, SectorSet, TicId};

/// Default TIC column name.
pub const TIC_COLUMN: &str = "tic_id";

/// Default sector-list column name.
pub const SECTORS_COLUMN: &str = "Sectors";

/// An in-memory copy of the catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTable {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CandidateTable {
    /// Reads a headed CSV file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::input(path, None, "catalogue file not found"));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(path)?;

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        tracing::debug!(path = %path.display(), rows = rows.len(), "Catalogue loaded");

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    /// Builds a table from parts, mostly for tests and tooling.
    pub fn from_parts(
        path: impl Into<PathBuf>,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            path: path.into(),
            headers,
            rows,
        }
    }

    /// Source file of the table.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column names in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows in file order.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Column names minus the excluded one, paired with their index.
    pub fn feature_columns(&self, exclude: &str) -> Vec<(usize, &str)> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.as_str() != exclude)
            .map(|(i, h)| (i, h.as_str()))
            .collect()
    }

    /// Harvest tasks in file order.
    ///
    /// Rows with no sectors are skipped. A malformed TIC or sector cell
    /// fails the whole read, naming the 1-based data line.
    pub fn tasks(&self, tic_column: &str, sectors_column: &str) -> Result<Vec<HarvestTask>> {
        let tic_idx = self.require_column(tic_column)?;
        let sectors_idx = self.require_column(sectors_column)?;

        let mut tasks = Vec::with_capacity(self.rows.len());
        let mut skipped = 0usize;

        for (i, row) in self.rows.iter().enumerate() {
            let line = Some(i as u64 + 1);
            let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("");

            let Some(sectors) = SectorSet::parse(cell(sectors_idx))
                .map_err(|e| Error::input(&self.path, line, e.to_string()))?
            else {
                skipped += 1;
                continue;
            };

            let tic = cell(tic_idx)
                .parse::<TicId>()
                .map_err(|e| Error::input(&self.path, line, e.to_string()))?;

            tasks.push(HarvestTask::new(tic, sectors));
        }

        if skipped > 0 {
            tracing::info!(skipped, "Skipped catalogue rows without sectors");
        }

        Ok(tasks)
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            Error::input(
                &self.path,
                None,
                format!("missing column '{name}' (have: {})", self.headers.join(", ")),
            )
        })
    }
}
