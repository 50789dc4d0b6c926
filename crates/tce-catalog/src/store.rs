//! Catalog database handle.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tce_core::{Error, LightCurveRecord, Result, Sector, TicId};

use crate::schema::{CREATE_LIGHT_CURVES, LIGHT_CURVES_TABLE, TOIS_TABLE};
use crate::writer::CatalogWriter;

/// Summary counts for `tce status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CatalogStats {
    /// Rows in `LightCurves`
    pub light_curves: u64,
    /// Distinct targets with at least one light curve
    pub targets: u64,
    /// Distinct sectors covered
    pub sectors: u64,
    /// Rows in `TOIs` (0 when the table is absent)
    pub tois: u64,
}

/// Handle to the SQLite catalog.
///
/// Cheap to clone; clones share one pool. The pool holds a single
/// connection because only the harvest runner writes.
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: SqlitePool,
    path: PathBuf,
}

impl Catalog {
    /// Opens (creating if needed) the database and ensures the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(e, parent))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_LIGHT_CURVES).execute(&pool).await?;

        tracing::debug!(path = %path.display(), "Catalog opened");

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Database file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Underlying pool, for the writer and TOI import.
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a batched writer that commits every `commit_every` records.
    pub async fn writer(&self, commit_every: usize) -> Result<CatalogWriter> {
        CatalogWriter::begin(self.pool.clone(), commit_every).await
    }

    /// Records a single light curve outside any batch.
    pub async fn record(&self, record: &LightCurveRecord) -> Result<()> {
        crate::writer::upsert(&self.pool, record).await
    }

    /// Light curves for one target, ordered by sector.
    pub async fn light_curves_for(&self, tic: TicId) -> Result<Vec<LightCurveRecord>> {
        let rows = sqlx::query(
            "SELECT TIC, sector, path_to_fits FROM LightCurves WHERE TIC = ? ORDER BY sector",
        )
        .bind(tic.get() as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<LightCurveRecord> {
                let tic: i64 = row.try_get("TIC")?;
                let sector: i64 = row.try_get("sector")?;
                let path: String = row.try_get("path_to_fits")?;
                let sector = u16::try_from(sector)
                    .map_err(|_| Error::validation_field("sector", format!("{sector} out of range")))
                    .and_then(Sector::new)?;
                Ok(LightCurveRecord {
                    tic: TicId::new(tic as u64),
                    sector,
                    path: PathBuf::from(path),
                })
            })
            .collect()
    }

    /// Row counts for reporting.
    pub async fn stats(&self) -> Result<CatalogStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n, COUNT(DISTINCT TIC) AS t, COUNT(DISTINCT sector) AS s \
             FROM LightCurves",
        )
        .fetch_one(&self.pool)
        .await?;

        let tois = if self.table_exists(TOIS_TABLE).await? {
            let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {TOIS_TABLE}"))
                .fetch_one(&self.pool)
                .await?;
            row.try_get::<i64, _>("n")? as u64
        } else {
            0
        };

        Ok(CatalogStats {
            light_curves: row.try_get::<i64, _>("n")? as u64,
            targets: row.try_get::<i64, _>("t")? as u64,
            sectors: row.try_get::<i64, _>("s")? as u64,
            tois,
        })
    }

    /// Returns `true` if a table with this name exists.
    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("n")? > 0)
    }

    /// Closes the pool, flushing the connection.
    pub async fn close(self) {
        tracing::debug!(path = %self.path.display(), table = LIGHT_CURVES_TABLE, "Closing catalog");
        self.pool.close().await;
    }
}
