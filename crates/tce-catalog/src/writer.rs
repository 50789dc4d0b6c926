//! Batched light-curve writer.

use sqlx::sqlite::SqlitePool;
use sqlx::{Sqlite, Transaction};
use tce_core::{Error, LightCurveRecord, Result};

use crate::schema::UPSERT_LIGHT_CURVE;

/// Upserts records inside an open transaction, committing every
/// `commit_every` records and starting a fresh transaction.
///
/// Records not yet committed are rolled back if the writer is dropped
/// without [`finish`](Self::finish).
pub struct CatalogWriter {
    pool: SqlitePool,
    tx: Option<Transaction<'static, Sqlite>>,
    commit_every: usize,
    pending: usize,
    recorded: usize,
    commits: usize,
}

impl std::fmt::Debug for CatalogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogWriter")
            .field("commit_every", &self.commit_every)
            .field("pending", &self.pending)
            .field("recorded", &self.recorded)
            .field("open", &self.tx.is_some())
            .finish()
    }
}

impl CatalogWriter {
    pub(crate) async fn begin(pool: SqlitePool, commit_every: usize) -> Result<Self> {
        if commit_every == 0 {
            return Err(Error::validation_field(
                "catalog.commit_every",
                "must be at least 1",
            ));
        }
        let tx = pool.begin().await?;
        Ok(Self {
            pool,
            tx: Some(tx),
            commit_every,
            pending: 0,
            recorded: 0,
            commits: 0,
        })
    }

    /// Upserts one record. Commits when the batch is full.
    pub async fn record(&mut self, record: &LightCurveRecord) -> Result<()> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| Error::validation("catalog writer already finished"))?;
        upsert(&mut **tx, record).await?;

        self.pending += 1;
        self.recorded += 1;

        if self.pending >= self.commit_every {
            self.commit_batch().await?;
            tracing::info!(recorded = self.recorded, "Processed {} light curves", self.recorded);
        }
        Ok(())
    }

    /// Records upserted so far, committed or not.
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Records waiting for the next commit.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Transactions committed so far.
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Commits the remaining records and returns the total recorded.
    pub async fn finish(mut self) -> Result<usize> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            if self.pending > 0 {
                self.commits += 1;
            }
            self.pending = 0;
        }
        tracing::debug!(recorded = self.recorded, commits = self.commits, "Catalog writer finished");
        Ok(self.recorded)
    }

    async fn commit_batch(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            self.commits += 1;
        }
        self.pending = 0;
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }
}

/// Upserts a record on any SQLite executor.
pub(crate) async fn upsert<'e, E>(executor: E, record: &LightCurveRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(UPSERT_LIGHT_CURVE)
        .bind(record.tic.get() as i64)
        .bind(i64::from(record.sector.get()))
        .bind(record.path.to_string_lossy().into_owned())
        .execute(executor)
        .await?;
    Ok(())
}
