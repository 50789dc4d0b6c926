//! Import of catalogue feature columns into the `TOIs` table.
//!
//! The table is dropped and recreated on every import. Each column's SQL
//! type is inferred from its cells: `INTEGER` when every non-empty cell is
//! an integer, `REAL` when every non-empty cell is a number, `TEXT`
//! otherwise. Empty cells become `NULL`.

use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use tce_core::{CandidateTable, Result};

use crate::schema::{TOIS_TABLE, quote_ident};
use crate::store::Catalog;

/// Inferred SQL type of a feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 64-bit integers
    Integer,
    /// Floating point
    Real,
    /// Anything else
    Text,
}

impl ColumnType {
    /// SQL type name.
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// Infers the narrowest type that holds every cell.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        let mut ty = ColumnType::Integer;
        for cell in cells.into_iter().map(str::trim).filter(|c| !c.is_empty()) {
            match ty {
                ColumnType::Integer if cell.parse::<i64>().is_ok() => {}
                ColumnType::Integer | ColumnType::Real if cell.parse::<f64>().is_ok() => {
                    ty = ColumnType::Real;
                }
                _ => return ColumnType::Text,
            }
        }
        ty
    }
}

enum Cell<'a> {
    Null,
    Integer(i64),
    Real(f64),
    Text(&'a str),
}

impl<'a> Cell<'a> {
    fn convert(raw: &'a str, ty: ColumnType) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Null;
        }
        match ty {
            ColumnType::Integer => trimmed.parse().map(Cell::Integer).unwrap_or(Cell::Text(raw)),
            ColumnType::Real => trimmed.parse().map(Cell::Real).unwrap_or(Cell::Text(raw)),
            ColumnType::Text => Cell::Text(raw),
        }
    }

    fn bind<'q>(
        self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>>
    where
        'a: 'q,
    {
        match self {
            Cell::Null => query.bind(None::<String>),
            Cell::Integer(v) => query.bind(v),
            Cell::Real(v) => query.bind(v),
            Cell::Text(v) => query.bind(v),
        }
    }
}

impl Catalog {
    /// Replaces the `TOIs` table with the table's columns minus `exclude`.
    ///
    /// Runs in one transaction; returns the number of rows written.
    pub async fn replace_tois(&self, table: &CandidateTable, exclude: &str) -> Result<u64> {
        let columns = table.feature_columns(exclude);
        let types: Vec<ColumnType> = columns
            .iter()
            .map(|(idx, _)| {
                ColumnType::infer(
                    table
                        .rows()
                        .iter()
                        .map(|row| row.get(*idx).map(String::as_str).unwrap_or("")),
                )
            })
            .collect();

        let table_name = quote_ident(TOIS_TABLE);
        let mut tx = self.pool().begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {table_name}"))
            .execute(&mut *tx)
            .await?;

        if columns.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        let definitions: Vec<String> = columns
            .iter()
            .zip(&types)
            .map(|((_, name), ty)| format!("{} {}", quote_ident(name), ty.sql()))
            .collect();
        sqlx::query(&format!(
            "CREATE TABLE {table_name} ({})",
            definitions.join(", ")
        ))
        .execute(&mut *tx)
        .await?;

        let names: Vec<String> = columns.iter().map(|(_, n)| quote_ident(n)).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!(
            "INSERT INTO {table_name} ({}) VALUES ({placeholders})",
            names.join(", ")
        );

        let mut written = 0u64;
        for row in table.rows() {
            let mut query = sqlx::query(&insert);
            for ((idx, _), ty) in columns.iter().zip(&types) {
                let raw = row.get(*idx).map(String::as_str).unwrap_or("");
                query = Cell::convert(raw, *ty).bind(query);
            }
            query.execute(&mut *tx).await?;
            written += 1;
        }

        tx.commit().await?;
        tracing::info!(rows = written, columns = columns.len(), "TOI table replaced");
        Ok(written)
    }
}
