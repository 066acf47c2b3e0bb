//! Relational store behind the pipeline.
//!
//! A run never touches a pool or session implicitly: it receives a
//! [`RunTx`] from [`Store::begin`] and hands that handle to every step
//! (species resolution, bulk load). The handle is consumed by exactly one of
//! [`RunTx::commit`] or [`RunTx::rollback`]; dropping it uncommitted rolls
//! back.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::error::{IngestError, Result};
use crate::models::{RowSet, Value};
use crate::schema::{TableSchema, CLIMATE_DATA, WILDLIFE_DATA};
use crate::verify::{DateRange, NullCount, VerifyReport};

/// PostgreSQL accepts at most 65535 bind parameters per statement.
const BIND_LIMIT: usize = 65_535;

/// Largest number of rows whose bind parameters fit in one statement.
fn rows_per_statement(column_count: usize) -> usize {
    (BIND_LIMIT / column_count.max(1)).max(1)
}

/// One ingestion run's transaction.
#[async_trait]
pub trait RunTx: Send {
    /// Ids of every reference ecosystem visible to this run.
    async fn ecosystem_ids(&mut self) -> Result<Vec<i32>>;

    async fn find_species(&mut self, scientific_name: &str) -> Result<Option<i32>>;

    /// Insert a species with only its scientific name and return its id.
    /// The row is visible to this run immediately but not committed.
    async fn insert_species(&mut self, scientific_name: &str) -> Result<i32>;

    /// Stage rows into `table`. Callers go through the bulk loader, which
    /// validates the column set first.
    async fn insert_rows(&mut self, table: &TableSchema, rows: &RowSet) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn RunTx>>;

    /// Delete every climate and wildlife observation. Returns rows removed.
    async fn clear_observations(&self) -> Result<u64>;

    /// Read-only data-quality summary.
    async fn verify(&self) -> Result<VerifyReport>;
}

// ---

/// [`Store`] over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    // ---
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgRun {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Store for PgStore {
    // ---
    async fn begin(&self) -> Result<Box<dyn RunTx>> {
        let tx = self.pool.begin().await.map_err(IngestError::from_db)?;
        Ok(Box::new(PgRun { tx }))
    }

    async fn clear_observations(&self) -> Result<u64> {
        // ---
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for table in [CLIMATE_DATA.name, WILDLIFE_DATA.name] {
            let result = sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
            tracing::info!("Cleared {} rows from {}", result.rows_affected(), table);
            removed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn verify(&self) -> Result<VerifyReport> {
        // ---
        let mut report = VerifyReport::default();

        for table in VerifyReport::COUNTED_TABLES {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&self.pool)
                .await?;
            report.counts.push((table.to_string(), count));
        }

        for (table, column) in VerifyReport::NULL_CHECKED_COLUMNS {
            let nulls: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM {table} WHERE {column} IS NULL"
            ))
            .fetch_one(&self.pool)
            .await?;
            report.nulls.push(NullCount {
                table: table.to_string(),
                column: column.to_string(),
                nulls,
            });
        }

        for table in [CLIMATE_DATA.name, WILDLIFE_DATA.name] {
            let (min, max): (Option<NaiveDate>, Option<NaiveDate>) = sqlx::query_as(&format!(
                "SELECT MIN(date_recorded), MAX(date_recorded) FROM {table}"
            ))
            .fetch_one(&self.pool)
            .await?;
            report.date_ranges.push(DateRange {
                table: table.to_string(),
                min,
                max,
            });
        }

        let sources: Vec<(Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT data_source, COUNT(*)
            FROM climate_data
            GROUP BY data_source
            ORDER BY data_source
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        report.sources = sources
            .into_iter()
            .map(|(source, count)| (source.unwrap_or_else(|| "<null>".to_string()), count))
            .collect();

        Ok(report)
    }
}

#[async_trait]
impl RunTx for PgRun {
    // ---
    async fn ecosystem_ids(&mut self) -> Result<Vec<i32>> {
        let ids = sqlx::query_scalar("SELECT id FROM ecosystems ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(ids)
    }

    async fn find_species(&mut self, scientific_name: &str) -> Result<Option<i32>> {
        let id = sqlx::query_scalar("SELECT id FROM species WHERE scientific_name = $1")
            .bind(scientific_name)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(id)
    }

    async fn insert_species(&mut self, scientific_name: &str) -> Result<i32> {
        sqlx::query_scalar("INSERT INTO species (scientific_name) VALUES ($1) RETURNING id")
            .bind(scientific_name)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(IngestError::from_db)
    }

    async fn insert_rows(&mut self, table: &TableSchema, rows: &RowSet) -> Result<u64> {
        // ---
        if rows.is_empty() {
            return Ok(0);
        }

        let columns = rows.columns().join(", ");
        let mut staged = 0;

        for chunk in rows.rows().chunks(rows_per_statement(rows.columns().len())) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", table.name, columns));

            builder.push_values(chunk, |mut b, row| {
                for value in row {
                    match value {
                        Value::Int(v) => b.push_bind(*v),
                        Value::Float(v) => b.push_bind(*v),
                        Value::Text(v) => b.push_bind(v.clone()),
                        Value::Date(v) => b.push_bind(*v),
                    };
                }
            });

            let result = builder
                .build()
                .execute(&mut *self.tx)
                .await
                .map_err(IngestError::from_db)?;
            staged += result.rows_affected();
        }

        Ok(staged)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(IngestError::from_db)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
