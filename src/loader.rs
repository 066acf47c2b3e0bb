//! Schema-checked bulk staging of normalized rows.

use std::collections::HashSet;

use crate::error::{IngestError, Result};
use crate::models::RowSet;
use crate::schema::TableSchema;
use crate::store::RunTx;

#[derive(Debug, Clone, Copy, Default)]
pub struct BulkLoader;

impl BulkLoader {
    // ---
    /// Stage `rows` into `table` inside the caller's transaction.
    ///
    /// Every column of `rows` must belong to `table`, and appear once;
    /// otherwise nothing is inserted and [`IngestError::SchemaMismatch`]
    /// names the offending columns. Empty row sets stage nothing. Never
    /// commits. Returns the number of rows staged.
    pub async fn load(&self, tx: &mut dyn RunTx, rows: &RowSet, table: &TableSchema) -> Result<u64> {
        // ---
        let mut seen = HashSet::new();
        let offending: Vec<String> = rows
            .columns()
            .iter()
            .filter(|c| !table.has_column(c) || !seen.insert(c.as_str()))
            .cloned()
            .collect();

        if !offending.is_empty() {
            return Err(IngestError::SchemaMismatch {
                table: table.name.to_string(),
                columns: offending,
            });
        }

        if rows.is_empty() {
            return Ok(0);
        }

        let staged = tx.insert_rows(table, rows).await?;
        tracing::info!("Staged {} records into {}", staged, table.name);
        Ok(staged)
    }
}
