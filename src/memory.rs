//! In-memory [`Store`] with the same run semantics as PostgreSQL.
//!
//! Each run stages its species and rows privately; commit merges them into
//! the shared tables, rollback (or drop) discards them. Writes are visible to
//! later reads in the same run only. Species names are unique: a name that
//! another run committed first fails this run's commit with
//! [`IngestError::Constraint`], mirroring the unique index.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{IngestError, Result};
use crate::models::{Ecosystem, RowSet, Species, Value};
use crate::schema::{TableSchema, CLIMATE_DATA, WILDLIFE_DATA};
use crate::store::{RunTx, Store};
use crate::verify::{DateRange, NullCount, VerifyReport};

/// A stored row, keyed by column. Absent columns read as null.
pub type StoredRow = BTreeMap<String, Value>;

#[derive(Debug, Default)]
struct Tables {
    ecosystems: Vec<Ecosystem>,
    species: Vec<Species>,
    next_species_id: i32,
    rows: BTreeMap<&'static str, Vec<StoredRow>>,
}

impl Tables {
    // ---
    fn table_rows(&self, table: &str) -> &[StoredRow] {
        self.rows.get(table).map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    // ---
    pub fn new(ecosystems: Vec<Ecosystem>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Tables {
                ecosystems,
                next_species_id: 1,
                ..Tables::default()
            })),
        }
    }

    /// Committed species.
    pub fn species(&self) -> Vec<Species> {
        lock(&self.inner).species.clone()
    }

    /// Committed rows of `table`.
    pub fn rows(&self, table: &str) -> Vec<StoredRow> {
        lock(&self.inner).rows.get(table).cloned().unwrap_or_default()
    }
}

fn lock(inner: &Mutex<Tables>) -> MutexGuard<'_, Tables> {
    // Commit mutates only after every check passes, so poisoned tables are still consistent
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct MemoryRun {
    inner: Arc<Mutex<Tables>>,
    new_species: Vec<Species>,
    new_rows: Vec<(&'static str, StoredRow)>,
}

#[async_trait]
impl Store for MemoryStore {
    // ---
    async fn begin(&self) -> Result<Box<dyn RunTx>> {
        Ok(Box::new(MemoryRun {
            inner: Arc::clone(&self.inner),
            new_species: Vec::new(),
            new_rows: Vec::new(),
        }))
    }

    async fn clear_observations(&self) -> Result<u64> {
        // ---
        let mut tables = lock(&self.inner);
        let mut removed = 0;
        for table in [CLIMATE_DATA.name, WILDLIFE_DATA.name] {
            removed += tables.rows.remove(table).map_or(0, |r| r.len() as u64);
        }
        Ok(removed)
    }

    async fn verify(&self) -> Result<VerifyReport> {
        // ---
        let tables = lock(&self.inner);
        let table_rows = |t: &'static str| tables.table_rows(t);
        let is_null = |row: &StoredRow, col: &str| row.get(col).map_or(true, Value::is_null);

        let mut report = VerifyReport::default();
        for table in VerifyReport::COUNTED_TABLES {
            let count = match table {
                "ecosystems" => tables.ecosystems.len(),
                "species" => tables.species.len(),
                other => table_rows(other).len(),
            };
            report.counts.push((table.to_string(), count as i64));
        }

        for (table, column) in VerifyReport::NULL_CHECKED_COLUMNS {
            let nulls = table_rows(table).iter().filter(|r| is_null(r, column)).count();
            report.nulls.push(NullCount {
                table: table.to_string(),
                column: column.to_string(),
                nulls: nulls as i64,
            });
        }

        for table in [CLIMATE_DATA.name, WILDLIFE_DATA.name] {
            let dates: Vec<NaiveDate> = table_rows(table)
                .iter()
                .filter_map(|r| match r.get("date_recorded") {
                    Some(Value::Date(Some(d))) => Some(*d),
                    _ => None,
                })
                .collect();
            report.date_ranges.push(DateRange {
                table: table.to_string(),
                min: dates.iter().min().copied(),
                max: dates.iter().max().copied(),
            });
        }

        let mut sources: BTreeMap<String, i64> = BTreeMap::new();
        for row in table_rows(CLIMATE_DATA.name) {
            let source = match row.get("data_source") {
                Some(Value::Text(Some(s))) => s.clone(),
                _ => "<null>".to_string(),
            };
            *sources.entry(source).or_default() += 1;
        }
        report.sources = sources.into_iter().collect();

        Ok(report)
    }
}

impl MemoryRun {
    // ---
    fn species_id_exists(&self, tables: &Tables, id: i32) -> bool {
        tables.species.iter().any(|s| s.id == id) || self.new_species.iter().any(|s| s.id == id)
    }

    /// Enforce the foreign keys PostgreSQL would.
    fn check_foreign_keys(&self, tables: &Tables, row: &StoredRow) -> Result<()> {
        // ---
        if let Some(Value::Int(Some(id))) = row.get("ecosystem_id") {
            if !tables.ecosystems.iter().any(|e| e.id == *id) {
                return Err(IngestError::Constraint(format!(
                    "ecosystem_id {id} does not reference an ecosystem"
                )));
            }
        }
        if let Some(Value::Int(Some(id))) = row.get("species_id") {
            if !self.species_id_exists(tables, *id) {
                return Err(IngestError::Constraint(format!(
                    "species_id {id} does not reference a species"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RunTx for MemoryRun {
    // ---
    async fn ecosystem_ids(&mut self) -> Result<Vec<i32>> {
        let mut ids: Vec<i32> = lock(&self.inner).ecosystems.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn find_species(&mut self, scientific_name: &str) -> Result<Option<i32>> {
        // ---
        if let Some(s) = self
            .new_species
            .iter()
            .find(|s| s.scientific_name == scientific_name)
        {
            return Ok(Some(s.id));
        }
        Ok(lock(&self.inner)
            .species
            .iter()
            .find(|s| s.scientific_name == scientific_name)
            .map(|s| s.id))
    }

    async fn insert_species(&mut self, scientific_name: &str) -> Result<i32> {
        // ---
        let mut tables = lock(&self.inner);
        let taken = tables
            .species
            .iter()
            .chain(self.new_species.iter())
            .any(|s| s.scientific_name == scientific_name);
        if taken {
            return Err(IngestError::Constraint(format!(
                "duplicate species scientific_name {scientific_name:?}"
            )));
        }

        // Ids come from a shared sequence and are never reused
        let id = tables.next_species_id;
        tables.next_species_id += 1;
        drop(tables);

        self.new_species.push(Species {
            id,
            scientific_name: scientific_name.to_string(),
            common_name: None,
            conservation_status: None,
        });
        Ok(id)
    }

    async fn insert_rows(&mut self, table: &TableSchema, rows: &RowSet) -> Result<u64> {
        // ---
        let staged: Vec<StoredRow> = rows
            .rows()
            .iter()
            .map(|row| rows.columns().iter().cloned().zip(row.iter().cloned()).collect())
            .collect();

        let tables = lock(&self.inner);
        for row in &staged {
            self.check_foreign_keys(&tables, row)?;
        }
        drop(tables);

        let count = staged.len() as u64;
        self.new_rows
            .extend(staged.into_iter().map(|row| (table.name, row)));
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        // ---
        let inner = Arc::clone(&self.inner);
        let mut tables = lock(&inner);
        if let Some(dup) = self
            .new_species
            .iter()
            .find(|n| tables.species.iter().any(|s| s.scientific_name == n.scientific_name))
        {
            return Err(IngestError::Constraint(format!(
                "duplicate species scientific_name {:?}",
                dup.scientific_name
            )));
        }

        let MemoryRun {
            new_species,
            new_rows,
            ..
        } = *self;
        tables.species.extend(new_species);
        for (table, row) in new_rows {
            tables.rows.entry(table).or_default().push(row);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
