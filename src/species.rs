//! Lazy creation of `species` rows inside a run.

use crate::error::Result;
use crate::store::RunTx;

/// Outcome of resolving a scientific name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSpecies {
    pub id: i32,
    /// True when this call inserted the row.
    pub created: bool,
}

/// Looks a species up by exact scientific name, creating it on a miss.
///
/// A new row carries only its scientific name and is flushed, not committed,
/// so later inserts in the same run can reference its id. Existing rows are
/// never updated.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeciesResolver;

impl SpeciesResolver {
    // ---
    pub async fn resolve(&self, tx: &mut dyn RunTx, scientific_name: &str) -> Result<ResolvedSpecies> {
        // ---
        if let Some(id) = tx.find_species(scientific_name).await? {
            tracing::debug!("Species {:?} already known as id {}", scientific_name, id);
            return Ok(ResolvedSpecies { id, created: false });
        }

        let id = tx.insert_species(scientific_name).await?;
        tracing::info!("Creating new species: {} (id {})", scientific_name, id);
        Ok(ResolvedSpecies { id, created: true })
    }
}
