//! GBIF occurrences for a list of species.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{pause, Ingester, RunReport};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{Fetch, Request};
use crate::loader::BulkLoader;
use crate::models::RowSet;
use crate::parsers::GbifParser;
use crate::schema::WILDLIFE_DATA;
use crate::species::SpeciesResolver;
use crate::store::RunTx;

pub const DEFAULT_OCCURRENCE_LIMIT: u32 = 200;

/// Largest page the occurrence search serves.
pub const MAX_PAGE_SIZE: u32 = 300;

pub struct GbifIngester {
    fetcher: Arc<dyn Fetch>,
    parser: GbifParser,
    resolver: SpeciesResolver,
    loader: BulkLoader,
    api_url: String,
    species: Vec<String>,
    limit_per_species: u32,
    delay: Duration,
}

impl GbifIngester {
    // ---
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        config: &Config,
        parser: GbifParser,
        species: Vec<String>,
        limit_per_species: u32,
    ) -> Self {
        Self {
            fetcher,
            parser,
            resolver: SpeciesResolver,
            loader: BulkLoader,
            api_url: config.gbif_api_url.trim_end_matches('/').to_string(),
            species,
            limit_per_species,
            delay: config.request_delay,
        }
    }

    /// GBIF's taxon key for a name, `None` when the strict match has none.
    async fn species_key(&self, name: &str) -> Result<Option<i64>> {
        // ---
        let req = Request::new(format!("{}/species/match", self.api_url))
            .query("name", name)
            .query("strict", "true");
        let body = self.fetcher.get_json(&req).await?;
        Ok(body.get("usageKey").and_then(Value::as_i64))
    }

    /// Up to `limit_per_species` georeferenced occurrences, paged.
    async fn occurrences(&self, taxon_key: i64) -> Result<Vec<Value>> {
        // ---
        let limit = self.limit_per_species as usize;
        let mut results = Vec::new();

        while results.len() < limit {
            let page_size = (limit - results.len()).min(MAX_PAGE_SIZE as usize);
            let req = Request::new(format!("{}/occurrence/search", self.api_url))
                .query("taxonKey", taxon_key)
                .query("hasCoordinate", "true")
                .query("hasGeospatialIssue", "false")
                .query("limit", page_size)
                .query("offset", results.len());
            let body = self.fetcher.get_json(&req).await?;

            let page = body
                .get("results")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let end_of_records = body
                .get("endOfRecords")
                .and_then(Value::as_bool)
                .unwrap_or(true);

            tracing::debug!(
                "taxon {}: {} occurrences at offset {}",
                taxon_key,
                page.len(),
                results.len()
            );
            if page.is_empty() {
                break;
            }
            results.extend(page.into_iter().take(page_size));

            if end_of_records {
                break;
            }
            pause(self.delay).await;
        }

        Ok(results)
    }
}

#[async_trait]
impl Ingester for GbifIngester {
    // ---
    fn name(&self) -> &'static str {
        "gbif"
    }

    async fn stage(&self, tx: &mut dyn RunTx, report: &mut RunReport) -> Result<()> {
        // ---
        tracing::info!("Starting GBIF ingestion for {} species.", self.species.len());
        let known: HashSet<i32> = tx.ecosystem_ids().await?.into_iter().collect();

        for (i, name) in self.species.iter().enumerate() {
            if i > 0 {
                pause(self.delay).await;
            }
            tracing::info!("--- Processing: {} ---", name);

            let species = self.resolver.resolve(tx, name).await?;
            if species.created {
                report.species_created += 1;
            }

            let Some(taxon_key) = self.species_key(name).await? else {
                tracing::warn!("Could not find species key for {}. Skipping.", name);
                report.entities_skipped += 1;
                continue;
            };

            let occurrences = self.occurrences(taxon_key).await?;
            if occurrences.is_empty() {
                tracing::info!("No occurrences found for {}.", name);
                report.entities_skipped += 1;
                continue;
            }

            let parsed = self.parser.parse(species.id, &occurrences, &known);
            parsed.stats.log_summary(&format!("GBIF {name}"));
            report.rows_skipped += parsed.stats.dropped();

            if parsed.records.is_empty() {
                tracing::info!("No processable occurrences found for {}.", name);
                report.entities_skipped += 1;
                continue;
            }

            let rows = RowSet::from_records(parsed.records);
            report.rows_staged += self.loader.load(tx, &rows, &WILDLIFE_DATA).await?;
        }

        Ok(())
    }
}
