//! Per-source ingesters and the run lifecycle they share.
//!
//! An ingester only knows how to stage its source into an open
//! transaction. [`run`] is the single place a run begins and ends: it opens
//! the transaction, lets the ingester stage, then commits, or rolls back on
//! any error the ingester lets escape.

use async_trait::async_trait;
use serde::Serialize;
use tracing::Instrument;

use crate::error::Result;
use crate::store::{RunTx, Store};

pub mod gbif;
pub mod nasa;
pub mod noaa;

pub use gbif::GbifIngester;
pub use nasa::NasaIngester;
pub use noaa::NoaaIngester;

// ---

/// Summary of one committed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub source: &'static str,
    pub rows_staged: u64,
    /// Rows or cells dropped by the parsers.
    pub rows_skipped: usize,
    pub species_created: usize,
    /// Stations, years or species skipped without failing the run.
    pub entities_skipped: usize,
}

impl RunReport {
    // ---
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait Ingester: Send + Sync {
    /// Short source label used in logs and reports.
    fn name(&self) -> &'static str;

    /// Fetch, parse, classify and stage everything for this run into `tx`.
    async fn stage(&self, tx: &mut dyn RunTx, report: &mut RunReport) -> Result<()>;
}

/// Execute one ingester as a single atomic run.
pub async fn run(store: &dyn Store, ingester: &dyn Ingester) -> Result<RunReport> {
    // ---
    let span = tracing::info_span!("run", source = ingester.name());

    async move {
        tracing::info!("Starting {} ingestion", ingester.name());

        let mut tx = store.begin().await?;
        let mut report = RunReport::new(ingester.name());

        match ingester.stage(tx.as_mut(), &mut report).await {
            Ok(()) => {
                tracing::info!("Committing all changes to the database.");
                tx.commit().await?;
                tracing::info!(
                    "{} ingestion completed: {} rows staged, {} skipped, {} species created, {} entities skipped",
                    report.source,
                    report.rows_staged,
                    report.rows_skipped,
                    report.species_created,
                    report.entities_skipped
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!("{} ingestion failed, rolling back: {}", ingester.name(), e);
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!("Rollback failed: {}", rb);
                }
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

/// Fixed pause between upstream requests.
pub(crate) async fn pause(delay: std::time::Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
