//! NASA GISS global temperature anomalies.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Ingester, RunReport};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{Fetch, Request};
use crate::loader::BulkLoader;
use crate::models::RowSet;
use crate::parsers::NasaParser;
use crate::schema::CLIMATE_DATA;
use crate::store::RunTx;

const DATASET: &str = "global_land_ocean";

pub struct NasaIngester {
    fetcher: Arc<dyn Fetch>,
    parser: NasaParser,
    loader: BulkLoader,
    dataset_url: String,
    raw_data_dir: PathBuf,
}

impl NasaIngester {
    // ---
    pub fn new(fetcher: Arc<dyn Fetch>, config: &Config) -> Self {
        Self {
            fetcher,
            parser: NasaParser,
            loader: BulkLoader,
            dataset_url: config.nasa_gistemp_url.clone(),
            raw_data_dir: config.raw_data_dir.clone(),
        }
    }

    fn raw_path(&self) -> PathBuf {
        self.raw_data_dir.join(format!("nasa_{DATASET}.csv"))
    }
}

#[async_trait]
impl Ingester for NasaIngester {
    // ---
    fn name(&self) -> &'static str {
        "nasa"
    }

    async fn stage(&self, tx: &mut dyn RunTx, report: &mut RunReport) -> Result<()> {
        // ---
        tracing::info!("Downloading NASA dataset: {}", DATASET);
        let dest = self.raw_path();
        self.fetcher
            .download(&Request::new(&self.dataset_url), &dest)
            .await?;
        let csv_text = tokio::fs::read_to_string(&dest).await?;

        let ecosystems = tx.ecosystem_ids().await?;
        if ecosystems.is_empty() {
            tracing::warn!("No ecosystems defined; NASA anomalies have nothing to attach to");
            report.entities_skipped += 1;
            return Ok(());
        }

        let parsed = self.parser.parse(&csv_text, &ecosystems);
        parsed.stats.log_summary("NASA global_land_ocean");
        report.rows_skipped += parsed.stats.dropped();

        if parsed.records.is_empty() {
            tracing::warn!("NASA dataset {} produced no usable rows", DATASET);
            report.entities_skipped += 1;
            return Ok(());
        }

        let rows = RowSet::from_records(parsed.records);
        report.rows_staged += self.loader.load(tx, &rows, &CLIMATE_DATA).await?;
        Ok(())
    }
}
