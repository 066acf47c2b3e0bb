//! NOAA GHCN-Daily observations over a station × year matrix.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{pause, Ingester, RunReport};
use crate::classify::StationMap;
use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::fetch::{Fetch, Request};
use crate::loader::BulkLoader;
use crate::models::RowSet;
use crate::parsers::NoaaParser;
use crate::schema::CLIMATE_DATA;
use crate::store::RunTx;

/// Largest page the CDO API serves.
pub const PAGE_LIMIT: u64 = 1000;

pub struct NoaaIngester {
    fetcher: Arc<dyn Fetch>,
    parser: NoaaParser,
    stations: StationMap,
    loader: BulkLoader,
    api_url: String,
    api_key: String,
    station_ids: Vec<String>,
    start_year: i32,
    end_year: i32,
    delay: Duration,
}

impl NoaaIngester {
    // ---
    /// Fails with [`IngestError::Configuration`] before any network call when
    /// the token is missing or the year range is empty.
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        config: &Config,
        parser: NoaaParser,
        stations: StationMap,
        station_ids: Vec<String>,
        start_year: i32,
        end_year: i32,
    ) -> Result<Self> {
        // ---
        let api_key = config.require_noaa_api_key()?.to_string();
        if start_year > end_year {
            return Err(IngestError::Configuration(format!(
                "NOAA start year {start_year} is after end year {end_year}"
            )));
        }

        Ok(Self {
            fetcher,
            parser,
            stations,
            loader: BulkLoader,
            api_url: config.noaa_api_url.trim_end_matches('/').to_string(),
            api_key,
            station_ids,
            start_year,
            end_year,
            delay: config.request_delay,
        })
    }

    fn page_request(&self, station_id: &str, year: i32, offset: u64) -> Request {
        // ---
        let mut req = Request::new(format!("{}/data", self.api_url))
            .header("token", self.api_key.as_str())
            .query("datasetid", "GHCND")
            .query("stationid", station_id)
            .query("startdate", format!("{year}-01-01"))
            .query("enddate", format!("{year}-12-31"));
        for datatype in self.parser.units().datatypes() {
            req = req.query("datatypeid", datatype);
        }
        req.query("limit", PAGE_LIMIT)
            .query("units", "metric")
            .query("offset", offset)
    }

    /// All observations for one station and calendar year, following the
    /// 1-based offset until the result set is exhausted.
    async fn fetch_station_year(&self, station_id: &str, year: i32) -> Result<Vec<Value>> {
        // ---
        let mut results = Vec::new();
        let mut offset = 1;

        loop {
            let body = self
                .fetcher
                .get_json(&self.page_request(station_id, year, offset))
                .await?;

            let page = body
                .get("results")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if page.is_empty() {
                break;
            }

            let total = body
                .pointer("/metadata/resultset/count")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            tracing::debug!(
                "{} {}: page at offset {} has {} of {} observations",
                station_id,
                year,
                offset,
                page.len(),
                total
            );
            results.extend(page);

            offset += PAGE_LIMIT;
            if offset > total {
                break;
            }
            pause(self.delay).await;
        }

        Ok(results)
    }
}

#[async_trait]
impl Ingester for NoaaIngester {
    // ---
    fn name(&self) -> &'static str {
        "noaa"
    }

    async fn stage(&self, tx: &mut dyn RunTx, report: &mut RunReport) -> Result<()> {
        // ---
        tracing::info!(
            "Ingesting NOAA stations {:?} from {}-{}",
            self.station_ids,
            self.start_year,
            self.end_year
        );
        let known: HashSet<i32> = tx.ecosystem_ids().await?.into_iter().collect();

        for station_id in &self.station_ids {
            let Some(ecosystem_id) = self
                .stations
                .lookup(station_id)
                .filter(|id| known.contains(id))
            else {
                tracing::warn!("No ecosystem mapping found for station {}. Skipping.", station_id);
                report.entities_skipped += 1;
                continue;
            };

            tracing::info!("Processing station: {} (Ecosystem: {})", station_id, ecosystem_id);
            for year in self.start_year..=self.end_year {
                let observations = self.fetch_station_year(station_id, year).await?;

                if observations.is_empty() {
                    tracing::info!("  - {} {}: no observations", station_id, year);
                    report.entities_skipped += 1;
                } else {
                    let parsed = self.parser.parse(station_id, ecosystem_id, &observations);
                    parsed.stats.log_summary(&format!("NOAA {station_id} {year}"));
                    report.rows_skipped += parsed.stats.dropped();

                    if parsed.records.is_empty() {
                        tracing::warn!("  - {} {}: no usable observations", station_id, year);
                        report.entities_skipped += 1;
                    } else {
                        let rows = RowSet::from_records(parsed.records);
                        report.rows_staged +=
                            self.loader.load(tx, &rows, &CLIMATE_DATA).await?;
                    }
                }

                pause(self.delay).await;
            }
        }

        Ok(())
    }
}
