//! Selects ingesters for one execution and runs them one after another.
//!
//! Each selected source is its own run: a failure is logged and reported,
//! and the next source still runs.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use clap::ValueEnum;

use crate::classify::{default_station_map, EcosystemClassifier, StationMap};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::Fetch;
use crate::ingest::gbif::DEFAULT_OCCURRENCE_LIMIT;
use crate::ingest::{self, GbifIngester, Ingester, NasaIngester, NoaaIngester, RunReport};
use crate::parsers::{GbifParser, NoaaParser, UnitMap};
use crate::store::Store;

/// Command-line source selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceSelector {
    Nasa,
    Gbif,
    Noaa,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Nasa,
    Gbif,
    Noaa,
}

impl Source {
    // ---
    /// Execution order when several sources are selected.
    pub const ALL: [Source; 3] = [Source::Nasa, Source::Gbif, Source::Noaa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Nasa => "NASA",
            Source::Gbif => "GBIF",
            Source::Noaa => "NOAA",
        }
    }
}

/// Resolve selectors to distinct sources in execution order.
pub fn expand(selectors: &[SourceSelector]) -> Vec<Source> {
    // ---
    let wants = |s: Source| {
        selectors.iter().any(|sel| {
            matches!(
                (sel, s),
                (SourceSelector::All, _)
                    | (SourceSelector::Nasa, Source::Nasa)
                    | (SourceSelector::Gbif, Source::Gbif)
                    | (SourceSelector::Noaa, Source::Noaa)
            )
        })
    };
    Source::ALL.into_iter().filter(|s| wants(*s)).collect()
}

/// Per-source parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub species: Vec<String>,
    pub limit_per_species: u32,
    pub start_year: i32,
    pub end_year: i32,
    pub stations: Vec<String>,
}

impl Default for IngestOptions {
    /// Two species, and the three most recent complete years for New York.
    fn default() -> Self {
        let current_year = Utc::now().year();
        Self {
            species: vec!["Ursus maritimus".to_string(), "Panthera leo".to_string()],
            limit_per_species: DEFAULT_OCCURRENCE_LIMIT,
            start_year: current_year - 3,
            end_year: current_year - 1,
            stations: vec!["GHCND:USW00014733".to_string()],
        }
    }
}

/// Lookup tables injected into classifiers and parsers.
#[derive(Debug, Clone)]
pub struct Lookups {
    pub bounding_boxes: EcosystemClassifier,
    pub stations: StationMap,
    pub units: UnitMap,
}

impl Default for Lookups {
    fn default() -> Self {
        Self {
            bounding_boxes: EcosystemClassifier::default(),
            stations: default_station_map(),
            units: UnitMap::default(),
        }
    }
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub source: Source,
    pub result: Result<RunReport>,
}

pub struct Orchestrator<'a> {
    store: &'a dyn Store,
    fetcher: Arc<dyn Fetch>,
    config: &'a Config,
    lookups: Lookups,
}

impl<'a> Orchestrator<'a> {
    // ---
    pub fn new(store: &'a dyn Store, fetcher: Arc<dyn Fetch>, config: &'a Config) -> Self {
        Self {
            store,
            fetcher,
            config,
            lookups: Lookups::default(),
        }
    }

    pub fn with_lookups(mut self, lookups: Lookups) -> Self {
        self.lookups = lookups;
        self
    }

    /// Build the ingester for `source`. Configuration errors surface here,
    /// before any network call.
    pub fn build(&self, source: Source, opts: &IngestOptions) -> Result<Box<dyn Ingester>> {
        // ---
        let fetcher = Arc::clone(&self.fetcher);
        Ok(match source {
            Source::Nasa => Box::new(NasaIngester::new(fetcher, self.config)),
            Source::Gbif => Box::new(GbifIngester::new(
                fetcher,
                self.config,
                GbifParser::new(self.lookups.bounding_boxes.clone()),
                opts.species.clone(),
                opts.limit_per_species,
            )),
            Source::Noaa => Box::new(NoaaIngester::new(
                fetcher,
                self.config,
                NoaaParser::new(self.lookups.units.clone()),
                self.lookups.stations.clone(),
                opts.stations.clone(),
                opts.start_year,
                opts.end_year,
            )?),
        })
    }

    /// Run each source to completion in order; failures do not stop later sources.
    pub async fn run(&self, sources: &[Source], opts: &IngestOptions) -> Vec<SourceOutcome> {
        // ---
        let mut outcomes = Vec::with_capacity(sources.len());

        for &source in sources {
            tracing::info!("--- Ingesting {} data ---", source.as_str());

            let result = match self.build(source, opts) {
                Ok(ingester) => ingest::run(self.store, ingester.as_ref()).await,
                Err(e) => Err(e),
            };

            match &result {
                Ok(_) => tracing::info!("--- {} Ingestion Completed ---", source.as_str()),
                Err(e) => tracing::error!("{} Ingestion Failed: {}", source.as_str(), e),
            }
            outcomes.push(SourceOutcome { source, result });
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::error::IngestError;
    use crate::fetch::HttpFetcher;
    use crate::memory::MemoryStore;
    use crate::schema::default_ecosystems;
    use crate::testing::test_config;
    use std::time::Duration;
    use crate::models::Value;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_expand_selectors() {
        // ---
        assert_eq!(expand(&[SourceSelector::All]), Source::ALL.to_vec());
        assert_eq!(
            expand(&[SourceSelector::Noaa, SourceSelector::Nasa, SourceSelector::Noaa]),
            vec![Source::Nasa, Source::Noaa]
        );
        assert_eq!(
            expand(&[SourceSelector::Gbif, SourceSelector::All]),
            Source::ALL.to_vec()
        );
        assert!(expand(&[]).is_empty());
    }

    #[test]
    fn test_default_years_end_last_year() {
        // ---
        let opts = IngestOptions::default();
        assert_eq!(opts.end_year - opts.start_year, 2);
        assert_eq!(opts.end_year, Utc::now().year() - 1);
    }

    #[tokio::test]
    async fn failing_source_does_not_stop_the_next() {
        // ---
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gistemp.csv"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.noaa_api_key = None;
        let store = MemoryStore::new(default_ecosystems());
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(5)).unwrap());
        let opts = IngestOptions {
            species: vec![],
            ..IngestOptions::default()
        };

        let outcomes = Orchestrator::new(&store, fetcher, &config)
            .run(&Source::ALL, &opts)
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0].result, Err(IngestError::Fetch(_))));
        assert!(outcomes[1].result.is_ok());
        assert!(matches!(
            outcomes[2].result,
            Err(IngestError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn injected_lookups_drive_classification_and_units() {
        // ---
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(query_param("stationid", "GHCND:SAHARA01"))
            .and(query_param("datatypeid", "EVAP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": {"resultset": {"offset": 1, "count": 1, "limit": 1000}},
                "results": [{"date": "2022-08-01T00:00:00", "datatype": "EVAP", "value": 11.5}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let store = MemoryStore::new(default_ecosystems());
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(5)).unwrap());
        let lookups = Lookups {
            stations: StationMap::new([("GHCND:SAHARA01", 6)]),
            units: UnitMap::new([("EVAP", "mm")]),
            ..Lookups::default()
        };
        let opts = IngestOptions {
            stations: vec!["GHCND:SAHARA01".to_string()],
            start_year: 2022,
            end_year: 2022,
            ..IngestOptions::default()
        };

        let outcomes = Orchestrator::new(&store, fetcher, &config)
            .with_lookups(lookups)
            .run(&[Source::Noaa], &opts)
            .await;

        assert!(outcomes[0].result.is_ok());
        let rows = store.rows("climate_data");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["ecosystem_id"], Value::Int(Some(6)));
        assert_eq!(rows[0]["unit"], Value::Text(Some("mm".to_string())));
    }
}
