//! End-to-end runs against mocked upstreams and the in-memory store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use climate_wildlife_ingest::fetch::{Fetch, HttpFetcher};
use climate_wildlife_ingest::memory::MemoryStore;
use climate_wildlife_ingest::models::Value;
use climate_wildlife_ingest::orchestrator::{IngestOptions, Orchestrator, Source};
use climate_wildlife_ingest::schema::default_ecosystems;
use climate_wildlife_ingest::{Config, IngestError};

fn config_for(server: &MockServer, raw_dir: &Path) -> Config {
    // ---
    Config {
        db_url: "postgres://unused".to_string(),
        db_pool_max: 1,
        noaa_api_key: Some("test-token".to_string()),
        nasa_gistemp_url: format!("{}/gistemp.csv", server.uri()),
        noaa_api_url: server.uri(),
        gbif_api_url: server.uri(),
        raw_data_dir: raw_dir.to_path_buf(),
        request_delay: Duration::ZERO,
        http_timeout: Duration::from_secs(5),
    }
}

fn fetcher() -> Arc<dyn Fetch> {
    Arc::new(HttpFetcher::new(Duration::from_secs(5)).unwrap())
}

fn gbif_only(species: &[&str]) -> IngestOptions {
    // ---
    IngestOptions {
        species: species.iter().map(|s| s.to_string()).collect(),
        limit_per_species: 20,
        ..IngestOptions::default()
    }
}

async fn mount_species(server: &MockServer, name: &str, key: i64, occurrences: ResponseTemplate) {
    // ---
    Mock::given(method("GET"))
        .and(path("/species/match"))
        .and(query_param("name", name))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"usageKey": key})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/occurrence/search"))
        .and(query_param("taxonKey", key.to_string()))
        .respond_with(occurrences)
        .mount(server)
        .await;
}

fn occurrence_page(results: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "offset": 0, "limit": 20, "endOfRecords": true, "results": results
    }))
}

#[tokio::test]
async fn gbif_keeps_only_classifiable_occurrences() {
    // ---
    let server = MockServer::start().await;
    mount_species(
        &server,
        "Ursus maritimus",
        2433433,
        occurrence_page(json!([
            {"eventDate": "2021-07-04T10:00:00", "decimalLatitude": 75.0, "decimalLongitude": -100.0},
            {"eventDate": "2021-07-05", "decimalLatitude": 0.0, "decimalLongitude": 0.0}
        ])),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());
    let store = MemoryStore::new(default_ecosystems());

    let outcomes = Orchestrator::new(&store, fetcher(), &config)
        .run(&[Source::Gbif], &gbif_only(&["Ursus maritimus"]))
        .await;

    let report = tokio_test::assert_ok!(&outcomes[0].result);
    assert_eq!(report.rows_staged, 1);
    assert_eq!(report.rows_skipped, 1);

    let species = store.species();
    assert_eq!(species.len(), 1);
    assert_eq!(species[0].scientific_name, "Ursus maritimus");

    let rows = store.rows("wildlife_data");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["ecosystem_id"], Value::Int(Some(3)));
    assert_eq!(rows[0]["species_id"], Value::Int(Some(species[0].id)));
    assert_eq!(rows[0]["population_count"], Value::Int(Some(1)));
    assert_eq!(
        rows[0]["date_recorded"],
        Value::Date(chrono::NaiveDate::from_ymd_opt(2021, 7, 4))
    );
}

#[tokio::test]
async fn failure_mid_run_leaves_no_trace() {
    // ---
    let server = MockServer::start().await;
    let arctic = json!([
        {"eventDate": "2021-07-04", "decimalLatitude": 80.0, "decimalLongitude": 20.0}
    ]);
    mount_species(&server, "Ursus maritimus", 1, occurrence_page(arctic.clone())).await;
    mount_species(
        &server,
        "Panthera leo",
        2,
        ResponseTemplate::new(500).set_body_string("search unavailable"),
    )
    .await;
    mount_species(&server, "Vulpes lagopus", 3, occurrence_page(arctic)).await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());
    let store = MemoryStore::new(default_ecosystems());

    let outcomes = Orchestrator::new(&store, fetcher(), &config)
        .run(
            &[Source::Gbif],
            &gbif_only(&["Ursus maritimus", "Panthera leo", "Vulpes lagopus"]),
        )
        .await;

    let err = tokio_test::assert_err!(&outcomes[0].result);
    assert!(matches!(err, IngestError::Fetch(f) if f.status == Some(500)));
    assert!(store.species().is_empty());
    assert!(store.rows("wildlife_data").is_empty());
}

#[tokio::test]
async fn later_sources_run_after_an_earlier_failure() {
    // ---
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gistemp.csv"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_species(
        &server,
        "Ursus maritimus",
        2433433,
        occurrence_page(json!([
            {"eventDate": "2020-03-01", "decimalLatitude": 70.0, "decimalLongitude": 10.0}
        ])),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"resultset": {"offset": 1, "count": 1, "limit": 1000}},
            "results": [
                {"date": "2022-06-01T00:00:00", "datatype": "TMAX", "station": "GHCND:USW00014733", "value": 27.2}
            ]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());
    let store = MemoryStore::new(default_ecosystems());
    let opts = IngestOptions {
        start_year: 2022,
        end_year: 2022,
        ..gbif_only(&["Ursus maritimus"])
    };

    let outcomes = Orchestrator::new(&store, fetcher(), &config)
        .run(&Source::ALL, &opts)
        .await;

    let by_source: Vec<_> = outcomes.iter().map(|o| (o.source, o.result.is_ok())).collect();
    assert_eq!(
        by_source,
        vec![(Source::Nasa, false), (Source::Gbif, true), (Source::Noaa, true)]
    );

    assert_eq!(store.rows("wildlife_data").len(), 1);
    let climate = store.rows("climate_data");
    assert_eq!(climate.len(), 1);
    assert_eq!(
        climate[0]["data_source"],
        Value::Text(Some("NOAA_GHCND:GHCND:USW00014733".to_string()))
    );
}
