//! Ingestion pipeline that pulls NASA GISS temperature anomalies, NOAA GHCN-Daily
//! station observations and GBIF species occurrences, and normalizes them into
//! the `climate_data` and `wildlife_data` tables.
//!
//! Modules stay behind explicit boundaries: transport lives in `fetch`,
//! payload-to-record mapping in `parsers`, persistence behind the `store`
//! traits, and run lifecycle in `ingest`. The binary only wires them together
//! through `orchestrator`.

pub mod classify;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod loader;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod parsers;
pub mod schema;
pub mod species;
pub mod store;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{FetchError, IngestError, Result};
pub use ingest::{Ingester, RunReport};
pub use models::{ClimateRecord, Ecosystem, Species, WildlifeRecord};
pub use orchestrator::{IngestOptions, Orchestrator, Source, SourceSelector};
pub use store::{PgStore, RunTx, Store};
